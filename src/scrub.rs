// CLASSIFICATION: COMMUNITY
// Filename: scrub.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-08-09

//! Sensitive-state scrubbing.
//!
//! While the pipeline runs, header fields and descriptor layout live as
//! transient copies in ordinary memory. Once the real copy sits inside the
//! protected window, those copies are the only readable residue of the
//! window's layout, so they are reduced to the all-zero pattern before the
//! sequencer returns, on every path.
//!
//! The scratch buffers are owned by the caller and passed in explicitly;
//! [`ScrubGuard`] encodes the always-scrub invariant in the type system
//! instead of relying on every exit path to remember it. Scrubbing is a pure
//! memory fill and cannot fail.

use log::debug;
use zeroize::Zeroize;

use crate::image::HEADER_LEN;

/// Caller-owned scratch for header and descriptor fields.
#[derive(Debug, Default, Zeroize)]
pub struct TransientScratch {
    /// Raw copy of the container header.
    pub header_bytes: [u8; HEADER_LEN],
    /// Descriptor fields captured while the pipeline runs: image size,
    /// staging base and length, window start and size, slot index.
    pub descriptor_words: [u64; 6],
}

impl TransientScratch {
    /// Whether every byte holds the all-zero pattern.
    #[must_use]
    pub fn is_scrubbed(&self) -> bool {
        self.header_bytes.iter().all(|&b| b == 0)
            && self.descriptor_words.iter().all(|&w| w == 0)
    }
}

/// Zero-on-drop borrow of the caller's scratch.
///
/// The guard scrubs exactly once: either explicitly through
/// [`ScrubGuard::scrub_now`] at the pipeline's scrub stage, or on drop as
/// the backstop for panics and early exits.
pub struct ScrubGuard<'a> {
    scratch: &'a mut TransientScratch,
    done: bool,
}

impl<'a> ScrubGuard<'a> {
    /// Arm the guard over `scratch`.
    pub fn new(scratch: &'a mut TransientScratch) -> Self {
        Self { scratch, done: false }
    }

    /// Mutable access to the guarded scratch.
    pub fn scratch(&mut self) -> &mut TransientScratch {
        self.scratch
    }

    /// Scrub at the pipeline's scrub stage.
    pub fn scrub_now(&mut self) {
        if !self.done {
            self.scratch.zeroize();
            self.done = true;
            debug!("[Scrub] transient state zeroed");
        }
    }
}

impl Drop for ScrubGuard<'_> {
    fn drop(&mut self) {
        self.scrub_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirty() -> TransientScratch {
        TransientScratch {
            header_bytes: [0xa5; HEADER_LEN],
            descriptor_words: [0xdead_beef; 6],
        }
    }

    #[test]
    fn guard_scrubs_on_drop() {
        let mut scratch = dirty();
        {
            let _guard = ScrubGuard::new(&mut scratch);
        }
        assert!(scratch.is_scrubbed());
    }

    #[test]
    fn explicit_scrub_is_idempotent() {
        let mut scratch = dirty();
        {
            let mut guard = ScrubGuard::new(&mut scratch);
            guard.scrub_now();
            guard.scratch().descriptor_words[0] = 1;
            // Drop must not re-zero: the stage already ran.
        }
        assert_eq!(scratch.descriptor_words[0], 1);
    }

    #[test]
    fn guard_scrubs_on_panic() {
        let mut scratch = dirty();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ScrubGuard::new(&mut scratch);
            panic!("mid-pipeline fault");
        }));
        assert!(result.is_err());
        assert!(scratch.is_scrubbed());
    }
}
