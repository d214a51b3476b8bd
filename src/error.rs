// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.3
// Author: Lukas Bower
// Date Modified: 2027-07-02

//! Crate-wide error taxonomy for the boot sequencer.
//!
//! Every kind is terminal: the sequencer never retries internally, and a
//! [`BootError::CleanupFailed`] always outranks the pipeline error that
//! triggered cleanup, because a failed revoke leaves the protection
//! hardware in an unknown trust state.

use thiserror::Error;

use crate::hal::HalError;
use crate::request::ConsumerId;

/// Terminal outcome kinds of one boot sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootError {
    /// Malformed request. Raised before any hardware action; no cleanup runs.
    #[error("invalid boot request: {0}")]
    InvalidArgument(&'static str),

    /// No placement satisfying the family's alignment and size constraints
    /// fits in the usable framebuffer carve-out.
    #[error("no placement satisfies the region constraints")]
    InsufficientRegionSpace,

    /// The protection hardware could not commit the window.
    #[error("region lock failed: {0}")]
    LockFailed(#[source] HalError),

    /// The requested placement overlaps an active window. Hard invariant:
    /// two windows must never overlap.
    #[error("requested placement overlaps an active protected window")]
    AlreadyLocked,

    /// DMA transfer into the window faulted, or the declared image size does
    /// not match the container header.
    #[error("image copy failed: {0}")]
    CopyFailed(String),

    /// The external validator rejected the image. The window is torn back to
    /// its fully-revoked state by cleanup; the image never becomes runnable.
    #[error("image signature rejected: {0}")]
    SignatureRejected(String),

    /// A sub-region grant could not be applied. Carries the consumer so the
    /// caller can attribute blame without widening the window's exposure.
    #[error("sub-region grant for {consumer:?} could not be applied")]
    PermissionProgramFailed {
        /// Hardware consumer whose grant failed.
        consumer: ConsumerId,
    },

    /// The unconditional cleanup step itself failed. Security-relevant: the
    /// window's permissions may not be fully revoked.
    #[error("cleanup failed: {0}")]
    CleanupFailed(String),
}
