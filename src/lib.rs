// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-08-17

//! WprBoot: protected-memory-region boot sequencer.
//!
//! Brings up a verified firmware image for a GPU-resident management
//! processor inside a hardware-enforced protected memory window, and
//! guarantees the window is locked down before any untrusted code can touch
//! it and revoked/scrubbed on every exit path, success or failure.
//!
//! The sequencer is single-shot and synchronous; the caller serializes boot
//! requests against one region table. Hardware families plug in behind the
//! [`hal::RegionHal`] trait, selected once at init from [`config`].

/// Boot configuration (family, geometry, trust anchor).
pub mod config;

/// Crate-wide error taxonomy.
pub mod error;

/// Sub-region grants and the permission programmer.
pub mod grant;

/// Hardware-abstraction layer: the `RegionHal` trait and the software model.
pub mod hal;

/// Firmware container parsing and the load step.
pub mod image;

/// Region allocation and locking.
pub mod region;

/// Region descriptor types.
pub mod request;

/// Sensitive-state scrubbing.
pub mod scrub;

/// The boot sequencer.
pub mod sequencer;

/// Image authenticity validation and boot measurement.
pub mod verify;

pub use error::BootError;
pub use grant::{Access, SubRegionGrant};
pub use request::{BootRequest, ConsumerId, ProcessorId, StagingRange};
pub use scrub::TransientScratch;
pub use sequencer::{BootReport, BootSequencer};
