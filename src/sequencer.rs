// CLASSIFICATION: COMMUNITY
// Filename: sequencer.rs v0.9
// Author: Lukas Bower
// Date Modified: 2027-08-17
//
// ─────────────────────────────────────────────────────────────
// WprBoot · Boot Sequencer
//
// Runs the fixed pipeline exactly once per request:
//
//   Idle → Allocating → Locked → Loading → Verifying →
//   Permissioning → Scrubbing → Cleanup → Done
//
// Single-shot, single-threaded, no retry, no cancellation. The
// caller serializes boot requests against one region table; the
// locker's overlap check is the only backstop.
//
// Once the window is locked, [`BootTransaction`] is armed and the
// cleanup step runs on every exit: uncommitted grants unwind in
// reverse, the loader's elevated access is revoked, and the window
// is sealed exactly once. Cleanup failure is never swallowed; it
// outranks the pipeline error that triggered it.
// ─────────────────────────────────────────────────────────────

use log::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::BootError;
use crate::grant::{Access, GrantProgrammer, SubRegionGrant};
use crate::hal::{HalError, Placement, RegionHal};
use crate::image::{self, ImageHeader};
use crate::region::{self, RegionHandle};
use crate::request::{BootRequest, ConsumerId};
use crate::scrub::{ScrubGuard, TransientScratch};
use crate::verify::ImageValidator;

/// Consumer identity the loader uses for its elevated copy access. Always
/// revoked by cleanup; requests may not name it.
pub const LOADER_CONSUMER: ConsumerId = ConsumerId::Sec2;

/// Pipeline stage, for logging and post-mortem attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No request accepted yet.
    Idle,
    /// Computing the window placement.
    Allocating,
    /// Window committed to the protection hardware.
    Locked,
    /// Copying image and header into the window.
    Loading,
    /// External validator judging the image.
    Verifying,
    /// Programming sub-region grants.
    Permissioning,
    /// Zeroing transient scratch state.
    Scrubbing,
    /// Unwinding and sealing.
    Cleanup,
    /// Terminal.
    Done,
}

/// Successful boot summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Region table slot holding the window.
    pub slot: usize,
    /// Committed window placement.
    pub placement: Placement,
    /// Boot measurement of the accepted image.
    pub measurement: [u8; 32],
}

/// Hardware state to unwind, armed at the first hardware-affecting step.
///
/// Owns the [`RegionHandle`], which is what makes sealing twice or skipping
/// the seal unrepresentable: cleanup consumes the transaction.
struct BootTransaction {
    handle: Option<RegionHandle>,
    programmer: GrantProgrammer,
    elevated: bool,
}

impl BootTransaction {
    fn new() -> Self {
        Self { handle: None, programmer: GrantProgrammer::new(), elevated: false }
    }

    /// The unconditional cleanup step.
    ///
    /// Revocation targets are identified structurally: the owned handle, the
    /// programmer's recorded stack and the loader's fixed identity. Nothing
    /// produced by a failed pipeline stage is trusted. Errors do not stop
    /// the unwind; the first one is reported.
    fn cleanup(mut self, hal: &mut dyn RegionHal) -> Result<(), HalError> {
        let Some(handle) = self.handle.take() else {
            // Nothing was locked; there is no hardware state to revert.
            debug!("[Sequencer] cleanup: no window armed");
            return Ok(());
        };

        let mut first_err = None;

        if let Err(err) = self.programmer.revert(hal, &handle) {
            first_err.get_or_insert(err);
        }
        if self.elevated {
            if let Err(err) = hal.clear_subregion(handle.slot(), LOADER_CONSUMER) {
                warn!("[Sequencer] revoking loader access failed: {err}");
                first_err.get_or_insert(err);
            }
        }
        if let Err(err) = hal.unlock_region(handle.slot()) {
            warn!("[Sequencer] sealing slot {} failed: {err}", handle.slot());
            first_err.get_or_insert(err);
        } else {
            info!("[Sequencer] slot {} sealed", handle.slot());
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// The protected-region boot sequencer.
pub struct BootSequencer<'v> {
    validator: &'v dyn ImageValidator,
}

impl<'v> BootSequencer<'v> {
    /// Sequencer using `validator` as the external authenticity judge.
    pub fn new(validator: &'v dyn ImageValidator) -> Self {
        Self { validator }
    }

    /// Run the pipeline once for `req`.
    ///
    /// `scratch` is the caller-owned transient buffer; it is all-zero when
    /// this function returns, whatever the outcome. A malformed request
    /// fails before any hardware action and without cleanup.
    pub fn run(
        &self,
        hal: &mut dyn RegionHal,
        req: &BootRequest,
        scratch: &mut TransientScratch,
    ) -> Result<BootReport, BootError> {
        stage(Stage::Idle);
        req.validate()?;

        let mut guard = ScrubGuard::new(scratch);
        let mut tx = BootTransaction::new();
        let pipeline = self.pipeline(hal, req, &mut guard, &mut tx);

        stage(Stage::Scrubbing);
        guard.scrub_now();

        stage(Stage::Cleanup);
        let cleanup = tx.cleanup(hal);

        stage(Stage::Done);
        match (pipeline, cleanup) {
            (Ok(report), Ok(())) => {
                info!(
                    "[Sequencer] boot complete: slot {} measurement {}",
                    report.slot,
                    hex::encode(report.measurement)
                );
                Ok(report)
            }
            (Err(err), Ok(())) => {
                warn!("[Sequencer] boot failed: {err}");
                Err(err)
            }
            (Ok(_), Err(cleanup_err)) => {
                Err(BootError::CleanupFailed(cleanup_err.to_string()))
            }
            (Err(err), Err(cleanup_err)) => Err(BootError::CleanupFailed(format!(
                "{cleanup_err} (after pipeline error: {err})"
            ))),
        }
    }

    fn pipeline(
        &self,
        hal: &mut dyn RegionHal,
        req: &BootRequest,
        guard: &mut ScrubGuard<'_>,
        tx: &mut BootTransaction,
    ) -> Result<BootReport, BootError> {
        stage(Stage::Allocating);
        let params = hal.family().params();
        let placement = region::plan_window(req, hal.memory_layout(), &params)?;

        stage(Stage::Locked);
        let handle = &*tx.handle.insert(region::lock_window(hal, placement)?);
        let slot = handle.slot();

        // Elevated copy access for the loader engine, dropped by cleanup.
        let elevated = SubRegionGrant {
            consumer: LOADER_CONSUMER,
            start: 0,
            len: placement.size,
            access: Access::READ | Access::WRITE,
        };
        tx.elevated = true;
        if let Err(err) = hal.program_subregion(slot, &elevated) {
            warn!("[Sequencer] elevated loader grant failed: {err}");
            return Err(BootError::PermissionProgramFailed { consumer: LOADER_CONSUMER });
        }

        stage(Stage::Loading);
        let staged = Zeroizing::new(
            hal.read_staging(req.staging)
                .map_err(|e| BootError::CopyFailed(e.to_string()))?,
        );
        let hdr = ImageHeader::parse(&staged).map_err(|e| BootError::CopyFailed(e.to_string()))?;
        capture_transients(guard.scratch(), req, &hdr, placement, slot, &staged);
        image::load(hal, handle, req, &hdr)?;

        stage(Stage::Verifying);
        let measurement = self
            .validator
            .validate(&hdr, &staged)
            .map_err(|e| BootError::SignatureRejected(e.to_string()))?;

        stage(Stage::Permissioning);
        tx.programmer.apply_all(hal, handle, &req.grants)?;
        // The request's grants are the window's intended persistent state.
        tx.programmer.commit();

        Ok(BootReport { slot, placement, measurement: measurement.0 })
    }
}

fn capture_transients(
    scratch: &mut TransientScratch,
    req: &BootRequest,
    hdr: &ImageHeader,
    placement: Placement,
    slot: usize,
    staged: &[u8],
) {
    scratch.header_bytes.copy_from_slice(&staged[..image::HEADER_LEN]);
    scratch.descriptor_words = [
        req.image_size,
        req.staging.base,
        req.staging.len,
        placement.start,
        placement.size,
        slot as u64,
    ];
    debug!(
        "[Sequencer] captured transient header v{} for slot {slot}",
        hdr.version
    );
}

fn stage(stage: Stage) {
    debug!("[Sequencer] stage {stage:?}");
}
