// CLASSIFICATION: COMMUNITY
// Filename: grant.rs v0.5
// Author: Lukas Bower
// Date Modified: 2027-08-07

//! Sub-region permission programming.
//!
//! One locked window is shared, with different rights, among several
//! hardware consumers. Grants are applied in caller order; the programmer
//! records each applied grant on a stack so that cleanup can revert them in
//! reverse order, matching a stack discipline. On a successful boot the
//! stack is committed instead: those grants are the narrow ongoing access
//! the destination processor keeps.

use bitflags::bitflags;
use log::{debug, warn};

use crate::error::BootError;
use crate::hal::RegionHal;
use crate::region::RegionHandle;
use crate::request::ConsumerId;

bitflags! {
    /// Read/write enables of one sub-region grant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Consumer may read the sub-range.
        const READ = 0b01;
        /// Consumer may write the sub-range.
        const WRITE = 0b10;
    }
}

/// One consumer's rights over a sub-range of a locked window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRegionGrant {
    /// Hardware block receiving the grant.
    pub consumer: ConsumerId,
    /// Byte offset of the sub-range within the window.
    pub start: u64,
    /// Length of the sub-range in bytes.
    pub len: u64,
    /// Read/write enables.
    pub access: Access,
}

/// Applies grants in order and tracks what must be unwound.
///
/// The consumer is pushed onto the applied stack *before* the hardware call:
/// a grant that fails mid-programming may have been partially latched, so it
/// is reverted first when the stack unwinds.
#[derive(Debug, Default)]
pub struct GrantProgrammer {
    applied: Vec<ConsumerId>,
    committed: bool,
}

impl GrantProgrammer {
    /// New programmer with an empty applied stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `grants` in caller order.
    ///
    /// Stops at the first failure, identifying the consumer whose grant
    /// could not be applied. Reverting what was applied is the cleanup
    /// step's job, never this function's.
    pub fn apply_all(
        &mut self,
        hal: &mut dyn RegionHal,
        handle: &RegionHandle,
        grants: &[SubRegionGrant],
    ) -> Result<(), BootError> {
        for grant in grants {
            self.applied.push(grant.consumer);
            if let Err(err) = hal.program_subregion(handle.slot(), grant) {
                warn!(
                    "[Grant] programming {:?} on slot {} failed: {err}",
                    grant.consumer,
                    handle.slot()
                );
                return Err(BootError::PermissionProgramFailed { consumer: grant.consumer });
            }
            debug!(
                "[Grant] {:?} granted {:?} over {:#x}+{:#x} in slot {}",
                grant.consumer,
                grant.access,
                grant.start,
                grant.len,
                handle.slot()
            );
        }
        Ok(())
    }

    /// Mark the applied grants as the window's intended persistent state.
    /// Committed grants survive cleanup.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Consumers currently on the applied stack, in application order.
    #[must_use]
    pub fn applied(&self) -> &[ConsumerId] {
        &self.applied
    }

    /// Revert uncommitted grants in reverse application order.
    ///
    /// Returns the first HAL error but keeps unwinding: a failed revoke must
    /// not leave later stack entries standing.
    pub fn revert(
        &mut self,
        hal: &mut dyn RegionHal,
        handle: &RegionHandle,
    ) -> Result<(), crate::hal::HalError> {
        if self.committed {
            self.applied.clear();
            return Ok(());
        }
        let mut first_err = None;
        while let Some(consumer) = self.applied.pop() {
            debug!("[Grant] reverting {:?} in slot {}", consumer, handle.slot());
            if let Err(err) = hal.clear_subregion(handle.slot(), consumer) {
                warn!("[Grant] revert of {consumer:?} failed: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{HalCall, SimHal};
    use crate::hal::{HwFamily, MemoryLayout, Placement};
    use crate::region::lock_window;

    fn grant(consumer: ConsumerId, start: u64) -> SubRegionGrant {
        SubRegionGrant { consumer, start, len: 0x100, access: Access::READ }
    }

    #[test]
    fn revert_unwinds_in_reverse_order() {
        let mut hal = SimHal::new(HwFamily::Ga10x, MemoryLayout::flat(0x10_0000));
        let handle = lock_window(&mut hal, Placement { start: 0x1000, size: 0x1000 }).unwrap();
        let grants = [grant(ConsumerId::Gsp, 0), grant(ConsumerId::Pmu, 0x100)];
        let mut prog = GrantProgrammer::new();
        prog.apply_all(&mut hal, &handle, &grants).unwrap();
        hal.clear_journal();
        prog.revert(&mut hal, &handle).unwrap();
        let slot = handle.slot();
        assert_eq!(
            hal.journal(),
            &[
                HalCall::Clear { slot, consumer: ConsumerId::Pmu },
                HalCall::Clear { slot, consumer: ConsumerId::Gsp },
            ]
        );
        assert!(hal.subregions(slot).is_empty());
    }

    #[test]
    fn committed_grants_survive_revert() {
        let mut hal = SimHal::new(HwFamily::Ga10x, MemoryLayout::flat(0x10_0000));
        let handle = lock_window(&mut hal, Placement { start: 0x1000, size: 0x1000 }).unwrap();
        let grants = [grant(ConsumerId::Gsp, 0)];
        let mut prog = GrantProgrammer::new();
        prog.apply_all(&mut hal, &handle, &grants).unwrap();
        prog.commit();
        hal.clear_journal();
        prog.revert(&mut hal, &handle).unwrap();
        assert!(hal.journal().is_empty());
        assert_eq!(hal.subregions(handle.slot()).len(), 1);
    }

    #[test]
    fn revert_keeps_unwinding_past_a_failed_revoke() {
        use crate::hal::HalError;
        let mut hal = SimHal::new(HwFamily::Ga10x, MemoryLayout::flat(0x10_0000));
        let handle = lock_window(&mut hal, Placement { start: 0x1000, size: 0x1000 }).unwrap();
        let grants = [grant(ConsumerId::Gsp, 0), grant(ConsumerId::Pmu, 0x100)];
        let mut prog = GrantProgrammer::new();
        prog.apply_all(&mut hal, &handle, &grants).unwrap();
        hal.deny_clear(ConsumerId::Pmu);
        let err = prog.revert(&mut hal, &handle).unwrap_err();
        assert_eq!(err, HalError::RevokeFailed(handle.slot()));
        // Pmu's revoke failed, but the unwind still cleared Gsp below it.
        let remaining = hal.subregions(handle.slot());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].consumer, ConsumerId::Pmu);
    }

    #[test]
    fn failed_grant_reports_its_consumer() {
        let mut hal = SimHal::new(HwFamily::Ga10x, MemoryLayout::flat(0x10_0000));
        hal.deny_consumer(ConsumerId::Pmu);
        let handle = lock_window(&mut hal, Placement { start: 0x1000, size: 0x1000 }).unwrap();
        let grants = [grant(ConsumerId::Gsp, 0), grant(ConsumerId::Pmu, 0x100)];
        let mut prog = GrantProgrammer::new();
        let err = prog.apply_all(&mut hal, &handle, &grants).unwrap_err();
        assert_eq!(err, BootError::PermissionProgramFailed { consumer: ConsumerId::Pmu });
        // The failed grant sits on top of the stack for defensive revert.
        assert_eq!(prog.applied(), &[ConsumerId::Gsp, ConsumerId::Pmu]);
    }
}
