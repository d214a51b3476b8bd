// CLASSIFICATION: COMMUNITY
// Filename: region.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-08-04

//! Region allocation and locking.
//!
//! [`plan_window`] is a pure computation: given the request and the device
//! geometry it yields the placement of the protected window, carved from the
//! top of usable memory, aligned per the family's constraints. Calling it
//! twice with the same inputs yields the same placement.
//!
//! [`lock_window`] commits a placement into the protection hardware and
//! returns the [`RegionHandle`] every later pipeline step, and the cleanup
//! step, addresses the window by.

use log::{debug, info};

use crate::error::BootError;
use crate::hal::{FamilyParams, HalError, MemoryLayout, Placement, RegionHal};
use crate::image;
use crate::request::BootRequest;

/// Opaque handle to a locked protected window.
///
/// Valid from the moment lock succeeds until the window is sealed exactly
/// once by cleanup. Deliberately neither `Clone` nor `Copy`: the sequencer's
/// transaction owns it, which is what makes double-seal unrepresentable.
#[derive(Debug)]
pub struct RegionHandle {
    slot: usize,
    placement: Placement,
}

impl RegionHandle {
    /// Hardware-assigned slot index. Revocation is addressed by this index,
    /// not by placement value.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Placement committed for this window.
    #[must_use]
    pub const fn placement(&self) -> Placement {
        self.placement
    }
}

const fn align_up(value: u64, align: u64) -> Option<u64> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

const fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

/// Compute the protected window's placement for `req`.
///
/// Pure computation, no hardware side effects. Fails with
/// [`BootError::InsufficientRegionSpace`] when no aligned placement fits
/// below the top-of-memory reservation.
pub fn plan_window(
    req: &BootRequest,
    layout: MemoryLayout,
    params: &FamilyParams,
) -> Result<Placement, BootError> {
    let need = image::PAYLOAD_OFFSET
        .checked_add(req.image_size)
        .and_then(|n| align_up(n, params.region_align))
        .ok_or(BootError::InsufficientRegionSpace)?;

    let usable_top = layout
        .fb_base
        .checked_add(layout.fb_size)
        .and_then(|top| top.checked_sub(layout.reserved_top))
        .ok_or(BootError::InsufficientRegionSpace)?;
    let start = align_down(usable_top.saturating_sub(need), params.region_align);
    if start < layout.fb_base || start.saturating_add(need) > usable_top {
        return Err(BootError::InsufficientRegionSpace);
    }

    let placement = Placement { start, size: need };
    debug!(
        "[Region] planned window {:#x}+{:#x} for {:?} image of {:#x} bytes",
        placement.start, placement.size, req.processor, req.image_size
    );
    Ok(placement)
}

/// Commit `placement` into the protection hardware.
///
/// On failure no hardware state is assumed changed; the HAL rolls back
/// partial commits internally before returning.
pub fn lock_window(
    hal: &mut dyn RegionHal,
    placement: Placement,
) -> Result<RegionHandle, BootError> {
    match hal.lock_region(placement) {
        Ok(slot) => {
            info!("[Region] window locked in slot {slot} at {:#x}+{:#x}", placement.start, placement.size);
            Ok(RegionHandle { slot, placement })
        }
        Err(HalError::Overlap(slot)) => {
            debug!("[Region] placement overlaps active window in slot {slot}");
            Err(BootError::AlreadyLocked)
        }
        Err(err) => Err(BootError::LockFailed(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::HwFamily;
    use crate::request::{ProcessorId, StagingRange};

    fn request(image_size: u64) -> BootRequest {
        BootRequest {
            image_size,
            processor: ProcessorId::Gsp,
            staging: StagingRange { base: 0, len: 0x1000 },
            grants: Vec::new(),
        }
    }

    #[test]
    fn placement_is_aligned_and_below_reservation() {
        let params = HwFamily::Ga10x.params();
        let layout = MemoryLayout { fb_base: 0, fb_size: 0x10_0000, reserved_top: 0x2000 };
        let p = plan_window(&request(0x400), layout, &params).unwrap();
        assert_eq!(p.start % params.region_align, 0);
        assert_eq!(p.size % params.region_align, 0);
        assert!(p.end() <= layout.fb_size - layout.reserved_top);
    }

    #[test]
    fn planning_is_idempotent() {
        let params = HwFamily::Tu11x.params();
        let layout = MemoryLayout::flat(0x100_0000);
        let a = plan_window(&request(0x8000), layout, &params).unwrap();
        let b = plan_window(&request(0x8000), layout, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_image_fails_allocation() {
        let params = HwFamily::Ga10x.params();
        let layout = MemoryLayout::flat(0x10_0000);
        assert_eq!(
            plan_window(&request(0x20_0000), layout, &params),
            Err(BootError::InsufficientRegionSpace)
        );
    }

    #[test]
    fn reservation_consuming_all_memory_fails_allocation() {
        let params = HwFamily::Ga10x.params();
        let layout = MemoryLayout { fb_base: 0, fb_size: 0x10_0000, reserved_top: 0x10_0000 };
        assert_eq!(
            plan_window(&request(0x400), layout, &params),
            Err(BootError::InsufficientRegionSpace)
        );
    }
}
