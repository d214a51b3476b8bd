// CLASSIFICATION: COMMUNITY
// Filename: mod.rs · HAL facade v0.6
// Author: Lukas Bower
// Date Modified: 2027-08-02
//
// ─────────────────────────────────────────────────────────────
// WprBoot · Hardware-Abstraction Layer (facade)
//
// The boot sequencer drives the memory-protection hardware only
// through the [`RegionHal`] trait defined here. One implementation
// exists per hardware family and is selected **once at init** from
// a configuration value; the sequencer never reimplements a
// primitive and never touches registers directly.
//
// Primitives, in pipeline order:
//
//   • `memory_layout`     – geometry query backing region allocation
//   • `lock_region`       – commit a placement into the region table
//   • `copy_to_region`    – DMA a staging range into a locked window
//   • `program_subregion` – grant one consumer a sub-range
//   • `clear_subregion`   – revoke one consumer's sub-range
//   • `unlock_region`     – seal the window (end the boot session)
//
// `unlock_region` never removes protection from the window: it
// drops the boot-time programming session so that only committed
// sub-region grants remain in force. It is idempotent, including
// on a slot that was never locked.
// ─────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grant::SubRegionGrant;
use crate::request::{ConsumerId, StagingRange};

pub mod sim;

/// Errors surfaced by HAL primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HalError {
    /// The region table has no free slot.
    #[error("no free slot in the region table")]
    NoFreeSlot,
    /// The requested placement overlaps the active window in the given slot.
    #[error("placement overlaps the active window in slot {0}")]
    Overlap(usize),
    /// DMA transfer faulted at the given address.
    #[error("dma fault at {0:#x}")]
    DmaFault(u64),
    /// The slot is not holding a locked, unsealed window.
    #[error("slot {0} is not open for programming")]
    NotOpen(usize),
    /// No sub-region entry is free for this slot.
    #[error("sub-region table full for slot {0}")]
    SubRegionTableFull(usize),
    /// The consumer-side interface rejected the grant.
    #[error("consumer rejected the grant")]
    GrantRejected,
    /// A sub-region entry could not be revoked.
    #[error("sub-region revoke failed in slot {0}")]
    RevokeFailed(usize),
    /// The seal operation failed; the window remains open for programming.
    #[error("seal failed for slot {0}")]
    SealFailed(usize),
    /// The grant range falls outside the window.
    #[error("grant range outside the window")]
    BadRange,
}

/// Device memory geometry relevant to region placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Base address of device memory.
    pub fb_base: u64,
    /// Total size of device memory in bytes.
    pub fb_size: u64,
    /// Bytes reserved at the top of memory (firmware scratch carve-out);
    /// the protected window is placed directly below it.
    pub reserved_top: u64,
}

impl MemoryLayout {
    /// Layout with no top-of-memory reservation, starting at address zero.
    #[must_use]
    pub const fn flat(fb_size: u64) -> Self {
        Self { fb_base: 0, fb_size, reserved_top: 0 }
    }
}

/// Hardware family the HAL implementation is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HwFamily {
    /// First generation with sub-region support.
    Tu11x,
    /// Current generation.
    Ga10x,
}

/// Per-family constants of the memory-protection hardware.
#[derive(Debug, Clone, Copy)]
pub struct FamilyParams {
    /// Required alignment of a window's start and size.
    pub region_align: u64,
    /// Number of slots in the region table.
    pub slot_count: usize,
    /// Number of sub-region entries per slot.
    pub subregions_per_slot: usize,
}

impl HwFamily {
    /// Constant parameter table for this family.
    #[must_use]
    pub const fn params(self) -> FamilyParams {
        match self {
            HwFamily::Tu11x => FamilyParams {
                region_align: 0x2_0000,
                slot_count: 2,
                subregions_per_slot: 4,
            },
            HwFamily::Ga10x => FamilyParams {
                region_align: 0x1000,
                slot_count: 3,
                subregions_per_slot: 8,
            },
        }
    }
}

/// Placement of a protected window in device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Start address, aligned per [`FamilyParams::region_align`].
    pub start: u64,
    /// Size in bytes, aligned per [`FamilyParams::region_align`].
    pub size: u64,
}

impl Placement {
    /// End address (one past the last byte).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// Whether two placements share any byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Placement) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Family-specific primitives of the memory-protection hardware.
///
/// Implementations guarantee that a failed `lock_region` leaves no hardware
/// state changed (at-most-partial commits are rolled back internally), and
/// that `clear_subregion` and `unlock_region` are idempotent.
pub trait RegionHal {
    /// Family this implementation drives.
    fn family(&self) -> HwFamily;

    /// Current device memory geometry.
    fn memory_layout(&self) -> MemoryLayout;

    /// Commit a placement into the region table. Returns the hardware slot
    /// index; revocation and sealing are addressed by this index later.
    fn lock_region(&mut self, placement: Placement) -> Result<usize, HalError>;

    /// Read a staging range into ordinary memory. The returned bytes are
    /// transient sensitive state and must be scrubbed by the caller.
    fn read_staging(&self, range: StagingRange) -> Result<Vec<u8>, HalError>;

    /// DMA-copy `src` from the staging domain into the window held by
    /// `slot`, starting at byte offset `dest_off` within the window.
    fn copy_to_region(
        &mut self,
        slot: usize,
        src: StagingRange,
        dest_off: u64,
    ) -> Result<(), HalError>;

    /// Program one sub-region grant into the window held by `slot`.
    fn program_subregion(&mut self, slot: usize, grant: &SubRegionGrant) -> Result<(), HalError>;

    /// Revoke the sub-region entry of `consumer` in `slot`. Clearing a
    /// consumer that holds no entry is a no-op.
    fn clear_subregion(&mut self, slot: usize, consumer: ConsumerId) -> Result<(), HalError>;

    /// Seal the window: end the boot-time programming session, dropping all
    /// access except committed sub-region grants. Idempotent, including on a
    /// slot that was never locked.
    fn unlock_region(&mut self, slot: usize) -> Result<(), HalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_overlap_on_shared_bytes() {
        let a = Placement { start: 0x1000, size: 0x1000 };
        let b = Placement { start: 0x1800, size: 0x1000 };
        let c = Placement { start: 0x2000, size: 0x1000 };
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn family_params_are_aligned_powers_of_two() {
        for family in [HwFamily::Tu11x, HwFamily::Ga10x] {
            let params = family.params();
            assert!(params.region_align.is_power_of_two());
            assert!(params.slot_count > 0);
            assert!(params.subregions_per_slot > 0);
        }
    }
}
