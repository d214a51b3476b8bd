// CLASSIFICATION: COMMUNITY
// Filename: sim.rs · software protection-unit model v0.7
// Author: Lukas Bower
// Date Modified: 2027-08-09

//! Deterministic software model of the memory-protection unit.
//!
//! [`SimHal`] implements [`RegionHal`] against an in-memory region table and
//! framebuffer. It enforces the same invariants the silicon does (no
//! overlapping windows, bounded sub-region tables, idempotent seal) and keeps
//! a call journal so tests can assert apply/revoke ordering. Register-level
//! encoding of real families lives out of tree; this model is the shipped
//! back-end for bring-up tooling and the test suite.

use log::{debug, trace};

use crate::grant::{Access, SubRegionGrant};
use crate::hal::{FamilyParams, HalError, HwFamily, MemoryLayout, Placement, RegionHal};
use crate::request::{ConsumerId, StagingRange};

/// One mutating HAL call, as recorded by the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalCall {
    /// A window was committed into the region table.
    Lock {
        /// Assigned slot index.
        slot: usize,
        /// Committed placement.
        placement: Placement,
    },
    /// Bytes were copied from staging into a window.
    Copy {
        /// Target slot.
        slot: usize,
        /// Number of bytes copied.
        len: u64,
    },
    /// A sub-region grant was applied.
    Program {
        /// Target slot.
        slot: usize,
        /// Consumer the grant names.
        consumer: ConsumerId,
    },
    /// A sub-region entry was revoked.
    Clear {
        /// Target slot.
        slot: usize,
        /// Consumer whose entry was revoked.
        consumer: ConsumerId,
    },
    /// A window was sealed.
    Seal {
        /// Target slot.
        slot: usize,
    },
}

/// One programmed sub-region entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRegionEntry {
    /// Consumer holding the entry.
    pub consumer: ConsumerId,
    /// Byte offset of the sub-range within the window.
    pub start: u64,
    /// Length of the sub-range in bytes.
    pub len: u64,
    /// Read/write enables.
    pub access: Access,
}

struct SlotState {
    placement: Placement,
    sealed: bool,
    window: Vec<u8>,
    subregions: Vec<SubRegionEntry>,
}

/// Software model of the protection unit for one hardware family.
pub struct SimHal {
    family: HwFamily,
    layout: MemoryLayout,
    slots: Vec<Option<SlotState>>,
    staged: Vec<(u64, Vec<u8>)>,
    denied: Vec<ConsumerId>,
    denied_clears: Vec<ConsumerId>,
    failing_seals: Vec<usize>,
    journal: Vec<HalCall>,
}

impl SimHal {
    /// Model a device of the given family and memory layout.
    #[must_use]
    pub fn new(family: HwFamily, layout: MemoryLayout) -> Self {
        let params = family.params();
        let mut slots = Vec::with_capacity(params.slot_count);
        slots.resize_with(params.slot_count, || None);
        Self {
            family,
            layout,
            slots,
            staged: Vec::new(),
            denied: Vec::new(),
            denied_clears: Vec::new(),
            failing_seals: Vec::new(),
            journal: Vec::new(),
        }
    }

    fn params(&self) -> FamilyParams {
        self.family.params()
    }

    /// Place `bytes` in the staging domain at `base`.
    pub fn stage(&mut self, base: u64, bytes: &[u8]) {
        self.staged.push((base, bytes.to_vec()));
    }

    /// Make the consumer-side interface reject grants for `consumer`.
    pub fn deny_consumer(&mut self, consumer: ConsumerId) {
        self.denied.push(consumer);
    }

    /// Make revocation of `consumer`'s sub-region entry fail.
    pub fn deny_clear(&mut self, consumer: ConsumerId) {
        self.denied_clears.push(consumer);
    }

    /// Make sealing `slot` fail, leaving the window open for programming.
    pub fn fail_seal(&mut self, slot: usize) {
        self.failing_seals.push(slot);
    }

    /// Raise the top-of-memory reservation (caller's serialization
    /// discipline for placing a second window below an earlier one).
    pub fn set_reserved_top(&mut self, reserved_top: u64) {
        self.layout.reserved_top = reserved_top;
    }

    /// Journal of every mutating call since the last [`Self::clear_journal`].
    #[must_use]
    pub fn journal(&self) -> &[HalCall] {
        &self.journal
    }

    /// Drop the recorded journal.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Placements of all active windows.
    #[must_use]
    pub fn active_placements(&self) -> Vec<Placement> {
        self.slots
            .iter()
            .flatten()
            .map(|s| s.placement)
            .collect()
    }

    /// Whether the window in `slot` is sealed.
    #[must_use]
    pub fn is_sealed(&self, slot: usize) -> bool {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .is_some_and(|s| s.sealed)
    }

    /// Contents of the window held by `slot`, if locked.
    #[must_use]
    pub fn window(&self, slot: usize) -> Option<&[u8]> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .map(|s| s.window.as_slice())
    }

    /// Sub-region entries currently programmed in `slot`.
    #[must_use]
    pub fn subregions(&self, slot: usize) -> &[SubRegionEntry] {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .map_or(&[], |s| s.subregions.as_slice())
    }

    fn staged_slice(&self, range: StagingRange) -> Result<&[u8], HalError> {
        for (base, bytes) in &self.staged {
            let end = base.saturating_add(bytes.len() as u64);
            if range.base >= *base && range.end() <= end {
                let off = (range.base - base) as usize;
                return Ok(&bytes[off..off + range.len as usize]);
            }
        }
        Err(HalError::DmaFault(range.base))
    }

    fn open_slot(&mut self, slot: usize) -> Result<&mut SlotState, HalError> {
        match self.slots.get_mut(slot) {
            Some(Some(state)) if !state.sealed => Ok(state),
            _ => Err(HalError::NotOpen(slot)),
        }
    }
}

impl RegionHal for SimHal {
    fn family(&self) -> HwFamily {
        self.family
    }

    fn memory_layout(&self) -> MemoryLayout {
        self.layout
    }

    fn lock_region(&mut self, placement: Placement) -> Result<usize, HalError> {
        // Overlap check first: it must hold even when the table is full.
        for (i, state) in self.slots.iter().enumerate() {
            if let Some(state) = state {
                if state.placement.overlaps(&placement) {
                    return Err(HalError::Overlap(i));
                }
            }
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(HalError::NoFreeSlot)?;
        self.slots[slot] = Some(SlotState {
            placement,
            sealed: false,
            window: vec![0u8; placement.size as usize],
            subregions: Vec::new(),
        });
        debug!("[SimHal] locked slot {slot} at {:#x}+{:#x}", placement.start, placement.size);
        self.journal.push(HalCall::Lock { slot, placement });
        Ok(slot)
    }

    fn read_staging(&self, range: StagingRange) -> Result<Vec<u8>, HalError> {
        self.staged_slice(range).map(<[u8]>::to_vec)
    }

    fn copy_to_region(
        &mut self,
        slot: usize,
        src: StagingRange,
        dest_off: u64,
    ) -> Result<(), HalError> {
        let bytes = self.staged_slice(src)?.to_vec();
        let state = self.open_slot(slot)?;
        let end = dest_off
            .checked_add(src.len)
            .ok_or(HalError::DmaFault(dest_off))?;
        if end > state.placement.size {
            return Err(HalError::DmaFault(state.placement.start + dest_off));
        }
        state.window[dest_off as usize..end as usize].copy_from_slice(&bytes);
        trace!("[SimHal] copied {:#x} bytes into slot {slot} at {dest_off:#x}", src.len);
        self.journal.push(HalCall::Copy { slot, len: src.len });
        Ok(())
    }

    fn program_subregion(&mut self, slot: usize, grant: &SubRegionGrant) -> Result<(), HalError> {
        if self.denied.contains(&grant.consumer) {
            return Err(HalError::GrantRejected);
        }
        let limit = self.params().subregions_per_slot;
        let state = self.open_slot(slot)?;
        let end = grant.start.checked_add(grant.len).ok_or(HalError::BadRange)?;
        if end > state.placement.size {
            return Err(HalError::BadRange);
        }
        if state.subregions.len() >= limit {
            return Err(HalError::SubRegionTableFull(slot));
        }
        state.subregions.push(SubRegionEntry {
            consumer: grant.consumer,
            start: grant.start,
            len: grant.len,
            access: grant.access,
        });
        self.journal.push(HalCall::Program { slot, consumer: grant.consumer });
        Ok(())
    }

    fn clear_subregion(&mut self, slot: usize, consumer: ConsumerId) -> Result<(), HalError> {
        if self.denied_clears.contains(&consumer) {
            return Err(HalError::RevokeFailed(slot));
        }
        // Idempotent: clearing an absent entry, or a slot that is sealed or
        // was never locked, leaves the hardware unchanged.
        if let Some(Some(state)) = self.slots.get_mut(slot) {
            state.subregions.retain(|e| e.consumer != consumer);
        }
        self.journal.push(HalCall::Clear { slot, consumer });
        Ok(())
    }

    fn unlock_region(&mut self, slot: usize) -> Result<(), HalError> {
        if self.failing_seals.contains(&slot) {
            return Err(HalError::SealFailed(slot));
        }
        if let Some(Some(state)) = self.slots.get_mut(slot) {
            state.sealed = true;
        }
        self.journal.push(HalCall::Seal { slot });
        Ok(())
    }
}
