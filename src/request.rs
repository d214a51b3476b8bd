// CLASSIFICATION: COMMUNITY
// Filename: request.rs v0.5
// Author: Lukas Bower
// Date Modified: 2027-07-02

//! Region descriptor types: the immutable parameters of one boot request.
//!
//! A [`BootRequest`] is owned by the caller and borrowed read-only by the
//! sequencer for the duration of the call. Validation happens before any
//! hardware action so a degenerate request never arms the cleanup path.

use serde::{Deserialize, Serialize};

use crate::error::BootError;
use crate::grant::SubRegionGrant;

/// Secondary on-device processor whose firmware is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorId {
    /// GPU system processor (the management runtime).
    Gsp,
    /// Security engine falcon.
    Sec2,
}

/// Hardware block that may receive a sub-region grant inside a locked window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumerId {
    /// Security engine. Reserved for the loader's own elevated copy access;
    /// requests must not name it (see [`BootRequest::validate`]).
    Sec2,
    /// GPU system processor.
    Gsp,
    /// Power management unit.
    Pmu,
    /// Video decode engine 0.
    NvDec0,
    /// Video encode engine 0.
    NvEnc0,
    /// Copy engine 2.
    Ce2,
}

/// Location and extent of the untrusted staging buffer holding the firmware
/// container before it is copied into the protected window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingRange {
    /// Device-visible base address of the staging buffer.
    pub base: u64,
    /// Length of the staging buffer in bytes.
    pub len: u64,
}

impl StagingRange {
    /// End address (one past the last byte).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.len)
    }
}

/// Immutable parameters of one boot request.
#[derive(Debug, Clone)]
pub struct BootRequest {
    /// Declared size of the firmware payload in bytes. Must match the
    /// container header or the load step fails.
    pub image_size: u64,
    /// Destination processor that will run the loaded firmware.
    pub processor: ProcessorId,
    /// Staging buffer holding the firmware container.
    pub staging: StagingRange,
    /// Final sub-region grants that persist for the running destination
    /// processor after cleanup drops the loader's elevated access.
    pub grants: Vec<SubRegionGrant>,
}

impl BootRequest {
    /// Check the request before any hardware action is taken.
    ///
    /// A failed validation performs no hardware action and no cleanup:
    /// nothing was started.
    pub fn validate(&self) -> Result<(), BootError> {
        if self.image_size == 0 {
            return Err(BootError::InvalidArgument("image size is zero"));
        }
        if self.staging.len == 0 {
            return Err(BootError::InvalidArgument("staging buffer is empty"));
        }
        if self.staging.base.checked_add(self.staging.len).is_none() {
            return Err(BootError::InvalidArgument("staging range wraps"));
        }
        for (i, grant) in self.grants.iter().enumerate() {
            if grant.len == 0 {
                return Err(BootError::InvalidArgument("zero-length grant range"));
            }
            if grant.access.is_empty() {
                return Err(BootError::InvalidArgument("grant enables no access"));
            }
            if grant.consumer == ConsumerId::Sec2 {
                // Sec2 is the loader's own identity; handing it out would let
                // the caller alias the elevated copy grant.
                return Err(BootError::InvalidArgument("grant names the loader engine"));
            }
            if self.grants[..i].iter().any(|g| g.consumer == grant.consumer) {
                return Err(BootError::InvalidArgument("duplicate grant consumer"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::Access;

    fn valid_request() -> BootRequest {
        BootRequest {
            image_size: 0x400,
            processor: ProcessorId::Gsp,
            staging: StagingRange { base: 0x1000, len: 0x800 },
            grants: vec![SubRegionGrant {
                consumer: ConsumerId::Gsp,
                start: 0,
                len: 0x400,
                access: Access::READ,
            }],
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn zero_image_size_rejected() {
        let mut req = valid_request();
        req.image_size = 0;
        assert!(matches!(req.validate(), Err(BootError::InvalidArgument(_))));
    }

    #[test]
    fn loader_engine_grant_rejected() {
        let mut req = valid_request();
        req.grants[0].consumer = ConsumerId::Sec2;
        assert!(matches!(req.validate(), Err(BootError::InvalidArgument(_))));
    }

    #[test]
    fn duplicate_consumer_rejected() {
        let mut req = valid_request();
        let dup = req.grants[0].clone();
        req.grants.push(dup);
        assert!(matches!(req.validate(), Err(BootError::InvalidArgument(_))));
    }
}
