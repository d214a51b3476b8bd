// CLASSIFICATION: COMMUNITY
// Filename: image.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-08-09

//! Firmware container parsing and the load step.
//!
//! The staging buffer holds a small container: a fixed header describing
//! where the payload and its detached signature live, followed by both. All
//! header fields are treated as untrusted and every derived range is bounds
//! checked before use.
//!
//! The load step DMA-copies header and payload into the locked window. It
//! never validates authenticity itself; that is the external validator's
//! job, invoked between load and permissioning.

use log::info;
use thiserror::Error;

use crate::error::BootError;
use crate::hal::RegionHal;
use crate::region::RegionHandle;
use crate::request::{BootRequest, StagingRange};

/// Container magic, `WPRB` in little-endian.
pub const IMAGE_MAGIC: u32 = 0x4252_5057;
/// Container version this loader understands.
pub const IMAGE_VERSION: u32 = 2;
/// Size of the fixed container header in bytes.
pub const HEADER_LEN: usize = 24;
/// Byte offset of the payload inside the protected window. The header copy
/// occupies the window's first bytes; the payload starts here.
pub const PAYLOAD_OFFSET: u64 = 0x100;
/// Size of a detached Ed25519 signature.
pub const SIGNATURE_LEN: u32 = 64;

/// Container parse failures. Mapped to [`BootError::CopyFailed`] by the
/// sequencer: the staged bytes did not match what the request declared.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Staging buffer shorter than the fixed header.
    #[error("container truncated")]
    Truncated,
    /// Header magic mismatch.
    #[error("bad container magic {0:#x}")]
    BadMagic(u32),
    /// Unsupported container version.
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    /// A header-derived range falls outside the staging buffer.
    #[error("container field out of bounds")]
    Bounds,
    /// Signature descriptor has the wrong size.
    #[error("bad signature size {0}")]
    BadSignatureSize(u32),
}

/// Parsed firmware container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Container version.
    pub version: u32,
    /// Payload offset within the staging buffer.
    pub payload_offset: u32,
    /// Payload size in bytes.
    pub payload_size: u32,
    /// Detached signature offset within the staging buffer.
    pub sig_offset: u32,
    /// Detached signature size in bytes.
    pub sig_size: u32,
}

fn check_range(offset: u32, size: u32, staged_len: usize) -> Result<(), ImageError> {
    let end = u64::from(offset) + u64::from(size);
    if size == 0 || end > staged_len as u64 {
        return Err(ImageError::Bounds);
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ImageError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(ImageError::Truncated)
}

impl ImageHeader {
    /// Parse and bounds-check the container header against the staged bytes.
    pub fn parse(staged: &[u8]) -> Result<Self, ImageError> {
        let magic = read_u32(staged, 0)?;
        if magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic(magic));
        }
        let version = read_u32(staged, 4)?;
        if version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }
        let hdr = Self {
            version,
            payload_offset: read_u32(staged, 8)?,
            payload_size: read_u32(staged, 12)?,
            sig_offset: read_u32(staged, 16)?,
            sig_size: read_u32(staged, 20)?,
        };
        if hdr.sig_size != SIGNATURE_LEN {
            return Err(ImageError::BadSignatureSize(hdr.sig_size));
        }
        check_range(hdr.payload_offset, hdr.payload_size, staged.len())?;
        check_range(hdr.sig_offset, hdr.sig_size, staged.len())?;
        Ok(hdr)
    }

    /// Payload bytes within the staged container.
    #[must_use]
    pub fn payload<'a>(&self, staged: &'a [u8]) -> &'a [u8] {
        // Ranges were checked in `parse`.
        &staged[self.payload_offset as usize..(self.payload_offset + self.payload_size) as usize]
    }

    /// Detached signature bytes within the staged container.
    #[must_use]
    pub fn signature<'a>(&self, staged: &'a [u8]) -> &'a [u8] {
        &staged[self.sig_offset as usize..(self.sig_offset + self.sig_size) as usize]
    }
}

/// DMA-copy the container header and payload into the locked window.
///
/// Requires a valid [`RegionHandle`]: the window is confirmed locked before
/// any byte moves, so the copy never lands in memory the untrusted domain
/// can still reach.
pub fn load(
    hal: &mut dyn RegionHal,
    handle: &RegionHandle,
    req: &BootRequest,
    hdr: &ImageHeader,
) -> Result<(), BootError> {
    if u64::from(hdr.payload_size) != req.image_size {
        return Err(BootError::CopyFailed(format!(
            "declared image size {:#x} does not match container payload size {:#x}",
            req.image_size, hdr.payload_size
        )));
    }

    let header_src = StagingRange { base: req.staging.base, len: HEADER_LEN as u64 };
    hal.copy_to_region(handle.slot(), header_src, 0)
        .map_err(|e| BootError::CopyFailed(e.to_string()))?;

    let payload_src = StagingRange {
        base: req.staging.base + u64::from(hdr.payload_offset),
        len: u64::from(hdr.payload_size),
    };
    hal.copy_to_region(handle.slot(), payload_src, PAYLOAD_OFFSET)
        .map_err(|e| BootError::CopyFailed(e.to_string()))?;

    info!(
        "[Image] {:#x} payload bytes loaded into slot {} at {PAYLOAD_OFFSET:#x}",
        hdr.payload_size,
        handle.slot()
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a well-formed container around `payload` with a zeroed signature.
    pub fn build_container(payload: &[u8], signature: &[u8; 64]) -> Vec<u8> {
        let payload_offset = 0x40u32;
        let sig_offset = payload_offset + payload.len() as u32;
        let mut out = vec![0u8; sig_offset as usize + 64];
        out[0..4].copy_from_slice(&IMAGE_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&IMAGE_VERSION.to_le_bytes());
        out[8..12].copy_from_slice(&payload_offset.to_le_bytes());
        out[12..16].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        out[16..20].copy_from_slice(&sig_offset.to_le_bytes());
        out[20..24].copy_from_slice(&SIGNATURE_LEN.to_le_bytes());
        out[payload_offset as usize..sig_offset as usize].copy_from_slice(payload);
        out[sig_offset as usize..].copy_from_slice(signature);
        out
    }

    #[test]
    fn parse_roundtrip() {
        let staged = build_container(b"payload-bytes", &[0u8; 64]);
        let hdr = ImageHeader::parse(&staged).unwrap();
        assert_eq!(hdr.payload(&staged), b"payload-bytes");
        assert_eq!(hdr.signature(&staged).len(), 64);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut staged = build_container(b"x", &[0u8; 64]);
        staged[0] = 0;
        assert!(matches!(ImageHeader::parse(&staged), Err(ImageError::BadMagic(_))));
    }

    #[test]
    fn payload_escaping_staging_rejected() {
        let mut staged = build_container(b"abcd", &[0u8; 64]);
        // Declare a payload larger than the staged container.
        staged[12..16].copy_from_slice(&0x10_0000u32.to_le_bytes());
        assert_eq!(ImageHeader::parse(&staged), Err(ImageError::Bounds));
    }

    #[test]
    fn truncated_container_rejected() {
        assert_eq!(ImageHeader::parse(&[0u8; 8]), Err(ImageError::Truncated));
    }
}
