// CLASSIFICATION: COMMUNITY
// Filename: verify.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-08-11

//! Image authenticity validation and boot measurement.
//!
//! The sequencer treats the validator as an external collaborator behind the
//! [`ImageValidator`] trait and invokes it between load and permissioning.
//! There is no bypass path: a boot either carries a signature the trust
//! anchor accepts, or it fails with a rejected-signature outcome and the
//! window is torn back down.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use log::{info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::image::ImageHeader;

/// Validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// Trust anchor bytes do not form a valid public key.
    #[error("malformed verifying key")]
    BadKey,
    /// Signature bytes have the wrong shape.
    #[error("malformed signature")]
    BadSignature,
    /// The signature does not match the payload under the trust anchor.
    #[error("signature verification failed")]
    Rejected,
}

/// SHA-256 boot measurement of an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement(pub [u8; 32]);

/// Extend a 32-byte measurement register in place:
/// `reg := SHA256(reg || data)`.
pub fn extend_measurement(reg: &mut [u8; 32], data: &[u8]) {
    let mut hasher = Sha256::new();
    hasher.update(&*reg);
    hasher.update(data);
    *reg = hasher.finalize().into();
}

/// External signature/measurement validator.
pub trait ImageValidator {
    /// Judge the staged image. Returns the boot measurement on acceptance.
    fn validate(&self, hdr: &ImageHeader, staged: &[u8]) -> Result<Measurement, ValidatorError>;
}

/// Production validator: Ed25519 detached signature over the payload,
/// SHA-256 digest extended into the measurement.
pub struct Ed25519Validator {
    key: VerifyingKey,
}

impl Ed25519Validator {
    /// Build a validator from the configured trust anchor.
    pub fn new(key_bytes: &[u8; 32]) -> Result<Self, ValidatorError> {
        VerifyingKey::from_bytes(key_bytes)
            .map(|key| Self { key })
            .map_err(|_| ValidatorError::BadKey)
    }
}

impl ImageValidator for Ed25519Validator {
    fn validate(&self, hdr: &ImageHeader, staged: &[u8]) -> Result<Measurement, ValidatorError> {
        let payload = hdr.payload(staged);
        let sig_bytes: &[u8; 64] = hdr
            .signature(staged)
            .try_into()
            .map_err(|_| ValidatorError::BadSignature)?;
        let signature = Signature::from_bytes(sig_bytes);

        if let Err(err) = self.key.verify(payload, &signature) {
            warn!("[Verify] signature rejected: {err}");
            return Err(ValidatorError::Rejected);
        }

        let digest: [u8; 32] = Sha256::digest(payload).into();
        let mut measurement = [0u8; 32];
        extend_measurement(&mut measurement, &digest);
        info!("[Verify] image accepted, digest {}", hex::encode(digest));
        Ok(Measurement(measurement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image;
    use crate::image::tests::build_container;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, [u8; 32]) {
        let sk = SigningKey::from_bytes(&[7u8; 32]);
        let vk = sk.verifying_key().to_bytes();
        (sk, vk)
    }

    #[test]
    fn signed_image_is_accepted() {
        let (sk, vk) = keypair();
        let payload = b"management processor runtime";
        let sig = sk.sign(payload).to_bytes();
        let staged = build_container(payload, &sig);
        let hdr = image::ImageHeader::parse(&staged).unwrap();
        let validator = Ed25519Validator::new(&vk).unwrap();
        let measurement = validator.validate(&hdr, &staged).unwrap();
        assert_ne!(measurement.0, [0u8; 32]);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (sk, vk) = keypair();
        let payload = b"management processor runtime";
        let sig = sk.sign(payload).to_bytes();
        let mut staged = build_container(payload, &sig);
        staged[0x40] ^= 0xff;
        let hdr = image::ImageHeader::parse(&staged).unwrap();
        let validator = Ed25519Validator::new(&vk).unwrap();
        assert_eq!(validator.validate(&hdr, &staged), Err(ValidatorError::Rejected));
    }

    #[test]
    fn measurement_extend_chains() {
        let mut reg = [0u8; 32];
        extend_measurement(&mut reg, b"first");
        let first = reg;
        extend_measurement(&mut reg, b"second");
        assert_ne!(reg, first);
        assert_ne!(reg, [0u8; 32]);
    }
}
