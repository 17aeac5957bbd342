//! ECDSA P-256 with SHA-256 (signature scheme 0x0403).
//!
//! Signatures travel DER-encoded (`ECDSA-Sig-Value`); public keys are SEC1
//! uncompressed points. Signing is deterministic (RFC 6979), so no RNG is
//! needed here.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, Signature, SigningKey, VerifyingKey};

use crate::error::Error;

/// Signature algorithm code for ecdsa_secp256r1_sha256.
pub const ECDSA_P256_SHA256_ALGORITHM: u16 = 0x0403;

/// Uncompressed SEC1 point length.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Upper bound on a DER-encoded P-256 signature.
pub const MAX_SIGNATURE_LEN: usize = 72;

/// Sign `message` (hashed with SHA-256 internally) with a 32-byte scalar.
pub fn sign(scalar: &[u8; 32], message: &[u8]) -> Result<Vec<u8>, Error> {
    let signing_key = SigningKey::from_slice(scalar).map_err(|_| Error::Crypto)?;
    let signature: DerSignature = signing_key.sign(message);
    Ok(signature.as_bytes().to_vec())
}

/// Verify a DER-encoded signature over `message`.
pub fn verify(public_key: &[u8], message: &[u8], signature_der: &[u8]) -> Result<(), Error> {
    if signature_der.len() > MAX_SIGNATURE_LEN {
        return Err(Error::Crypto);
    }
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| Error::Crypto)?;
    let signature = Signature::from_der(signature_der).map_err(|_| Error::Crypto)?;
    verifying_key.verify(message, &signature).map_err(|_| Error::Crypto)
}

/// Derive the P-256 public key (SEC1 uncompressed) from a 32-byte private scalar.
pub fn public_key_from_scalar(scalar: &[u8; 32]) -> Result<heapless::Vec<u8, PUBLIC_KEY_LEN>, Error> {
    let signing_key = SigningKey::from_slice(scalar).map_err(|_| Error::Crypto)?;
    let encoded = signing_key.verifying_key().to_encoded_point(false);

    let mut result = heapless::Vec::new();
    result
        .extend_from_slice(encoded.as_bytes())
        .map_err(|_| Error::Crypto)?;
    Ok(result)
}
