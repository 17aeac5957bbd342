//! Ed25519 signing and verification (signature scheme 0x0807).
//!
//! In TLS 1.2 Ed25519 signs the full message (RFC 8422 section 5.10): the
//! ServerKeyExchange parameters, or the raw handshake messages for a client
//! CertificateVerify. There is no prehash.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::Error;

/// Signature algorithm code for Ed25519.
pub const ED25519_ALGORITHM: u16 = 0x0807;

/// Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Sign `message` with a 32-byte Ed25519 seed.
pub fn sign(seed: &[u8; 32], message: &[u8]) -> [u8; 64] {
    SigningKey::from_bytes(seed).sign(message).to_bytes()
}

/// Verify an Ed25519 signature over `message`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), Error> {
    let public_key: &[u8; PUBLIC_KEY_LEN] = public_key.try_into().map_err(|_| Error::Crypto)?;
    let signature: &[u8; 64] = signature.try_into().map_err(|_| Error::Crypto)?;

    let verifying_key = VerifyingKey::from_bytes(public_key).map_err(|_| Error::Crypto)?;
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .map_err(|_| Error::Crypto)
}

/// Derive the Ed25519 public key from a 32-byte private key seed.
pub fn public_key_from_seed(seed: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let seed = [0x01u8; 32];
        let public = public_key_from_seed(&seed);
        let message = b"client_random || server_random || params";

        let signature = sign(&seed, message);
        verify(&public, message, &signature).unwrap();
    }

    #[test]
    fn wrong_message_fails() {
        let seed = [0x02u8; 32];
        let public = public_key_from_seed(&seed);
        let signature = sign(&seed, b"original");
        assert_eq!(verify(&public, b"tampered", &signature), Err(Error::Crypto));
    }

    #[test]
    fn wrong_key_fails() {
        let signature = sign(&[0x03u8; 32], b"message");
        let other = public_key_from_seed(&[0x04u8; 32]);
        assert!(verify(&other, b"message", &signature).is_err());
    }

    #[test]
    fn bad_lengths_fail() {
        let seed = [0x05u8; 32];
        let public = public_key_from_seed(&seed);
        let signature = sign(&seed, b"m");
        assert!(verify(&public[..31], b"m", &signature).is_err());
        assert!(verify(&public, b"m", &signature[..63]).is_err());
    }

    #[test]
    fn signatures_are_deterministic() {
        let seed = [0x06u8; 32];
        assert_eq!(sign(&seed, b"same"), sign(&seed, b"same"));
    }
}
