//! Cryptographic building blocks for the TLS 1.2 engine.
//!
//! The record layer needs an AEAD per suite ([`Aead`], implemented over
//! RustCrypto in [`rustcrypto`]); the handshake needs the SHA-256 PRF
//! ([`prf`]), X25519, and Ed25519 / ECDSA P-256 signatures. [`der`] carries
//! just enough ASN.1 to read and build end-entity certificates, and
//! [`shake`] exposes SHAKE-128 as a keystream primitive.

mod aead;
pub mod der;
pub mod ecdsa_p256;
pub mod ed25519;
pub mod prf;
pub mod rustcrypto;
pub mod shake;

pub use aead::{Aead, NONCE_LEN, TAG_LEN};

/// Build a 12-byte nonce by XORing `iv` with the big-endian sequence number.
///
/// The sequence number lands in the last 8 bytes (RFC 7905 section 2).
pub fn xor_nonce(iv: &[u8; 12], seq: u64) -> [u8; 12] {
    let mut nonce = *iv;
    for (n, s) in nonce[4..].iter_mut().zip(seq.to_be_bytes()) {
        *n ^= s;
    }
    nonce
}
