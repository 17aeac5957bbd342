//! RustCrypto-backed AEADs for the two record protection suites.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, Tag};

use crate::crypto::aead::{Aead, NONCE_LEN, TAG_LEN};
use crate::error::Error;

/// Any RustCrypto AEAD with a 96-bit nonce and a 128-bit tag.
pub struct RustCryptoAead<C> {
    cipher: C,
}

/// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 record cipher.
pub type Aes128GcmAead = RustCryptoAead<aes_gcm::Aes128Gcm>;

/// TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 record cipher (RFC 7905).
pub type ChaCha20Poly1305Aead = RustCryptoAead<chacha20poly1305::ChaCha20Poly1305>;

impl<C: KeyInit> RustCryptoAead<C> {
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeyLength { length: key.len() })?;
        Ok(Self { cipher })
    }
}

impl<C> Aead for RustCryptoAead<C>
where
    C: AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error> {
        let total = payload_len + TAG_LEN;
        if buf.len() < total {
            return Err(Error::Crypto);
        }
        let (payload, rest) = buf.split_at_mut(payload_len);
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::<C>::from_slice(nonce), aad, payload)
            .map_err(|_| Error::Crypto)?;
        rest[..TAG_LEN].copy_from_slice(&tag);
        Ok(total)
    }

    fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        sealed_len: usize,
    ) -> Result<usize, Error> {
        if sealed_len < TAG_LEN || buf.len() < sealed_len {
            return Err(Error::Crypto);
        }
        let plaintext_len = sealed_len - TAG_LEN;
        let (payload, tag) = buf[..sealed_len].split_at_mut(plaintext_len);
        self.cipher
            .decrypt_in_place_detached(Nonce::<C>::from_slice(nonce), aad, payload, Tag::<C>::from_slice(tag))
            .map_err(|_| Error::Crypto)?;
        Ok(plaintext_len)
    }
}
