use crate::error::Error;

/// Nonce length shared by both record AEADs.
pub const NONCE_LEN: usize = 12;

/// Tag length shared by both record AEADs.
pub const TAG_LEN: usize = 16;

/// A record protection AEAD.
///
/// The tag is written directly after the ciphertext. How the nonce is
/// formed (salt plus explicit nonce, or IV XOR sequence) is the record
/// layer's business.
pub trait Aead {
    /// Encrypt `buf[..payload_len]` in place and append the tag.
    ///
    /// `buf` must hold `payload_len + TAG_LEN` bytes. Returns that length.
    fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error>;

    /// Verify and decrypt `buf[..sealed_len]` (ciphertext then tag) in place.
    ///
    /// Returns the plaintext length. On failure `buf` holds garbage.
    fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        sealed_len: usize,
    ) -> Result<usize, Error>;
}
