//! TLS 1.2 record layer codec (RFC 5246 section 6.2, RFC 5288, RFC 7905).
//!
//! ```text
//! content_type (1) | version (2) | length (2, BE) | fragment
//! ```
//!
//! Protected fragments carry `[explicit_nonce] || ciphertext || tag`. The
//! AEAD additional data is `seq_num (8) || type (1) || version (2) ||
//! plaintext_length (2)`.

use crate::crypto::rustcrypto::{Aes128GcmAead, ChaCha20Poly1305Aead};
use crate::crypto::{xor_nonce, Aead};
use crate::error::{Error, ProtocolViolation};
use crate::tls::cipher_suite::CipherSuite;
use crate::tls::key_schedule::DirectionalKeys;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }
}

/// TLS record header (5 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub length: u16,
}

pub const RECORD_HEADER_LEN: usize = 5;

/// Maximum plaintext fragment (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Maximum record payload: plaintext plus the allowed expansion.
pub const MAX_RECORD_PAYLOAD: usize = MAX_PLAINTEXT_LEN + 2048;

/// Version written on every record.
const RECORD_VERSION: u16 = 0x0303;

/// Append a record header.
pub fn encode_record_header(content_type: ContentType, length: u16, out: &mut Vec<u8>) {
    out.push(content_type as u8);
    out.extend_from_slice(&RECORD_VERSION.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
}

/// Decode and validate a record header.
///
/// Returns `Ok(None)` if fewer than five bytes are available. The content
/// type, the major version and the length limit are checked here, before
/// anything is buffered for the fragment.
pub fn decode_record_header(data: &[u8]) -> Result<Option<RecordHeader>, Error> {
    if data.len() < RECORD_HEADER_LEN {
        return Ok(None);
    }
    let content_type =
        ContentType::from_byte(data[0]).ok_or(ProtocolViolation::UnknownContentType(data[0]))?;
    let version = u16::from_be_bytes([data[1], data[2]]);
    if data[1] != 0x03 {
        return Err(ProtocolViolation::BadRecordVersion(version).into());
    }
    let length = u16::from_be_bytes([data[3], data[4]]);
    if length as usize > MAX_RECORD_PAYLOAD {
        return Err(ProtocolViolation::RecordOverflow { length: length as usize }.into());
    }
    Ok(Some(RecordHeader { content_type, version, length }))
}

/// Append an unprotected record.
pub fn encode_plaintext_record(content_type: ContentType, fragment: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    if fragment.len() > MAX_PLAINTEXT_LEN {
        return Err(ProtocolViolation::RecordOverflow { length: fragment.len() }.into());
    }
    encode_record_header(content_type, fragment.len() as u16, out);
    out.extend_from_slice(fragment);
    Ok(())
}

/// Protection state for one direction of a connection.
///
/// The sequence number starts at zero and advances only after a record
/// was successfully sealed or opened. It never wraps: at `u64::MAX` the
/// state refuses to do anything more.
pub struct ConnectionState {
    suite: CipherSuite,
    cipher: Box<dyn Aead + Send + Sync>,
    /// Implicit IV. For AES-GCM only the first four bytes (the salt) are
    /// set, so XOR with the sequence number yields `salt || seq`.
    iv: [u8; 12],
    sequence: u64,
}

impl ConnectionState {
    pub fn new(suite: CipherSuite, keys: &DirectionalKeys) -> Result<Self, Error> {
        if keys.iv.len() != suite.fixed_iv_len() {
            return Err(Error::InvalidIv { length: keys.iv.len() });
        }
        let cipher: Box<dyn Aead + Send + Sync> = match suite {
            CipherSuite::EcdheEcdsaWithAes128GcmSha256 => Box::new(Aes128GcmAead::new(&keys.key)?),
            CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256 => Box::new(ChaCha20Poly1305Aead::new(&keys.key)?),
        };
        let mut iv = [0u8; 12];
        iv[..keys.iv.len()].copy_from_slice(&keys.iv);
        Ok(Self { suite, cipher, iv, sequence: 0 })
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.suite
    }

    /// Sequence number of the next record.
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    fn additional_data(&self, content_type: ContentType, plaintext_len: usize) -> [u8; 13] {
        let mut aad = [0u8; 13];
        aad[..8].copy_from_slice(&self.sequence.to_be_bytes());
        aad[8] = content_type as u8;
        aad[9..11].copy_from_slice(&RECORD_VERSION.to_be_bytes());
        aad[11..].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
        aad
    }

    /// Protect `plaintext` as one record and append it to `out`.
    ///
    /// On error nothing is appended and the sequence number is unchanged.
    pub fn seal(&mut self, content_type: ContentType, plaintext: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        if self.sequence == u64::MAX {
            return Err(ProtocolViolation::SequenceExhausted.into());
        }
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(ProtocolViolation::RecordOverflow { length: plaintext.len() }.into());
        }
        let explicit = self.suite.explicit_nonce_len();
        let tag = self.suite.tag_len();
        let payload_len = explicit + plaintext.len() + tag;

        let start = out.len();
        encode_record_header(content_type, payload_len as u16, out);
        if explicit > 0 {
            out.extend_from_slice(&self.sequence.to_be_bytes());
        }
        let body = out.len();
        out.extend_from_slice(plaintext);
        out.resize(body + plaintext.len() + tag, 0);

        let nonce = xor_nonce(&self.iv, self.sequence);
        let aad = self.additional_data(content_type, plaintext.len());
        match self.cipher.seal_in_place(&nonce, &aad, &mut out[body..], plaintext.len()) {
            Ok(_) => {
                self.sequence += 1;
                Ok(())
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    /// Authenticate and decrypt one record fragment.
    pub fn open(&mut self, header: &RecordHeader, fragment: &[u8]) -> Result<Vec<u8>, Error> {
        if self.sequence == u64::MAX {
            return Err(ProtocolViolation::SequenceExhausted.into());
        }
        let explicit = self.suite.explicit_nonce_len();
        let tag = self.suite.tag_len();
        if fragment.len() < explicit + tag {
            return Err(ProtocolViolation::BadRecordMac.into());
        }
        let plaintext_len = fragment.len() - explicit - tag;
        if plaintext_len > MAX_PLAINTEXT_LEN {
            return Err(ProtocolViolation::RecordOverflow { length: plaintext_len }.into());
        }

        let nonce = if explicit > 0 {
            let mut nonce = self.iv;
            nonce[4..].copy_from_slice(&fragment[..explicit]);
            nonce
        } else {
            xor_nonce(&self.iv, self.sequence)
        };
        let aad = self.additional_data(header.content_type, plaintext_len);
        let mut buf = fragment[explicit..].to_vec();
        let len = buf.len();
        let n = self
            .cipher
            .open_in_place(&nonce, &aad, &mut buf, len)
            .map_err(|_| ProtocolViolation::BadRecordMac)?;
        buf.truncate(n);
        self.sequence += 1;
        Ok(buf)
    }

    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

impl core::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("suite", &self.suite)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
