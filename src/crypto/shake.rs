//! SHAKE-128 used as a stream cipher.
//!
//! The key is absorbed into SHAKE-128 and the XOF output is the keystream.
//! The stream is consumed strictly in order: there is no IV and no seeking,
//! so the only way to restart it is to re-key.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake128, Shake128Reader};

use crate::error::Error;

/// SHAKE-128 rate in bytes; the reader produces output in blocks of this size.
const RATE: usize = 168;

/// Accepted key lengths for a stream cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLengthSpec {
    pub min: usize,
    pub max: usize,
    pub multiple: usize,
}

impl KeyLengthSpec {
    pub fn accepts(&self, length: usize) -> bool {
        length >= self.min && length <= self.max && length % self.multiple == 0
    }
}

/// A keyed keystream generator XORed over caller buffers.
pub trait StreamCipher {
    /// Algorithm name.
    fn name(&self) -> &'static str;

    /// Key lengths this cipher accepts.
    fn key_spec(&self) -> KeyLengthSpec;

    /// Key the cipher, resetting the keystream to its start.
    fn set_key(&mut self, key: &[u8]) -> Result<(), Error>;

    /// Set an IV. Only ciphers that take one accept a non-empty value.
    fn set_iv(&mut self, iv: &[u8]) -> Result<(), Error>;

    /// XOR `buf` with the next `buf.len()` keystream bytes and advance.
    fn apply_keystream(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Jump to an absolute keystream offset.
    fn seek(&mut self, offset: u64) -> Result<(), Error>;

    /// Forget the key.
    fn clear(&mut self);
}

/// SHAKE-128 XOF keystream.
#[derive(Default)]
pub struct Shake128Cipher {
    reader: Option<Shake128Reader>,
}

impl Shake128Cipher {
    pub const KEY_SPEC: KeyLengthSpec = KeyLengthSpec { min: 16, max: 160, multiple: 8 };

    pub fn new() -> Self {
        Self::default()
    }

    /// A cipher keyed with `key`.
    pub fn with_key(key: &[u8]) -> Result<Self, Error> {
        let mut cipher = Self::new();
        cipher.set_key(key)?;
        Ok(cipher)
    }

    pub fn is_keyed(&self) -> bool {
        self.reader.is_some()
    }

    /// Write the next `out.len()` keystream bytes into `out` and advance.
    pub fn fill_keystream(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let reader = self.reader.as_mut().ok_or(Error::InvalidState)?;
        reader.read(out);
        Ok(())
    }
}

impl core::fmt::Debug for Shake128Cipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shake128Cipher")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}

impl StreamCipher for Shake128Cipher {
    fn name(&self) -> &'static str {
        "SHAKE-128"
    }

    fn key_spec(&self) -> KeyLengthSpec {
        Self::KEY_SPEC
    }

    fn set_key(&mut self, key: &[u8]) -> Result<(), Error> {
        if !Self::KEY_SPEC.accepts(key.len()) {
            return Err(Error::InvalidKeyLength { length: key.len() });
        }
        let mut xof = Shake128::default();
        xof.update(key);
        self.reader = Some(xof.finalize_xof());
        Ok(())
    }

    fn set_iv(&mut self, iv: &[u8]) -> Result<(), Error> {
        if iv.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidIv { length: iv.len() })
        }
    }

    fn apply_keystream(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let reader = self.reader.as_mut().ok_or(Error::InvalidState)?;
        let mut block = [0u8; RATE];
        for chunk in buf.chunks_mut(RATE) {
            let stream = &mut block[..chunk.len()];
            reader.read(stream);
            for (b, k) in chunk.iter_mut().zip(stream.iter()) {
                *b ^= k;
            }
        }
        Ok(())
    }

    fn seek(&mut self, _offset: u64) -> Result<(), Error> {
        Err(Error::UnsupportedOperation)
    }

    fn clear(&mut self) {
        self.reader = None;
    }
}

/// The first `length` keystream bytes for `key`.
pub fn generate_keystream(key: &[u8], length: usize) -> Result<Vec<u8>, Error> {
    let mut cipher = Shake128Cipher::with_key(key)?;
    let mut out = vec![0u8; length];
    cipher.fill_keystream(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn keystream_is_shake128_of_key() {
        let key = [0u8; 16];
        let mut expected = [0u8; 40];
        let mut xof = Shake128::default();
        xof.update(&key);
        xof.finalize_xof().read(&mut expected);

        assert_eq!(generate_keystream(&key, 40).unwrap(), expected);
    }

    #[test]
    fn empty_input_known_answer() {
        // SHAKE128("", 256) from FIPS 202 examples; pins the sha3 backend.
        let mut out = [0u8; 32];
        Shake128::default().finalize_xof().read(&mut out);
        assert_eq!(
            out,
            hex!("7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef26")
        );
    }

    #[test]
    fn apply_is_sequential() {
        let key = [9u8; 32];
        let whole = generate_keystream(&key, 500).unwrap();

        let mut cipher = Shake128Cipher::with_key(&key).unwrap();
        let mut first = vec![0u8; 7];
        let mut second = vec![0u8; 493];
        cipher.apply_keystream(&mut first).unwrap();
        cipher.apply_keystream(&mut second).unwrap();
        assert_eq!(first, whole[..7]);
        assert_eq!(second, whole[7..]);
    }

    #[test]
    fn key_length_bounds() {
        for len in [0usize, 8, 15, 17, 20, 168, 200] {
            assert_eq!(
                Shake128Cipher::with_key(&vec![0u8; len]).err(),
                Some(Error::InvalidKeyLength { length: len }),
                "length {len}"
            );
        }
        for len in [16usize, 24, 32, 64, 160] {
            assert!(Shake128Cipher::with_key(&vec![0u8; len]).is_ok(), "length {len}");
        }
    }

    #[test]
    fn unkeyed_cipher_refuses_to_run() {
        let mut cipher = Shake128Cipher::new();
        assert!(cipher.apply_keystream(&mut [0u8; 4]).is_err());
    }

    #[test]
    fn clear_forgets_key() {
        let mut cipher = Shake128Cipher::with_key(&[1u8; 16]).unwrap();
        cipher.clear();
        assert!(!cipher.is_keyed());
    }

    #[test]
    fn iv_and_seek() {
        let mut cipher = Shake128Cipher::with_key(&[1u8; 16]).unwrap();
        assert_eq!(cipher.set_iv(&[]), Ok(()));
        assert_eq!(cipher.set_iv(&[0u8; 12]), Err(Error::InvalidIv { length: 12 }));
        assert_eq!(cipher.seek(0), Err(Error::UnsupportedOperation));
    }
}
