//! Known-answer self tests run once per process by [`init`](crate::init).

use std::sync::OnceLock;

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake128;

use crate::crypto::prf::prf;
use crate::crypto::rustcrypto::Aes128GcmAead;
use crate::crypto::shake::{generate_keystream, Shake128Cipher, StreamCipher};
use crate::crypto::Aead;
use crate::error::Error;

static RESULT: OnceLock<Result<(), Error>> = OnceLock::new();

/// Run the self tests on first call; later calls return the cached outcome.
pub(crate) fn run_once() -> Result<(), Error> {
    RESULT
        .get_or_init(|| {
            let result = run_all();
            match &result {
                Ok(()) => log::debug!("self tests passed"),
                Err(e) => log::error!("self tests failed: {e}"),
            }
            result
        })
        .clone()
}

fn run_all() -> Result<(), Error> {
    kat_aes128_gcm()?;
    kat_shake128()?;
    keystream_consistency()?;
    prf_prefix_consistency()?;
    Ok(())
}

/// AES-128-GCM, GCM test case 2: zero key, zero IV, one zero block.
fn kat_aes128_gcm() -> Result<(), Error> {
    const CIPHERTEXT: [u8; 16] = [
        0x03, 0x88, 0xda, 0xce, 0x60, 0xb6, 0xa3, 0x92, 0xf3, 0x28, 0xc2, 0xb9, 0x71, 0xb2, 0xfe, 0x78,
    ];
    const TAG: [u8; 16] = [
        0xab, 0x6e, 0x47, 0xd4, 0x2c, 0xec, 0x13, 0xbd, 0xf5, 0x3a, 0x67, 0xb2, 0x12, 0x57, 0xbd, 0xdf,
    ];

    let aead = Aes128GcmAead::new(&[0u8; 16])?;
    let mut buf = [0u8; 32];
    let len = aead.seal_in_place(&[0u8; 12], &[], &mut buf, 16)?;
    if len != 32 || buf[..16] != CIPHERTEXT || buf[16..] != TAG {
        return Err(Error::SelfTestFailed("AES-128-GCM ciphertext mismatch"));
    }
    let len = aead.open_in_place(&[0u8; 12], &[], &mut buf, 32)?;
    if len != 16 || buf[..16] != [0u8; 16] {
        return Err(Error::SelfTestFailed("AES-128-GCM decryption mismatch"));
    }
    Ok(())
}

/// SHAKE-128 of the empty message (FIPS 202).
fn kat_shake128() -> Result<(), Error> {
    const EXPECTED: [u8; 32] = [
        0x7f, 0x9c, 0x2b, 0xa4, 0xe8, 0x8f, 0x82, 0x7d, 0x61, 0x60, 0x45, 0x50, 0x76, 0x05, 0x85, 0x3e,
        0xd7, 0x3b, 0x80, 0x93, 0xf6, 0xef, 0xbc, 0x88, 0xeb, 0x1a, 0x6e, 0xac, 0xfa, 0x66, 0xef, 0x26,
    ];

    let mut xof = Shake128::default();
    xof.update(&[]);
    let mut out = [0u8; 32];
    xof.finalize_xof().read(&mut out);
    if out != EXPECTED {
        return Err(Error::SelfTestFailed("SHAKE-128 digest mismatch"));
    }
    Ok(())
}

/// XOR over zeros must reproduce the raw keystream, across block boundaries.
fn keystream_consistency() -> Result<(), Error> {
    let key = [0x5a; 32];
    let expected = generate_keystream(&key, 400)?;

    let mut cipher = Shake128Cipher::with_key(&key)?;
    let mut buf = [0u8; 400];
    let (head, tail) = buf.split_at_mut(100);
    cipher.apply_keystream(head)?;
    cipher.apply_keystream(tail)?;
    if buf[..] != expected[..] {
        return Err(Error::SelfTestFailed("SHAKE-128 keystream mismatch"));
    }
    Ok(())
}

/// A shorter PRF output is a prefix of a longer one.
fn prf_prefix_consistency() -> Result<(), Error> {
    let mut short = [0u8; 12];
    let mut long = [0u8; 104];
    prf(b"secret", b"self test", &[b"seed".as_slice()], &mut short)?;
    prf(b"secret", b"self test", &[b"seed".as_slice()], &mut long)?;
    if long[..12] != short || long[..32] == [0u8; 32] {
        return Err(Error::SelfTestFailed("PRF output mismatch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_tests_pass() {
        assert_eq!(run_all(), Ok(()));
    }

    #[test]
    fn result_is_cached() {
        assert_eq!(run_once(), Ok(()));
        assert_eq!(run_once(), Ok(()));
        assert!(RESULT.get().is_some());
    }
}
