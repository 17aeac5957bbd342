//! TLS 1.2 pseudo-random function (RFC 5246 section 5).
//!
//! `PRF(secret, label, seed) = P_SHA256(secret, label || seed)` where
//!
//! ```text
//! P_hash(secret, seed) = HMAC(secret, A(1) || seed) || HMAC(secret, A(2) || seed) || ...
//! A(0) = seed, A(i) = HMAC(secret, A(i-1))
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 output length.
pub const HASH_LEN: usize = 32;

fn hmac(secret: &[u8], parts: &[&[u8]]) -> Result<[u8; HASH_LEN], Error> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| Error::Crypto)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// Fill `out` with `PRF(secret, label, seed)`.
///
/// `seed` is given in pieces so callers can pass `server_random || client_random`
/// without concatenating.
pub fn prf(secret: &[u8], label: &[u8], seed: &[&[u8]], out: &mut [u8]) -> Result<(), Error> {
    let mut labelled: Vec<&[u8]> = Vec::with_capacity(seed.len() + 1);
    labelled.push(label);
    labelled.extend_from_slice(seed);

    let mut a = hmac(secret, &labelled)?;
    let mut off = 0;
    while off < out.len() {
        let mut block = {
            let mut parts: Vec<&[u8]> = Vec::with_capacity(labelled.len() + 1);
            parts.push(&a);
            parts.extend_from_slice(&labelled);
            hmac(secret, &parts)?
        };

        let n = (out.len() - off).min(HASH_LEN);
        out[off..off + n].copy_from_slice(&block[..n]);
        off += n;
        block.zeroize();

        let next = hmac(secret, &[a.as_slice()])?;
        a.zeroize();
        a = next;
    }
    a.zeroize();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn tls12_sha256_vector() {
        let secret = hex!("9bbe436ba940f017b17652849a71db35");
        let seed = hex!("a0ba9f936cda311827a6f796ffd5198c");
        let mut out = [0u8; 100];
        prf(&secret, b"test label", &[&seed[..]], &mut out).unwrap();
        assert_eq!(
            out,
            hex!(
                "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a"
                "6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab"
                "4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701"
                "87347b66"
            )
        );
    }

    #[test]
    fn split_seed_matches_joined_seed() {
        let mut joined = [0u8; 48];
        let mut split = [0u8; 48];
        prf(b"secret", b"key expansion", &[&b"server-randomclient-random"[..]], &mut joined).unwrap();
        prf(b"secret", b"key expansion", &[&b"server-random"[..], &b"client-random"[..]], &mut split)
            .unwrap();
        assert_eq!(joined, split);
    }

    #[test]
    fn output_is_prefix_stable() {
        let mut short = [0u8; 12];
        let mut long = [0u8; 80];
        prf(b"ms", b"client finished", &[&[7u8; 32][..]], &mut short).unwrap();
        prf(b"ms", b"client finished", &[&[7u8; 32][..]], &mut long).unwrap();
        assert_eq!(short, long[..12]);
    }

    #[test]
    fn label_separates_outputs() {
        let mut a = [0u8; 12];
        let mut b = [0u8; 12];
        prf(b"ms", b"client finished", &[&[1u8; 32][..]], &mut a).unwrap();
        prf(b"ms", b"server finished", &[&[1u8; 32][..]], &mut b).unwrap();
        assert_ne!(a, b);
    }
}
