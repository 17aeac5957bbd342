//! TLS 1.2 key derivation (RFC 5246 sections 6.3, 7.4.9; RFC 7627).
//!
//! ```text
//! master_secret = PRF(pre_master_secret, "extended master secret", session_hash)[0..48]
//! key_block     = PRF(master_secret, "key expansion", server_random || client_random)
//! verify_data   = PRF(master_secret, finished_label, Hash(handshake_messages))[0..12]
//! ```
//!
//! The key block is split, in order, into client_write_key, server_write_key,
//! client_write_IV, server_write_IV. AEAD suites carry no MAC keys.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::prf::prf;
use crate::error::Error;
use crate::tls::cipher_suite::CipherSuite;
use crate::tls::handshake::Role;
use crate::tls::messages::VERIFY_DATA_LEN;

pub const MASTER_SECRET_LEN: usize = 48;

const LABEL_EXTENDED_MASTER_SECRET: &[u8] = b"extended master secret";
const LABEL_KEY_EXPANSION: &[u8] = b"key expansion";
const LABEL_CLIENT_FINISHED: &[u8] = b"client finished";
const LABEL_SERVER_FINISHED: &[u8] = b"server finished";

/// The 48-byte master secret. Wiped on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; MASTER_SECRET_LEN]);

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; MASTER_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Derive the extended master secret from the ECDHE shared secret.
///
/// `session_hash` is the transcript hash through ClientKeyExchange.
pub fn derive_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8; 32],
) -> Result<MasterSecret, Error> {
    let mut out = [0u8; MASTER_SECRET_LEN];
    prf(pre_master_secret, LABEL_EXTENDED_MASTER_SECRET, &[session_hash.as_slice()], &mut out)?;
    Ok(MasterSecret(out))
}

/// Key and implicit IV for one direction.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DirectionalKeys {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Keys for both directions of one connection.
pub struct TrafficKeys {
    pub suite: CipherSuite,
    pub client_write: DirectionalKeys,
    pub server_write: DirectionalKeys,
}

impl TrafficKeys {
    /// `(write, read)` keys as seen from `role`.
    pub fn for_role(&self, role: Role) -> (&DirectionalKeys, &DirectionalKeys) {
        match role {
            Role::Client => (&self.client_write, &self.server_write),
            Role::Server => (&self.server_write, &self.client_write),
        }
    }
}

/// Expand the master secret into traffic keys for `suite`.
pub fn derive_traffic_keys(
    master: &MasterSecret,
    suite: CipherSuite,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<TrafficKeys, Error> {
    let mut block = vec![0u8; suite.key_block_len()];
    prf(&master.0, LABEL_KEY_EXPANSION, &[server_random.as_slice(), client_random.as_slice()], &mut block)?;

    let (key_len, iv_len) = (suite.key_len(), suite.fixed_iv_len());
    let mut off = 0;
    let mut take = |n: usize| {
        let part = block[off..off + n].to_vec();
        off += n;
        part
    };
    let client_key = take(key_len);
    let server_key = take(key_len);
    let client_iv = take(iv_len);
    let server_iv = take(iv_len);
    block.zeroize();

    Ok(TrafficKeys {
        suite,
        client_write: DirectionalKeys { key: client_key, iv: client_iv },
        server_write: DirectionalKeys { key: server_key, iv: server_iv },
    })
}

/// Compute the Finished verify_data for messages sent by `sender`.
pub fn finished_verify_data(
    master: &MasterSecret,
    sender: Role,
    handshake_hash: &[u8; 32],
) -> Result<[u8; VERIFY_DATA_LEN], Error> {
    let label = match sender {
        Role::Client => LABEL_CLIENT_FINISHED,
        Role::Server => LABEL_SERVER_FINISHED,
    };
    let mut out = [0u8; VERIFY_DATA_LEN];
    prf(&master.0, label, &[handshake_hash.as_slice()], &mut out)?;
    Ok(out)
}

/// RFC 5705 keying material exporter.
///
/// The seed is `client_random || server_random [|| u16 length || context]`.
pub fn export_keying_material(
    master: &MasterSecret,
    label: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    context: Option<&[u8]>,
    out: &mut [u8],
) -> Result<(), Error> {
    match context {
        None => prf(&master.0, label, &[client_random.as_slice(), server_random.as_slice()], out),
        Some(ctx) => {
            let len = u16::try_from(ctx.len()).map_err(|_| Error::Crypto)?.to_be_bytes();
            prf(
                &master.0,
                label,
                &[client_random.as_slice(), server_random.as_slice(), len.as_slice(), ctx],
                out,
            )
        }
    }
}
