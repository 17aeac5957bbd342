//! Shared fixtures for the channel integration tests: deterministic RNGs,
//! a recording handler and an in-memory loopback between two channels.

#![allow(dead_code)]

use std::ops::ControlFlow;
use std::sync::Arc;

use milli_tls::{
    Alert, Certificate, Channel, ChannelConfig, ChannelHandler, DefaultPolicy, Error, InMemoryCredentials,
    InMemorySessionCache, PrivateKey, Rng, Session, SessionCache, Usage,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Predictable byte sequence starting at the seed.
pub struct TestRng(pub u8);

impl Rng for TestRng {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

/// Seeded ChaCha-based RNG for tests that need distinct-looking randomness.
pub struct SeededRng(StdRng);

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Rng for SeededRng {
    fn fill(&mut self, buf: &mut [u8]) {
        self.0.fill_bytes(buf);
    }
}

/// Handler that records everything the channel reports.
pub struct Recorder {
    pub writes: Vec<Vec<u8>>,
    pub data: Vec<u8>,
    pub alerts: Vec<Alert>,
    pub sessions: Vec<Session>,
    pub accept: bool,
    pub stop_after_data: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            data: Vec::new(),
            alerts: Vec::new(),
            sessions: Vec::new(),
            accept: true,
            stop_after_data: false,
        }
    }
}

impl ChannelHandler for Recorder {
    fn on_output_ready(&mut self, bytes: &[u8]) {
        self.writes.push(bytes.to_vec());
    }

    fn on_data_received(&mut self, data: &[u8]) -> ControlFlow<()> {
        self.data.extend_from_slice(data);
        if self.stop_after_data {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_handshake_complete(&mut self, session: &Session) -> bool {
        self.sessions.push(session.clone());
        self.accept
    }

    fn on_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }
}

pub const SERVER_NAME: &str = "server.test";

pub fn identity(seed: u8, common_name: &str) -> (Certificate, PrivateKey) {
    let key = PrivateKey::ed25519_from_seed([seed; 32]);
    let cert = Certificate::self_signed(&key, common_name).unwrap();
    (cert, key)
}

pub fn server_credentials() -> InMemoryCredentials {
    let (cert, key) = identity(0x01, SERVER_NAME);
    InMemoryCredentials::new().with_identity(Usage::TlsServer, vec![cert], key).unwrap()
}

pub fn server_config(policy: DefaultPolicy, cache: Arc<dyn SessionCache>) -> ChannelConfig {
    ChannelConfig::new(Arc::new(policy), Arc::new(server_credentials()), cache)
}

pub fn client_config(policy: DefaultPolicy, cache: Arc<dyn SessionCache>) -> ChannelConfig {
    ChannelConfig::client(Some(SERVER_NAME)).with_policy(Arc::new(policy)).with_session_cache(cache)
}

pub fn cache() -> Arc<InMemorySessionCache> {
    Arc::new(InMemorySessionCache::new(16))
}

/// A client/server pair with default policies and private caches.
pub fn pair() -> (Channel<Recorder>, Channel<Recorder>) {
    pair_with(client_config(DefaultPolicy::new(), cache()), server_config(DefaultPolicy::new(), cache()))
}

pub fn pair_with(client: ChannelConfig, server: ChannelConfig) -> (Channel<Recorder>, Channel<Recorder>) {
    (
        Channel::client(client, Recorder::default(), &mut TestRng(0x10)).unwrap(),
        Channel::server(server, Recorder::default(), &mut TestRng(0x50)).unwrap(),
    )
}

/// Deliver every queued write from `from` to `to`, completing each write
/// on `from` before the bytes reach `to`.
pub fn transfer(from: &mut Channel<Recorder>, to: &mut Channel<Recorder>) -> Result<bool, Error> {
    transfer_chunked(from, to, usize::MAX)
}

/// Like [`transfer`], but feeds `to` at most `chunk` bytes per call.
pub fn transfer_chunked(from: &mut Channel<Recorder>, to: &mut Channel<Recorder>, chunk: usize) -> Result<bool, Error> {
    let mut moved = false;
    loop {
        let writes = std::mem::take(&mut from.handler_mut().writes);
        if writes.is_empty() {
            return Ok(moved);
        }
        for bytes in writes {
            moved = true;
            from.write_complete();
            for piece in bytes.chunks(chunk) {
                to.received(piece)?;
            }
        }
    }
}

/// Start the client and shuttle bytes until both sides go quiet.
pub fn connect(client: &mut Channel<Recorder>, server: &mut Channel<Recorder>) -> Result<(), Error> {
    connect_chunked(client, server, usize::MAX)
}

pub fn connect_chunked(client: &mut Channel<Recorder>, server: &mut Channel<Recorder>, chunk: usize) -> Result<(), Error> {
    client.start()?;
    loop {
        let a = transfer_chunked(client, server, chunk)?;
        let b = transfer_chunked(server, client, chunk)?;
        if !a && !b {
            return Ok(());
        }
    }
}

/// Take the single pending write of `channel` and complete it.
pub fn take_write(channel: &mut Channel<Recorder>) -> Vec<u8> {
    let mut writes = std::mem::take(&mut channel.handler_mut().writes);
    assert_eq!(writes.len(), 1, "expected exactly one pending write");
    channel.write_complete();
    writes.remove(0)
}

/// Split a byte stream into `(content_type, payload_len)` per record.
pub fn records(mut bytes: &[u8]) -> Vec<(u8, usize)> {
    let mut out = Vec::new();
    while bytes.len() >= 5 {
        let len = u16::from_be_bytes([bytes[3], bytes[4]]) as usize;
        out.push((bytes[0], len));
        bytes = &bytes[5 + len..];
    }
    out
}
