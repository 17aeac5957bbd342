//! Handshake transcript.
//!
//! Keeps a running SHA-256 over every handshake message (Finished,
//! extended master secret) and the raw messages themselves: an Ed25519
//! client CertificateVerify signs the concatenated messages, not a hash.

use sha2::{Digest, Sha256};

/// Running SHA-256 transcript over TLS handshake messages.
#[derive(Clone, Default)]
pub struct Transcript {
    hasher: Sha256,
    messages: Vec<u8>,
    count: usize,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one complete handshake message (header included).
    pub fn update(&mut self, message: &[u8]) {
        self.hasher.update(message);
        self.messages.extend_from_slice(message);
        self.count += 1;
    }

    /// Current transcript hash without consuming the state.
    pub fn current_hash(&self) -> [u8; 32] {
        self.hasher.clone().finalize().into()
    }

    /// All messages so far, concatenated.
    pub fn messages(&self) -> &[u8] {
        &self.messages
    }

    /// Number of handshake messages recorded.
    pub fn message_count(&self) -> usize {
        self.count
    }
}
