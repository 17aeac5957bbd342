//! Channel configuration.

use std::sync::Arc;

use crate::credentials::{CredentialsProvider, InMemoryCredentials};
use crate::policy::{DefaultPolicy, Policy};
use crate::session::{NoSessionCache, SessionCache};
use crate::tls::cipher_suite::CipherSuite;
use crate::transport::{Clock, SystemClock, MICROS_PER_SEC};
use crate::channel::record::MAX_PLAINTEXT_LEN;

/// Default session lifetime: two hours.
pub const DEFAULT_SESSION_LIFETIME: u64 = 7200 * MICROS_PER_SEC;

/// Everything a channel needs besides its handler and RNG.
///
/// Cloning shares the policy, credentials, cache and clock.
#[derive(Clone)]
pub struct ChannelConfig {
    pub policy: Arc<dyn Policy>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub session_cache: Arc<dyn SessionCache>,
    pub clock: Arc<dyn Clock>,
    /// Server name sent by a client; also the credentials context hint.
    pub server_name: Option<String>,
    /// Session lifetime in microseconds.
    pub session_lifetime: u64,
    /// Largest plaintext per outgoing record, at most 2^14.
    pub max_fragment_len: usize,
}

impl ChannelConfig {
    pub fn new(
        policy: Arc<dyn Policy>,
        credentials: Arc<dyn CredentialsProvider>,
        session_cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            policy,
            credentials,
            session_cache,
            clock: Arc::new(SystemClock),
            server_name: None,
            session_lifetime: DEFAULT_SESSION_LIFETIME,
            max_fragment_len: MAX_PLAINTEXT_LEN,
        }
    }

    /// A client configuration with the default policy, no client
    /// certificate and no session cache.
    pub fn client(server_name: Option<&str>) -> Self {
        Self::new(Arc::new(DefaultPolicy::new()), Arc::new(InMemoryCredentials::new()), Arc::new(NoSessionCache))
            .with_server_name(server_name)
    }

    pub fn with_server_name(mut self, server_name: Option<&str>) -> Self {
        self.server_name = server_name.map(str::to_owned);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.session_cache = cache;
        self
    }

    pub fn with_session_lifetime(mut self, micros: u64) -> Self {
        self.session_lifetime = micros;
        self
    }

    /// Clamped to `1..=2^14`.
    pub fn with_max_fragment_len(mut self, len: usize) -> Self {
        self.max_fragment_len = len.clamp(1, MAX_PLAINTEXT_LEN);
        self
    }

    pub(crate) fn offered_cipher_suites(&self) -> &[CipherSuite] {
        self.policy.acceptable_cipher_suites()
    }
}

impl core::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("server_name", &self.server_name)
            .field("cipher_suites", &self.policy.acceptable_cipher_suites())
            .field("session_lifetime", &self.session_lifetime)
            .field("max_fragment_len", &self.max_fragment_len)
            .finish_non_exhaustive()
    }
}
