//! Negotiation policy: which suites, which peers.

use std::sync::Arc;

use crate::credentials::Certificate;
use crate::tls::cipher_suite::{CipherSuite, ProtocolVersion};

/// Immutable per-channel negotiation policy.
pub trait Policy: Send + Sync {
    /// Acceptable suites, most preferred first.
    fn acceptable_cipher_suites(&self) -> &[CipherSuite];

    /// Whether the peer's chain (end-entity first) is acceptable.
    fn accept_certificate_chain(&self, chain: &[Certificate]) -> bool;

    /// Whether a server demands a client certificate.
    fn require_client_auth(&self) -> bool {
        false
    }

    /// Whether `version` may be negotiated. Only TLS 1.2 is implemented.
    fn acceptable_protocol_version(&self, version: ProtocolVersion) -> bool {
        version == ProtocolVersion::TLS12
    }

    fn acceptable_cipher_suite(&self, suite: CipherSuite) -> bool {
        self.acceptable_cipher_suites().contains(&suite)
    }
}

type ChainCheck = Arc<dyn Fn(&[Certificate]) -> bool + Send + Sync>;

/// Policy built from plain settings.
///
/// By default every supported suite is acceptable (AES-GCM first), any
/// non-empty chain is accepted, and clients are not asked for certificates.
#[derive(Clone)]
pub struct DefaultPolicy {
    cipher_suites: Vec<CipherSuite>,
    require_client_auth: bool,
    certificate_check: Option<ChainCheck>,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultPolicy {
    pub fn new() -> Self {
        Self { cipher_suites: CipherSuite::ALL.to_vec(), require_client_auth: false, certificate_check: None }
    }

    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    pub fn with_client_auth(mut self, required: bool) -> Self {
        self.require_client_auth = required;
        self
    }

    /// Replace the chain predicate.
    pub fn with_certificate_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&[Certificate]) -> bool + Send + Sync + 'static,
    {
        self.certificate_check = Some(Arc::new(check));
        self
    }

    /// Accept only chains whose end-entity certificate is one of `pins`.
    pub fn pinned(self, pins: Vec<Certificate>) -> Self {
        self.with_certificate_check(move |chain| chain.first().is_some_and(|leaf| pins.contains(leaf)))
    }
}

impl Policy for DefaultPolicy {
    fn acceptable_cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    fn accept_certificate_chain(&self, chain: &[Certificate]) -> bool {
        match &self.certificate_check {
            Some(check) => check(chain),
            None => !chain.is_empty(),
        }
    }

    fn require_client_auth(&self) -> bool {
        self.require_client_auth
    }
}

impl core::fmt::Debug for DefaultPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DefaultPolicy")
            .field("cipher_suites", &self.cipher_suites)
            .field("require_client_auth", &self.require_client_auth)
            .field("certificate_check", &self.certificate_check.is_some())
            .finish()
    }
}
