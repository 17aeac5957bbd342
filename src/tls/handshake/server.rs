//! Server side of the handshake.

use std::sync::Arc;

use super::{HandshakeEngine, Role, State};
use crate::config::ChannelConfig;
use crate::credentials::{Certificate, PrivateKey, Usage};
use crate::error::{Error, HandshakeFailureReason};
use crate::session::{Session, SessionId};
use crate::tls::cipher_suite::{
    ProtocolVersion, SignatureScheme, CLIENT_CERT_TYPE_ECDSA_SIGN, NAMED_GROUP_X25519,
};
use crate::tls::extensions::ServerExtensions;
use crate::tls::key_schedule::derive_master_secret;
use crate::tls::messages::{
    CertificatePayload, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, HandshakeMessage,
    ServerHello, ServerKeyExchange, COMPRESSION_NULL,
};
use crate::transport::Rng;

impl HandshakeEngine {
    /// A server engine. Draws the identifier a new session will carry.
    pub fn new_server<R: Rng + ?Sized>(config: ChannelConfig, rng: &mut R) -> Self {
        let mut engine = Self::new(Role::Server, config, rng);
        let mut id = [0u8; 32];
        rng.fill(&mut id);
        engine.session_id = SessionId::from_slice(&id).unwrap_or_default();
        engine
    }

    pub(super) fn on_client_hello(&mut self, raw: &[u8], hello: ClientHello) -> Result<(), Error> {
        if hello.version < ProtocolVersion::TLS12
            || !self.config.policy.acceptable_protocol_version(ProtocolVersion::TLS12)
        {
            return Err(HandshakeFailureReason::UnsupportedVersion.into());
        }
        if !hello.compression_methods.contains(&COMPRESSION_NULL) {
            return Err(HandshakeFailureReason::Malformed.into());
        }
        if !hello.extensions.extended_master_secret {
            return Err(HandshakeFailureReason::MissingExtension.into());
        }
        if !hello.extensions.supports_x25519() {
            return Err(HandshakeFailureReason::NoCommonCipherSuite.into());
        }

        self.transcript.update(raw);
        self.client_random = hello.random;
        self.server_name = hello.extensions.server_name.clone();
        let answer = ServerExtensions::answer(&hello.extensions);

        if let Some(session) = self.find_resumable(&hello) {
            return self.resume(session, answer);
        }

        // Our preference order wins.
        let suite = self
            .config
            .policy
            .acceptable_cipher_suites()
            .iter()
            .copied()
            .find(|s| hello.cipher_suites.contains(&s.to_u16()))
            .ok_or(HandshakeFailureReason::NoCommonCipherSuite)?;
        let (chain, key) = self.server_identity(&hello)?;
        log::debug!("server: full handshake with {} for {:?}", suite, self.server_name);
        self.cipher_suite = Some(suite);

        self.send(HandshakeMessage::ServerHello(ServerHello {
            version: ProtocolVersion::TLS12,
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: suite.to_u16(),
            compression_method: COMPRESSION_NULL,
            extensions: answer,
        }));
        self.send(HandshakeMessage::Certificate(CertificatePayload { chain }));

        let mut ske = ServerKeyExchange {
            named_group: NAMED_GROUP_X25519,
            public: self.ecdhe_public.to_vec(),
            scheme: key.key_type().signature_scheme().to_u16(),
            signature: Vec::new(),
        };
        ske.signature = key.sign(&ServerKeyExchange::signed_content(
            &self.client_random,
            &self.server_random,
            &ske.params(),
        ))?;
        self.send(HandshakeMessage::ServerKeyExchange(ske));

        self.state = if self.config.policy.require_client_auth() {
            self.send(HandshakeMessage::CertificateRequest(CertificateRequest {
                certificate_types: vec![CLIENT_CERT_TYPE_ECDSA_SIGN],
                signature_algorithms: SignatureScheme::ALL.iter().map(|s| s.to_u16()).collect(),
                authorities: Vec::new(),
            }));
            State::WaitClientCertificate
        } else {
            State::WaitClientKeyExchange
        };
        self.send(HandshakeMessage::ServerHelloDone);
        Ok(())
    }

    /// A cached session the client offered that the current policy would
    /// still accept, for the same server name.
    fn find_resumable(&self, hello: &ClientHello) -> Option<Arc<Session>> {
        if hello.session_id.is_empty() {
            return None;
        }
        let session = self.config.session_cache.lookup(&hello.session_id, self.config.clock.now())?;
        let policy = &self.config.policy;
        let suite = session.cipher_suite();
        let chain = session.peer_certificate_chain();

        let refusal = if !policy.acceptable_cipher_suite(suite) || !hello.cipher_suites.contains(&suite.to_u16()) {
            Some("suite")
        } else if session.server_name() != self.server_name.as_deref() {
            Some("server name")
        } else if chain.is_empty() && policy.require_client_auth() {
            Some("missing client certificate")
        } else if !chain.is_empty() && !policy.accept_certificate_chain(chain) {
            Some("client certificate")
        } else {
            None
        };
        match refusal {
            Some(what) => {
                log::debug!("server: cached {:?} not resumable: {}", session.id(), what);
                None
            }
            None => Some(session),
        }
    }

    fn resume(&mut self, session: Arc<Session>, extensions: ServerExtensions) -> Result<(), Error> {
        log::debug!("server: resuming {:?}", session.id());
        self.resumed = true;
        self.cipher_suite = Some(session.cipher_suite());
        self.session_id = session.id().clone();
        self.master_secret = Some(session.master_secret().clone());

        self.send(HandshakeMessage::ServerHello(ServerHello {
            version: ProtocolVersion::TLS12,
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: session.cipher_suite().to_u16(),
            compression_method: COMPRESSION_NULL,
            extensions,
        }));
        self.resumable = Some(session);

        self.derive_keys()?;
        self.send_change_cipher_spec();
        self.send_finished()?;
        self.state = State::WaitChangeCipherSpec;
        Ok(())
    }

    /// Walk the client's signature schemes; first key type we hold wins.
    fn server_identity(&self, hello: &ClientHello) -> Result<(Vec<Certificate>, Arc<PrivateKey>), Error> {
        let offered: Vec<u16> = match &hello.extensions.signature_algorithms {
            Some(list) => list.clone(),
            None => SignatureScheme::ALL.iter().map(|s| s.to_u16()).collect(),
        };
        let creds = &self.config.credentials;
        let context = self.server_name.as_deref();

        offered
            .iter()
            .filter_map(|code| SignatureScheme::from_u16(*code))
            .find_map(|scheme| {
                let key_type = scheme.key_type();
                let chain = creds.cert_chain(key_type, Usage::TlsServer, context).ok()?;
                let key = creds.private_key_for(chain.first()?, key_type, context).ok()?;
                Some((chain, key))
            })
            .ok_or(HandshakeFailureReason::CredentialsNotFound.into())
    }

    pub(super) fn on_client_certificate(&mut self, raw: &[u8], payload: CertificatePayload) -> Result<(), Error> {
        let leaf = payload.chain.first().ok_or(HandshakeFailureReason::NoCertificate)?;
        let key = leaf.public_key()?;
        if !self.config.policy.accept_certificate_chain(&payload.chain) {
            log::debug!("server: policy rejected client chain {:?}", leaf);
            return Err(HandshakeFailureReason::CertificateRejected.into());
        }
        self.transcript.update(raw);
        self.peer_key = Some(key);
        self.peer_chain = payload.chain;
        self.state = State::WaitClientKeyExchange;
        Ok(())
    }

    pub(super) fn on_client_key_exchange(&mut self, raw: &[u8], cke: ClientKeyExchange) -> Result<(), Error> {
        let public: [u8; 32] =
            cke.public.as_slice().try_into().map_err(|_| HandshakeFailureReason::BadKeyShare)?;
        let shared = self.agree(public)?;
        self.transcript.update(raw);
        self.master_secret = Some(derive_master_secret(shared.as_bytes(), &self.transcript.current_hash())?);
        self.derive_keys()?;

        self.state = if self.peer_key.is_some() {
            State::WaitCertificateVerify
        } else {
            State::WaitChangeCipherSpec
        };
        Ok(())
    }

    pub(super) fn on_certificate_verify(&mut self, raw: &[u8], cv: CertificateVerify) -> Result<(), Error> {
        let scheme = SignatureScheme::from_u16(cv.scheme).ok_or(HandshakeFailureReason::BadSignature)?;
        let key = self.peer_key.as_ref().ok_or(HandshakeFailureReason::UnexpectedMessage)?;
        key.verify(scheme, self.transcript.messages(), &cv.signature)
            .map_err(|_| HandshakeFailureReason::BadSignature)?;
        self.transcript.update(raw);
        self.state = State::WaitChangeCipherSpec;
        Ok(())
    }
}
