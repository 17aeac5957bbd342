//! Client side of the handshake.

use std::sync::Arc;

use super::{HandshakeEngine, Role, State};
use crate::config::ChannelConfig;
use crate::credentials::{Certificate, PrivateKey, Usage};
use crate::error::{Error, HandshakeFailureReason};
use crate::tls::cipher_suite::{CipherSuite, ProtocolVersion, SignatureScheme, NAMED_GROUP_X25519};
use crate::tls::extensions::ClientExtensions;
use crate::tls::key_schedule::derive_master_secret;
use crate::tls::messages::{
    CertificatePayload, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, HandshakeMessage,
    ServerHello, ServerKeyExchange, COMPRESSION_NULL,
};
use crate::transport::Rng;

impl HandshakeEngine {
    /// A client engine. Offers the most recent cached session for the
    /// configured server name, if its suite is still acceptable.
    pub fn new_client<R: Rng + ?Sized>(config: ChannelConfig, rng: &mut R) -> Self {
        let mut engine = Self::new(Role::Client, config, rng);
        engine.server_name = engine.config.server_name.clone();
        if let Some(name) = engine.server_name.as_deref() {
            engine.resumable = engine
                .config
                .session_cache
                .lookup_by_server(name, engine.config.clock.now())
                .filter(|s| s.is_resumable() && engine.config.policy.acceptable_cipher_suite(s.cipher_suite()));
        }
        engine
    }

    /// Queue the ClientHello.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.role != Role::Client || self.state != State::Start {
            return Err(Error::InvalidState);
        }
        let cipher_suites: Vec<u16> = self.config.offered_cipher_suites().iter().map(|s| s.to_u16()).collect();
        if cipher_suites.is_empty() {
            return Err(HandshakeFailureReason::NoCommonCipherSuite.into());
        }
        let session_id = self.resumable.as_ref().map(|s| s.id().clone()).unwrap_or_default();
        if !session_id.is_empty() {
            log::debug!("client: offering session {:?}", session_id);
        }

        let hello = ClientHello {
            version: ProtocolVersion::TLS12,
            random: self.client_random,
            session_id,
            cipher_suites,
            compression_methods: vec![COMPRESSION_NULL],
            extensions: ClientExtensions::offer(
                self.server_name.as_deref(),
                SignatureScheme::ALL.iter().map(|s| s.to_u16()).collect(),
            ),
        };
        self.send(HandshakeMessage::ClientHello(hello));
        self.state = State::WaitServerHello;
        Ok(())
    }

    pub(super) fn on_server_hello(&mut self, raw: &[u8], hello: ServerHello) -> Result<(), Error> {
        let version_ok = hello.version == ProtocolVersion::TLS12
            && self.config.policy.acceptable_protocol_version(hello.version);
        if !version_ok {
            return Err(HandshakeFailureReason::UnsupportedVersion.into());
        }
        let suite = CipherSuite::from_u16(hello.cipher_suite)
            .filter(|s| self.config.policy.acceptable_cipher_suite(*s))
            .ok_or(HandshakeFailureReason::NoCommonCipherSuite)?;
        if hello.compression_method != COMPRESSION_NULL {
            return Err(HandshakeFailureReason::Malformed.into());
        }
        if !hello.extensions.extended_master_secret {
            return Err(HandshakeFailureReason::MissingExtension.into());
        }

        self.transcript.update(raw);
        self.server_random = hello.random;
        self.cipher_suite = Some(suite);

        match self.resumable.clone() {
            Some(session) if !hello.session_id.is_empty() && &hello.session_id == session.id() => {
                if session.cipher_suite() != suite {
                    return Err(HandshakeFailureReason::ResumptionMismatch.into());
                }
                log::debug!("client: server resumed {:?} with {}", session.id(), suite);
                self.resumed = true;
                self.session_id = hello.session_id;
                self.master_secret = Some(session.master_secret().clone());
                self.derive_keys()?;
                self.state = State::WaitChangeCipherSpec;
            }
            _ => {
                log::debug!("client: full handshake with {}", suite);
                self.resumable = None;
                self.session_id = hello.session_id;
                self.state = State::WaitCertificate;
            }
        }
        Ok(())
    }

    pub(super) fn on_server_certificate(&mut self, raw: &[u8], payload: CertificatePayload) -> Result<(), Error> {
        let leaf = payload.chain.first().ok_or(HandshakeFailureReason::NoCertificate)?;
        let key = leaf.public_key()?;
        if !self.config.policy.accept_certificate_chain(&payload.chain) {
            log::debug!("client: policy rejected server chain {:?}", leaf);
            return Err(HandshakeFailureReason::CertificateRejected.into());
        }
        self.transcript.update(raw);
        self.peer_key = Some(key);
        self.peer_chain = payload.chain;
        self.state = State::WaitServerKeyExchange;
        Ok(())
    }

    pub(super) fn on_server_key_exchange(&mut self, raw: &[u8], ske: ServerKeyExchange) -> Result<(), Error> {
        if ske.named_group != NAMED_GROUP_X25519 {
            return Err(HandshakeFailureReason::BadKeyShare.into());
        }
        let public: [u8; 32] =
            ske.public.as_slice().try_into().map_err(|_| HandshakeFailureReason::BadKeyShare)?;
        let scheme = SignatureScheme::from_u16(ske.scheme).ok_or(HandshakeFailureReason::BadSignature)?;
        let key = self.peer_key.as_ref().ok_or(HandshakeFailureReason::UnexpectedMessage)?;

        let signed = ServerKeyExchange::signed_content(&self.client_random, &self.server_random, &ske.params());
        key.verify(scheme, &signed, &ske.signature)
            .map_err(|_| HandshakeFailureReason::BadSignature)?;

        self.transcript.update(raw);
        self.peer_ecdhe_public = Some(public);
        self.state = State::WaitServerHelloDone;
        Ok(())
    }

    pub(super) fn on_certificate_request(&mut self, raw: &[u8], req: CertificateRequest) -> Result<(), Error> {
        self.transcript.update(raw);
        self.requested_client_schemes = Some(req.signature_algorithms);
        Ok(())
    }

    /// Server flight done: send our flight, CCS and Finished.
    pub(super) fn on_server_hello_done(&mut self, raw: &[u8]) -> Result<(), Error> {
        self.transcript.update(raw);

        let identity = match self.requested_client_schemes.take() {
            Some(schemes) => {
                let identity = self.client_identity(&schemes);
                let chain = identity.as_ref().map(|(chain, _)| chain.clone()).unwrap_or_default();
                if chain.is_empty() {
                    log::debug!("client: certificate requested but none available");
                }
                self.send(HandshakeMessage::Certificate(CertificatePayload { chain }));
                identity
            }
            None => None,
        };

        let server_public = self.peer_ecdhe_public.take().ok_or(HandshakeFailureReason::UnexpectedMessage)?;
        let shared = self.agree(server_public)?;
        self.send(HandshakeMessage::ClientKeyExchange(ClientKeyExchange { public: self.ecdhe_public.to_vec() }));
        self.master_secret = Some(derive_master_secret(shared.as_bytes(), &self.transcript.current_hash())?);

        if let Some((_, key)) = identity {
            let signature = key.sign(self.transcript.messages())?;
            self.send(HandshakeMessage::CertificateVerify(CertificateVerify {
                scheme: key.key_type().signature_scheme().to_u16(),
                signature,
            }));
        }

        self.derive_keys()?;
        self.send_change_cipher_spec();
        self.send_finished()?;
        self.state = State::WaitChangeCipherSpec;
        Ok(())
    }

    /// First client credential matching a scheme the server asked for.
    fn client_identity(&self, schemes: &[u16]) -> Option<(Vec<Certificate>, Arc<PrivateKey>)> {
        let creds = &self.config.credentials;
        let context = self.server_name.as_deref();
        SignatureScheme::ALL
            .iter()
            .filter(|scheme| schemes.contains(&scheme.to_u16()))
            .find_map(|scheme| {
                let key_type = scheme.key_type();
                let chain = creds.cert_chain(key_type, Usage::TlsClient, context).ok()?;
                let key = creds.private_key_for(chain.first()?, key_type, context).ok()?;
                Some((chain, key))
            })
    }
}
