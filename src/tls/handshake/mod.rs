//! TLS 1.2 handshake state machine.
//!
//! Client states:
//! ```text
//! Start -> WaitServerHello -> WaitCertificate -> WaitServerKeyExchange ->
//! WaitServerHelloDone -> WaitChangeCipherSpec -> WaitFinished -> Complete
//!
//! resumed: Start -> WaitServerHello -> WaitChangeCipherSpec -> WaitFinished -> Complete
//! ```
//!
//! Server states:
//! ```text
//! WaitClientHello -> [WaitClientCertificate] -> WaitClientKeyExchange ->
//! [WaitCertificateVerify] -> WaitChangeCipherSpec -> WaitFinished -> Complete
//!
//! resumed: WaitClientHello -> WaitChangeCipherSpec -> WaitFinished -> Complete
//! ```
//!
//! The engine does no I/O and knows nothing about records. It consumes
//! handshake record payloads and ChangeCipherSpec notifications, and
//! produces [`HandshakeOutput`] items plus traffic keys for the record
//! layer to install.

mod client;
mod server;

use std::collections::VecDeque;
use std::sync::Arc;

use subtle::ConstantTimeEq;
use x25519_dalek::{SharedSecret, StaticSecret};
use zeroize::Zeroize;

use crate::config::ChannelConfig;
use crate::credentials::{Certificate, PublicKey};
use crate::error::{Error, HandshakeFailureReason, ProtocolViolation};
use crate::session::{Session, SessionId};
use crate::tls::cipher_suite::CipherSuite;
use crate::tls::key_schedule::{self, derive_traffic_keys, finished_verify_data, MasterSecret, TrafficKeys};
use crate::tls::messages::{
    read_handshake_header, Finished, HandshakeMessage, HANDSHAKE_HEADER_LEN, MAX_HANDSHAKE_MESSAGE_LEN,
};
use crate::tls::transcript::Transcript;
use crate::transport::Rng;

/// Client or server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Client: ClientHello not yet written.
    Start,
    WaitServerHello,
    WaitCertificate,
    WaitServerKeyExchange,
    /// Also accepts one CertificateRequest.
    WaitServerHelloDone,
    WaitClientHello,
    WaitClientCertificate,
    WaitClientKeyExchange,
    WaitCertificateVerify,
    WaitChangeCipherSpec,
    WaitFinished,
    Complete,
}

/// Something the record layer must send, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutput {
    /// One encoded handshake message, header included.
    Message(Vec<u8>),
    /// A ChangeCipherSpec record; switch the write side to the new keys after it.
    ChangeCipherSpec,
}

/// TLS 1.2 handshake engine for one connection.
pub struct HandshakeEngine {
    role: Role,
    state: State,
    config: ChannelConfig,

    transcript: Transcript,
    client_random: [u8; 32],
    server_random: [u8; 32],

    ecdhe_secret: Option<StaticSecret>,
    ecdhe_public: [u8; 32],
    /// Client: the server's share from ServerKeyExchange.
    peer_ecdhe_public: Option<[u8; 32]>,

    session_id: SessionId,
    cipher_suite: Option<CipherSuite>,
    master_secret: Option<MasterSecret>,
    server_name: Option<String>,

    peer_chain: Vec<Certificate>,
    peer_key: Option<PublicKey>,
    /// Client: schemes from a CertificateRequest.
    requested_client_schemes: Option<Vec<u16>>,

    /// Client: the session offered for resumption. Server: the session resumed.
    resumable: Option<Arc<Session>>,
    resumed: bool,

    pending_keys: Option<TrafficKeys>,
    output: VecDeque<HandshakeOutput>,
    reassembly: Vec<u8>,
    session: Option<Arc<Session>>,
}

impl HandshakeEngine {
    fn new<R: Rng + ?Sized>(role: Role, config: ChannelConfig, rng: &mut R) -> Self {
        let mut random = [0u8; 32];
        rng.fill(&mut random);

        let mut secret_bytes = [0u8; 32];
        rng.fill(&mut secret_bytes);
        let secret = StaticSecret::from(secret_bytes);
        secret_bytes.zeroize();
        let ecdhe_public = x25519_dalek::PublicKey::from(&secret).to_bytes();

        let (client_random, server_random, state) = match role {
            Role::Client => (random, [0u8; 32], State::Start),
            Role::Server => ([0u8; 32], random, State::WaitClientHello),
        };

        Self {
            role,
            state,
            config,
            transcript: Transcript::new(),
            client_random,
            server_random,
            ecdhe_secret: Some(secret),
            ecdhe_public,
            peer_ecdhe_public: None,
            session_id: SessionId::empty(),
            cipher_suite: None,
            master_secret: None,
            server_name: None,
            peer_chain: Vec::new(),
            peer_key: None,
            requested_client_schemes: None,
            resumable: None,
            resumed: false,
            pending_keys: None,
            output: VecDeque::new(),
            reassembly: Vec::new(),
            session: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// Whether the handshake resumed a cached session.
    pub fn was_resumed(&self) -> bool {
        self.resumed
    }

    /// The negotiated session, once complete.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    /// Handshake messages sent and received so far.
    pub fn message_count(&self) -> usize {
        self.transcript.message_count()
    }

    /// Whether part of a handshake message is buffered.
    pub fn has_partial_message(&self) -> bool {
        !self.reassembly.is_empty()
    }

    /// Next item to send, if any.
    pub fn poll_output(&mut self) -> Option<HandshakeOutput> {
        self.output.pop_front()
    }

    /// Traffic keys derived since the last call.
    pub fn take_traffic_keys(&mut self) -> Option<TrafficKeys> {
        self.pending_keys.take()
    }

    /// Feed the payload of one handshake record.
    ///
    /// Messages may span records and a record may hold several messages.
    pub fn read_handshake(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if fragment.is_empty() {
            return Err(ProtocolViolation::DecodeError.into());
        }
        self.reassembly.extend_from_slice(fragment);

        while let Some((msg_type, len)) = read_handshake_header(&self.reassembly) {
            if len > MAX_HANDSHAKE_MESSAGE_LEN {
                return Err(HandshakeFailureReason::MessageTooLarge.into());
            }
            let total = HANDSHAKE_HEADER_LEN + len;
            if self.reassembly.len() < total {
                break;
            }
            let raw: Vec<u8> = self.reassembly.drain(..total).collect();
            let msg = HandshakeMessage::parse(msg_type, &raw[HANDSHAKE_HEADER_LEN..])?;
            log::trace!("{:?}: received {:?} ({} bytes)", self.role, msg.handshake_type(), raw.len());
            self.handle(&raw, msg)?;
        }
        Ok(())
    }

    /// The peer sent ChangeCipherSpec.
    ///
    /// Valid only once keys exist and with no handshake message half-read.
    pub fn read_change_cipher_spec(&mut self) -> Result<(), Error> {
        if self.state != State::WaitChangeCipherSpec || self.has_partial_message() {
            log::debug!("{:?}: ChangeCipherSpec in state {:?}", self.role, self.state);
            return Err(ProtocolViolation::UnexpectedMessage.into());
        }
        self.state = State::WaitFinished;
        Ok(())
    }

    /// RFC 5705 exporter over the completed handshake.
    pub fn export_keying_material(&self, label: &[u8], context: Option<&[u8]>, out: &mut [u8]) -> Result<(), Error> {
        if !self.is_complete() {
            return Err(Error::InvalidState);
        }
        key_schedule::export_keying_material(
            self.master()?,
            label,
            &self.client_random,
            &self.server_random,
            context,
            out,
        )
    }

    fn handle(&mut self, raw: &[u8], msg: HandshakeMessage) -> Result<(), Error> {
        use HandshakeMessage as M;

        match (self.state, msg) {
            // Clients ignore HelloRequest; renegotiation is never started.
            (_, M::HelloRequest) if self.role == Role::Client => Ok(()),
            (State::WaitServerHello, M::ServerHello(hello)) => self.on_server_hello(raw, hello),
            (State::WaitCertificate, M::Certificate(cert)) => self.on_server_certificate(raw, cert),
            (State::WaitServerKeyExchange, M::ServerKeyExchange(ske)) => self.on_server_key_exchange(raw, ske),
            (State::WaitServerHelloDone, M::CertificateRequest(req)) if self.requested_client_schemes.is_none() => {
                self.on_certificate_request(raw, req)
            }
            (State::WaitServerHelloDone, M::ServerHelloDone) => self.on_server_hello_done(raw),
            (State::WaitClientHello, M::ClientHello(hello)) => self.on_client_hello(raw, hello),
            (State::WaitClientCertificate, M::Certificate(cert)) => self.on_client_certificate(raw, cert),
            (State::WaitClientKeyExchange, M::ClientKeyExchange(cke)) => self.on_client_key_exchange(raw, cke),
            (State::WaitCertificateVerify, M::CertificateVerify(cv)) => self.on_certificate_verify(raw, cv),
            (State::WaitFinished, M::Finished(fin)) => self.on_finished(raw, fin),
            (state, msg) => {
                log::debug!("{:?}: unexpected {:?} in state {:?}", self.role, msg.handshake_type(), state);
                Err(HandshakeFailureReason::UnexpectedMessage.into())
            }
        }
    }

    fn on_finished(&mut self, raw: &[u8], fin: Finished) -> Result<(), Error> {
        let expected = finished_verify_data(self.master()?, self.role.peer(), &self.transcript.current_hash())?;
        if !bool::from(expected.ct_eq(&fin.verify_data)) {
            return Err(HandshakeFailureReason::BadFinished.into());
        }
        self.transcript.update(raw);

        // Whoever received Finished first answers with its own flight.
        let answer = match self.role {
            Role::Client => self.resumed,
            Role::Server => !self.resumed,
        };
        if answer {
            self.send_change_cipher_spec();
            self.send_finished()?;
        }
        self.complete()
    }

    fn complete(&mut self) -> Result<(), Error> {
        let session = match (&self.resumable, self.resumed) {
            (Some(session), true) => Arc::clone(session),
            _ => {
                let master = self.master()?.clone();
                let suite = self.suite()?;
                Arc::new(Session::new(
                    self.session_id.clone(),
                    master,
                    suite,
                    core::mem::take(&mut self.peer_chain),
                    self.server_name.clone(),
                    self.config.clock.now(),
                    self.config.session_lifetime,
                ))
            }
        };
        log::debug!(
            "{:?}: handshake complete, {} session {:?}",
            self.role,
            if self.resumed { "resumed" } else { "new" },
            session.id()
        );
        self.session = Some(session);
        self.ecdhe_secret = None;
        self.state = State::Complete;
        Ok(())
    }

    fn send(&mut self, msg: HandshakeMessage) {
        let encoded = msg.encode();
        log::trace!("{:?}: sending {:?} ({} bytes)", self.role, msg.handshake_type(), encoded.len());
        self.transcript.update(&encoded);
        self.output.push_back(HandshakeOutput::Message(encoded));
    }

    fn send_change_cipher_spec(&mut self) {
        self.output.push_back(HandshakeOutput::ChangeCipherSpec);
    }

    fn send_finished(&mut self) -> Result<(), Error> {
        let verify_data = finished_verify_data(self.master()?, self.role, &self.transcript.current_hash())?;
        self.send(HandshakeMessage::Finished(Finished { verify_data }));
        Ok(())
    }

    fn derive_keys(&mut self) -> Result<(), Error> {
        let keys = derive_traffic_keys(self.master()?, self.suite()?, &self.client_random, &self.server_random)?;
        self.pending_keys = Some(keys);
        Ok(())
    }

    /// X25519 with our ephemeral secret; consumes it.
    fn agree(&mut self, peer_public: [u8; 32]) -> Result<SharedSecret, Error> {
        let secret = self.ecdhe_secret.take().ok_or(HandshakeFailureReason::UnexpectedMessage)?;
        let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer_public));
        if !shared.was_contributory() {
            return Err(HandshakeFailureReason::BadKeyShare.into());
        }
        Ok(shared)
    }

    fn master(&self) -> Result<&MasterSecret, Error> {
        self.master_secret.as_ref().ok_or(HandshakeFailureReason::UnexpectedMessage.into())
    }

    fn suite(&self) -> Result<CipherSuite, Error> {
        self.cipher_suite.ok_or(HandshakeFailureReason::UnexpectedMessage.into())
    }
}

impl core::fmt::Debug for HandshakeEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeEngine")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("cipher_suite", &self.cipher_suite)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}
