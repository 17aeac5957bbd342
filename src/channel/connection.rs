//! Channel state machine and record dispatch.

use core::ops::ControlFlow;
use std::sync::Arc;

use super::handler::ChannelHandler;
use super::outbox::Outbox;
use super::record::{
    decode_record_header, encode_plaintext_record, ConnectionState, ContentType, MAX_PLAINTEXT_LEN,
    RECORD_HEADER_LEN,
};
use crate::config::ChannelConfig;
use crate::error::{Error, HandshakeFailureReason, ProtocolViolation};
use crate::session::Session;
use crate::tls::alert::{Alert, AlertDescription};
use crate::tls::cipher_suite::CipherSuite;
use crate::tls::handshake::{HandshakeEngine, HandshakeOutput, Role};
use crate::transport::Rng;

/// Body of a ChangeCipherSpec record.
const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

/// Channel lifecycle.
///
/// ```text
/// Initial -> Handshaking -> Established -> Closing -> Closed
/// ```
/// Any fatal error goes straight to `Closed`. Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initial,
    Handshaking,
    Established,
    /// close_notify queued; waiting for the outbox to drain.
    Closing,
    Closed,
}

/// A TLS 1.2 connection driven entirely by its caller.
///
/// The channel never touches a socket. Feed it transport bytes with
/// [`received`](Self::received), write what
/// [`ChannelHandler::on_output_ready`] hands out, and report each finished
/// write with [`write_complete`](Self::write_complete).
pub struct Channel<H: ChannelHandler> {
    role: Role,
    state: ChannelState,
    config: ChannelConfig,
    handler: H,
    engine: HandshakeEngine,

    read: Option<ConnectionState>,
    write: Option<ConnectionState>,
    pending_read: Option<ConnectionState>,
    pending_write: Option<ConnectionState>,

    recv_buf: Vec<u8>,
    outbox: Outbox,
    session: Option<Arc<Session>>,
}

impl<H: ChannelHandler> Channel<H> {
    /// A client channel. Call [`start`](Self::start) to send the ClientHello.
    pub fn client<R: Rng + ?Sized>(config: ChannelConfig, handler: H, rng: &mut R) -> Result<Self, Error> {
        crate::init()?;
        let engine = HandshakeEngine::new_client(config.clone(), rng);
        Ok(Self::new(Role::Client, config, handler, engine))
    }

    /// A server channel. It starts handshaking on the first bytes received.
    pub fn server<R: Rng + ?Sized>(config: ChannelConfig, handler: H, rng: &mut R) -> Result<Self, Error> {
        crate::init()?;
        let engine = HandshakeEngine::new_server(config.clone(), rng);
        Ok(Self::new(Role::Server, config, handler, engine))
    }

    fn new(role: Role, config: ChannelConfig, handler: H, engine: HandshakeEngine) -> Self {
        Self {
            role,
            state: ChannelState::Initial,
            config,
            handler,
            engine,
            read: None,
            write: None,
            pending_read: None,
            pending_write: None,
            recv_buf: Vec::new(),
            outbox: Outbox::new(),
            session: None,
        }
    }

    /// Begin the handshake. Client only, once.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.role != Role::Client || self.state != ChannelState::Initial {
            return Err(Error::InvalidState);
        }
        self.state = ChannelState::Handshaking;
        let result = self.engine.start().and_then(|()| self.after_handshake_progress());
        self.finish(result)
    }

    /// Feed bytes from the transport. Partial records are buffered.
    ///
    /// Bytes arriving once the channel is closing or closed are dropped.
    pub fn received(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self.state {
            ChannelState::Closing | ChannelState::Closed => return Ok(()),
            ChannelState::Initial if self.role == Role::Client => return Err(Error::InvalidState),
            _ => {}
        }
        if bytes.is_empty() {
            return Ok(());
        }
        if self.state == ChannelState::Initial {
            self.state = ChannelState::Handshaking;
        }
        self.recv_buf.extend_from_slice(bytes);
        let result = self.process_records();
        self.finish(result)
    }

    /// Encrypt and queue application data.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != ChannelState::Established {
            return Err(Error::InvalidState);
        }
        if data.is_empty() {
            return Ok(());
        }
        let result = self.write_record(ContentType::ApplicationData, data);
        self.finish(result)
    }

    /// Send close_notify and close once it is written. Idempotent.
    pub fn close(&mut self) -> Result<(), Error> {
        match self.state {
            ChannelState::Closing | ChannelState::Closed => return Ok(()),
            ChannelState::Initial => {
                self.state = ChannelState::Closed;
                return Ok(());
            }
            ChannelState::Handshaking | ChannelState::Established => {}
        }
        let result = self.begin_close();
        self.finish(result)
    }

    /// The last batch from `on_output_ready` is fully written.
    pub fn write_complete(&mut self) {
        if !self.outbox.write_complete() {
            log::warn!("{:?}: write_complete with no write in flight", self.role);
        }
        self.flush();
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_established(&self) -> bool {
        self.state == ChannelState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    /// The session, once the handshake completed.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        self.engine.cipher_suite()
    }

    /// Whether the handshake resumed a cached session.
    pub fn was_resumed(&self) -> bool {
        self.engine.was_resumed()
    }

    /// Handshake messages exchanged on this channel.
    pub fn handshake_message_count(&self) -> usize {
        self.engine.message_count()
    }

    /// `(read, write)` sequence numbers of the installed record states.
    pub fn sequence_numbers(&self) -> Option<(u64, u64)> {
        match (&self.read, &self.write) {
            (Some(read), Some(write)) => Some((read.sequence_number(), write.sequence_number())),
            _ => None,
        }
    }

    /// Keying material bound to this connection (RFC 5705).
    pub fn export_keying_material(&self, label: &[u8], context: Option<&[u8]>, out: &mut [u8]) -> Result<(), Error> {
        match self.state {
            ChannelState::Established => self.engine.export_keying_material(label, context, out),
            ChannelState::Closing | ChannelState::Closed => Err(Error::Closed),
            _ => Err(Error::InvalidState),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    fn process_records(&mut self) -> Result<(), Error> {
        while matches!(self.state, ChannelState::Handshaking | ChannelState::Established) {
            let Some(header) = decode_record_header(&self.recv_buf)? else {
                return Ok(());
            };
            let total = RECORD_HEADER_LEN + header.length as usize;
            if self.recv_buf.len() < total {
                return Ok(());
            }
            let fragment: Vec<u8> = self.recv_buf.drain(..total).skip(RECORD_HEADER_LEN).collect();

            let payload = match self.read.as_mut() {
                Some(read) => read.open(&header, &fragment)?,
                None if fragment.len() > MAX_PLAINTEXT_LEN => {
                    return Err(ProtocolViolation::RecordOverflow { length: fragment.len() }.into());
                }
                None => fragment,
            };
            self.dispatch(header.content_type, &payload)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), Error> {
        match content_type {
            ContentType::Handshake if self.state == ChannelState::Established => {
                log::debug!("{:?}: refusing renegotiation", self.role);
                self.write_alert(Alert::warning(AlertDescription::NoRenegotiation))
            }
            ContentType::Handshake => {
                self.engine.read_handshake(payload)?;
                self.after_handshake_progress()
            }
            ContentType::ChangeCipherSpec => {
                if payload != CHANGE_CIPHER_SPEC {
                    return Err(ProtocolViolation::DecodeError.into());
                }
                if self.state != ChannelState::Handshaking {
                    return Err(ProtocolViolation::UnexpectedMessage.into());
                }
                self.engine.read_change_cipher_spec()?;
                let read = self.pending_read.take().ok_or(ProtocolViolation::UnexpectedMessage)?;
                self.read = Some(read);
                Ok(())
            }
            ContentType::Alert => self.on_alert(payload),
            ContentType::ApplicationData => {
                if self.state != ChannelState::Established {
                    return Err(ProtocolViolation::UnexpectedMessage.into());
                }
                if payload.is_empty() {
                    return Ok(());
                }
                if let ControlFlow::Break(()) = self.handler.on_data_received(payload) {
                    log::debug!("{:?}: handler asked to close", self.role);
                    self.begin_close()?;
                }
                Ok(())
            }
        }
    }

    fn on_alert(&mut self, payload: &[u8]) -> Result<(), Error> {
        let alert = Alert::parse(payload)?;
        self.handler.on_alert(alert);

        if alert.description == AlertDescription::CloseNotify {
            log::debug!("{:?}: peer sent close_notify", self.role);
            return self.begin_close();
        }
        if alert.is_fatal() {
            log::debug!("{:?}: peer sent fatal alert {:?}", self.role, alert.description);
            return Err(Error::PeerAlert(alert.description));
        }
        log::debug!("{:?}: ignoring warning alert {:?}", self.role, alert.description);
        Ok(())
    }

    /// Collect keys and output from the engine; report completion.
    fn after_handshake_progress(&mut self) -> Result<(), Error> {
        if let Some(keys) = self.engine.take_traffic_keys() {
            let (write, read) = keys.for_role(self.role);
            self.pending_write = Some(ConnectionState::new(keys.suite, write)?);
            self.pending_read = Some(ConnectionState::new(keys.suite, read)?);
        }

        while let Some(output) = self.engine.poll_output() {
            match output {
                HandshakeOutput::Message(msg) => self.write_record(ContentType::Handshake, &msg)?,
                HandshakeOutput::ChangeCipherSpec => {
                    self.write_record(ContentType::ChangeCipherSpec, &CHANGE_CIPHER_SPEC)?;
                    let write = self.pending_write.take().ok_or(HandshakeFailureReason::UnexpectedMessage)?;
                    self.write = Some(write);
                }
            }
        }

        if self.engine.is_complete() && self.state == ChannelState::Handshaking {
            self.complete_handshake()?;
        }
        Ok(())
    }

    fn complete_handshake(&mut self) -> Result<(), Error> {
        let session = self.engine.session().cloned().ok_or(HandshakeFailureReason::UnexpectedMessage)?;
        if !self.handler.on_handshake_complete(&session) {
            log::debug!("{:?}: handler vetoed the handshake", self.role);
            return Err(HandshakeFailureReason::Vetoed.into());
        }
        self.state = ChannelState::Established;
        if !self.engine.was_resumed() {
            self.config.session_cache.store(Arc::clone(&session));
        }
        log::debug!(
            "{:?}: established with {} (resumed: {})",
            self.role,
            session.cipher_suite(),
            self.engine.was_resumed()
        );
        self.session = Some(session);
        Ok(())
    }

    fn begin_close(&mut self) -> Result<(), Error> {
        self.state = ChannelState::Closing;
        self.write_alert(Alert::close_notify())
    }

    fn write_alert(&mut self, alert: Alert) -> Result<(), Error> {
        self.write_record(ContentType::Alert, &alert.encode())
    }

    /// Fragment `data` into records under the current write state.
    fn write_record(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), Error> {
        let out = self.outbox.buffer_mut();
        for chunk in data.chunks(self.config.max_fragment_len.clamp(1, MAX_PLAINTEXT_LEN)) {
            match self.write.as_mut() {
                Some(write) => write.seal(content_type, chunk, out)?,
                None => encode_plaintext_record(content_type, chunk, out)?,
            }
        }
        Ok(())
    }

    /// Close on fatal errors, then emit whatever output is waiting.
    fn finish<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(error) = &result {
            if error.is_fatal() {
                self.fail(error);
            }
        }
        self.flush();
        result
    }

    fn fail(&mut self, error: &Error) {
        if self.state == ChannelState::Closed {
            return;
        }
        log::debug!("{:?}: closing on error: {}", self.role, error);
        if let Some(description) = error.alert() {
            if let Err(e) = self.write_alert(Alert::fatal(description)) {
                log::debug!("{:?}: could not queue alert: {}", self.role, e);
            }
        }
        self.state = ChannelState::Closed;
        self.recv_buf.clear();
        self.drop_record_states();
    }

    fn drop_record_states(&mut self) {
        self.read = None;
        self.write = None;
        self.pending_read = None;
        self.pending_write = None;
    }

    fn flush(&mut self) {
        if let Some(bytes) = self.outbox.begin_write() {
            self.handler.on_output_ready(bytes);
        }
        if self.state == ChannelState::Closing && self.outbox.is_idle() {
            log::debug!("{:?}: closed", self.role);
            self.state = ChannelState::Closed;
            self.drop_record_states();
        }
    }
}

impl<H: ChannelHandler> core::fmt::Debug for Channel<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("sequence_numbers", &self.sequence_numbers())
            .finish_non_exhaustive()
    }
}
