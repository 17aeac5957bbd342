//! TLS 1.2 protocol pieces: wire codec, messages, key schedule and the
//! handshake state machine.
//!
//! Nothing in here frames records or owns buffers for the transport; that
//! is the job of [`crate::channel`].

pub mod alert;
pub mod cipher_suite;
pub mod codec;
pub mod extensions;
pub mod handshake;
pub mod key_schedule;
pub mod messages;
pub mod transcript;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use cipher_suite::{CipherSuite, ProtocolVersion, SignatureScheme};
pub use handshake::{HandshakeEngine, HandshakeOutput, Role};
