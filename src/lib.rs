//! A transport-agnostic TLS 1.2 channel engine.
//!
//! The crate performs no I/O. A [`Channel`] consumes bytes the embedder
//! read from its transport and hands back bytes to write through a
//! [`ChannelHandler`]. Handshake, record protection and session
//! resumption all happen inside those calls.
//!
//! ```no_run
//! use core::ops::ControlFlow;
//! use milli_tls::{Channel, ChannelConfig, ChannelHandler, Rng, Session};
//!
//! struct Sink(Vec<u8>);
//!
//! impl ChannelHandler for Sink {
//!     fn on_output_ready(&mut self, bytes: &[u8]) {
//!         self.0.extend_from_slice(bytes);
//!     }
//!     fn on_data_received(&mut self, _data: &[u8]) -> ControlFlow<()> {
//!         ControlFlow::Continue(())
//!     }
//!     fn on_handshake_complete(&mut self, _session: &Session) -> bool {
//!         true
//!     }
//! }
//!
//! # struct OsRng;
//! # impl Rng for OsRng { fn fill(&mut self, _buf: &mut [u8]) {} }
//! let config = ChannelConfig::client(Some("example.test"));
//! let mut channel = Channel::client(config, Sink(Vec::new()), &mut OsRng)?;
//! channel.start()?;
//! // Write channel.handler().0 to the socket, then call write_complete().
//! channel.write_complete();
//! # Ok::<(), milli_tls::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod policy;
mod selftest;
pub mod session;
pub mod tls;
pub mod transport;

pub use channel::{Channel, ChannelHandler, ChannelState};
pub use config::ChannelConfig;
pub use credentials::{Certificate, CredentialsProvider, InMemoryCredentials, KeyType, PrivateKey, PublicKey, Usage};
pub use error::{Error, HandshakeFailureReason, ProtocolViolation, Result};
pub use policy::{DefaultPolicy, Policy};
pub use session::{InMemorySessionCache, NoSessionCache, Session, SessionCache, SessionId};
pub use tls::{Alert, AlertDescription, CipherSuite, Role};
pub use transport::{Clock, Instant, Rng, SystemClock};

/// Run the crypto self tests. Channels call this on construction.
///
/// The tests run once per process; every later call returns the first
/// outcome. There is nothing to tear down.
pub fn init() -> Result<()> {
    selftest::run_once()
}
