use core::ops::ControlFlow;

use crate::session::Session;
use crate::tls::alert::Alert;

/// Callbacks from a [`Channel`](super::Channel) to its embedder.
///
/// The channel owns its handler and calls it synchronously from inside
/// `received`, `send`, `close` and `write_complete`. Handlers cannot call
/// back into the channel; the return values carry the only requests a
/// handler can make.
pub trait ChannelHandler {
    /// Bytes to write to the transport.
    ///
    /// The embedder must call [`Channel::write_complete`](super::Channel::write_complete)
    /// once all of them are written. No further output is produced until then.
    fn on_output_ready(&mut self, bytes: &[u8]);

    /// Decrypted application data. `Break` closes the channel after this record.
    fn on_data_received(&mut self, data: &[u8]) -> ControlFlow<()>;

    /// The handshake finished. Returning `false` aborts the connection.
    fn on_handshake_complete(&mut self, session: &Session) -> bool;

    /// An alert arrived from the peer.
    fn on_alert(&mut self, _alert: Alert) {}
}
