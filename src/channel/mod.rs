//! The channel: one TLS connection over a caller-driven byte stream.
//!
//! ```text
//! transport bytes ─► Channel::received ─► record codec ─► handshake engine
//!                                                     └─► ChannelHandler::on_data_received
//! Channel::send ─► record codec ─► outbox ─► ChannelHandler::on_output_ready
//! ```

mod connection;
mod handler;
pub mod outbox;
pub mod record;

pub use connection::{Channel, ChannelState};
pub use handler::ChannelHandler;
