//! Transport abstraction for the session engine
//!
//! The engine drives any duplex binary channel that delivers whole
//! frames. [`WebSocketTransport`] is the production implementation;
//! [`MockTransport`] drives the engine in tests.

mod mock;
mod websocket;

pub use mock::{MockRemote, MockTransport};
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Subprotocol announced when opening a WebSocket stream
pub const SUBPROTOCOL: &str = "cable";

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Opening the stream failed
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// The stream is not open
    #[error("Transport is not open")]
    NotOpen,

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    Send(String),
}

/// Events observed on an open transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A complete inbound binary frame
    Message(Bytes),

    /// The peer closed the stream
    Closed {
        /// Transport-level close code, if any
        code: Option<u16>,
        /// Close reason, if any
        reason: Option<String>,
    },

    /// The stream failed
    Error(String),
}

/// A duplex binary channel carrying whole frames
///
/// One transport value lives across reconnects: `open` starts a fresh
/// stream and `close` tears the current one down.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Open a stream to `url`
    async fn open(&mut self, url: &str) -> Result<(), TransportError>;

    /// Send one binary frame
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Receive the next event
    ///
    /// Returns `None` once the stream has ended and no further events
    /// will arrive.
    async fn recv(&mut self) -> Option<TransportEvent>;

    /// Close the current stream
    async fn close(&mut self);
}
