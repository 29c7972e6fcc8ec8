//! Client error types

use cable_protocol::{CloseCode, ConnackCode, ProtocolError, StatusCode};
use thiserror::Error;

use crate::transport::TransportError;

/// Reasons the session left (or failed to reach) the Opened state
///
/// Fed to the retry controller's filter and carried by
/// [`ClientError::ConnectionLost`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The server answered the handshake with a non-Accepted code
    #[error("Handshake failed: {0:?}")]
    ConnectFailed(ConnackCode),

    /// The server sent a Close frame
    #[error("Server closed the session: {0:?}")]
    ServerClosed(CloseCode),

    /// The transport failed, ended, or delivered undecodable bytes
    #[error("Network error: {0}")]
    NetworkError(String),

    /// No Pong arrived within the ping timeout
    #[error("No Pong within the ping timeout")]
    PingTimeout,
}

/// Errors surfaced by the client API
#[derive(Error, Debug)]
pub enum ClientError {
    /// The session is not in the Opened state
    #[error("Client is not ready")]
    NotReady,

    /// No Response arrived within the request timeout
    #[error("Request timed out")]
    RequestTimeout,

    /// No Messack arrived within the retransmission budget
    #[error("Message delivery timed out")]
    MessageTimeout,

    /// The server answered a request with a non-OK status
    #[error("Request failed: {0:?}")]
    RequestFailed(StatusCode),

    /// The session left Opened while the operation was pending
    #[error("Connection lost: {0}")]
    ConnectionLost(RetryReason),

    /// The session was closed by the caller
    #[error("Session closed")]
    SessionClosed,

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
