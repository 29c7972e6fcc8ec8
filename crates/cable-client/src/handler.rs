//! User-facing event handler

use async_trait::async_trait;
use bytes::Bytes;
use cable_protocol::{Properties, StatusCode};

use crate::session::Status;

/// An inbound application message delivered to the handler
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Application-defined subtype
    pub kind: u8,
    /// True when this delivery is a retransmission
    pub dup: bool,
    /// Message payload
    pub payload: Bytes,
    /// Message properties
    pub props: Properties,
}

/// An inbound request awaiting a reply
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Method name
    pub method: String,
    /// Request body
    pub body: Bytes,
    /// Request properties
    pub props: Properties,
}

/// Reply produced by [`Handler::on_request`]
///
/// The session engine correlates the reply to the request ID and
/// writes the Response frame itself, so handlers never need a
/// reference back to the client.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Outcome code
    pub code: StatusCode,
    /// Response body
    pub body: Bytes,
    /// Response properties
    pub props: Properties,
}

impl Reply {
    /// Successful reply with a body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            code: StatusCode::Ok,
            body: body.into(),
            props: Properties::new(),
        }
    }

    /// Bodyless reply with a status code
    pub fn status(code: StatusCode) -> Self {
        Self {
            code,
            body: Bytes::new(),
            props: Properties::new(),
        }
    }
}

/// Callbacks consumed by the session engine
///
/// All callbacks run on the session task, in the order their
/// triggering events were observed; a slow handler delays everything
/// behind it, including heartbeats.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Session status changed
    async fn on_status(&self, status: Status) {
        let _ = status;
    }

    /// An application message arrived
    async fn on_message(&self, message: IncomingMessage) {
        let _ = message;
    }

    /// A request arrived; the returned reply is sent as its Response
    ///
    /// The default implementation answers [`StatusCode::Unavailable`].
    async fn on_request(&self, request: IncomingRequest) -> Reply {
        let _ = request;
        Reply::status(StatusCode::Unavailable)
    }
}
