//! Client handle for a cable session

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};

use cable_protocol::{CloseCode, Identity, Properties};

use crate::config::ClientOptions;
use crate::error::ClientError;
use crate::handler::Handler;
use crate::retry::RetryOptions;
use crate::session::{Command, OutgoingMessage, Response, Session, Status};
use crate::transport::{Transport, WebSocketTransport};

/// Handle to a cable session
///
/// Cheap to clone; every clone talks to the same session task. The
/// task exits once all handles are dropped.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Status>,
    conn_id: watch::Receiver<Option<String>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("status", &self.status())
            .field("id", &self.id())
            .finish()
    }
}

impl Client {
    /// Create a client over the production WebSocket transport
    ///
    /// Must be called from within a tokio runtime; the session task is
    /// spawned immediately in status [`Status::Unknown`].
    pub fn new(url: impl Into<String>, options: ClientOptions) -> Self {
        Self::with_transport(url, options, WebSocketTransport::new(), None)
    }

    /// Create a client with an event handler
    pub fn with_handler(
        url: impl Into<String>,
        options: ClientOptions,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self::with_transport(url, options, WebSocketTransport::new(), Some(handler))
    }

    /// Create a client over a custom transport
    pub fn with_transport<T: Transport>(
        url: impl Into<String>,
        options: ClientOptions,
        transport: T,
        handler: Option<Arc<dyn Handler>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(Status::Unknown);
        let (conn_id_tx, conn_id_rx) = watch::channel(None);

        let session = Session::new(
            url.into(),
            options,
            transport,
            handler,
            command_rx,
            status_tx,
            conn_id_tx,
        );
        tokio::spawn(session.run());

        Self {
            commands: command_tx,
            status: status_rx,
            conn_id: conn_id_rx,
        }
    }

    /// Begin connecting with `identity`
    ///
    /// `props` are carried in the Connect frame alongside the identity
    /// fields. Valid from [`Status::Unknown`] and [`Status::Closed`];
    /// a no-op while a session is already opening or open. Watch
    /// [`Client::subscribe_status`] or handle `on_status` to observe
    /// the outcome.
    pub fn connect(&self, identity: Identity, props: Properties) {
        let _ = self.commands.send(Command::Connect { identity, props });
    }

    /// Close the session
    ///
    /// When `code` is given, a Close frame is written best-effort
    /// first. Never fails; completes once the session reaches
    /// [`Status::Closed`]. Idempotent.
    pub async fn close(&self, code: Option<CloseCode>) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Close { code, done }).is_ok() {
            let _ = wait.await;
        }
    }

    /// Install a retry controller for automatic reconnection
    pub fn auto_retry(&self, options: RetryOptions) {
        let _ = self.commands.send(Command::AutoRetry(options));
    }

    /// Deliver a message
    ///
    /// With [`crate::Qos::AtMostOnce`] this completes as soon as the
    /// frame reaches the transport; with [`crate::Qos::AtLeastOnce`]
    /// it completes when the matching Messack arrives, retransmitting
    /// up to the configured budget first. Fails with
    /// [`ClientError::NotReady`] unless the session is Opened.
    pub async fn send(&self, message: OutgoingMessage) -> Result<(), ClientError> {
        if !self.is_ready() {
            return Err(ClientError::NotReady);
        }
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Send { message, done })
            .map_err(|_| ClientError::SessionClosed)?;
        wait.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// Issue a request and await its response
    ///
    /// Completes with the [`Response`] when the server answers OK;
    /// fails with [`ClientError::RequestFailed`] for any other status
    /// and [`ClientError::RequestTimeout`] on expiry.
    pub async fn request(
        &self,
        method: impl Into<String>,
        body: impl Into<Bytes>,
        props: Properties,
    ) -> Result<Response, ClientError> {
        if !self.is_ready() {
            return Err(ClientError::NotReady);
        }
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Request {
                method: method.into(),
                body: body.into(),
                props,
                done,
            })
            .map_err(|_| ClientError::SessionClosed)?;
        wait.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// Server-assigned connection ID from the latest handshake
    pub fn id(&self) -> Option<String> {
        self.conn_id.borrow().clone()
    }

    /// Current session status
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Whether sends and requests will currently be accepted
    pub fn is_ready(&self) -> bool {
        self.status() == Status::Opened
    }

    /// Watch status transitions
    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }
}
