//! cable-client: Client-side session engine for the cable protocol
//!
//! A [`Client`] owns one session over a persistent duplex byte stream
//! (a binary WebSocket with the `cable` subprotocol by default). It
//! handles the handshake, heartbeating, at-least-once message
//! delivery, request/response correlation, graceful shutdown, and
//! reconnection with pluggable backoff.
//!
//! # Example
//!
//! ```no_run
//! use cable_client::{Client, ClientOptions, Identity, OutgoingMessage, Qos, Status};
//!
//! # async fn run() -> Result<(), cable_client::ClientError> {
//! let client = Client::new("ws://localhost:9000/cable", ClientOptions::default());
//! client.auto_retry(Default::default());
//! client.connect(Identity::new("user", "client-1", "secret"), Default::default());
//!
//! let mut status = client.subscribe_status();
//! let _ = status.wait_for(|s| *s == Status::Opened).await;
//!
//! client
//!     .send(OutgoingMessage {
//!         qos: Qos::AtLeastOnce,
//!         kind: 1,
//!         payload: "hello".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let response = client.request("echo", "ping", Default::default()).await?;
//! println!("{:?}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod retry;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::ClientOptions;
pub use error::{ClientError, RetryReason};
pub use handler::{Handler, IncomingMessage, IncomingRequest, Reply};
pub use retry::{Backoff, RetryOptions, SuppressFilter};
pub use session::{OutgoingMessage, Response, Status};
pub use transport::{
    MockRemote, MockTransport, Transport, TransportError, TransportEvent, WebSocketTransport,
};

// Protocol vocabulary needed at the API surface.
pub use cable_protocol::{
    CloseCode, ConnackCode, Identity, Packet, Properties, Property, Qos, StatusCode,
};
