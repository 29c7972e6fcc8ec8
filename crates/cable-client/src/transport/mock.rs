//! Scriptable in-memory transport for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use cable_protocol::Packet;

use super::{Transport, TransportError, TransportEvent};

/// In-memory transport driving the session engine in tests
///
/// Create a pair with [`MockTransport::pair`]; the [`MockRemote`] end
/// plays the server: it observes open attempts and outbound frames,
/// and injects inbound events.
#[derive(Debug)]
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<Bytes>,
    opens: mpsc::UnboundedSender<String>,
    reject_opens: Arc<AtomicBool>,
    open: bool,
}

/// Server end of a [`MockTransport`] pair
#[derive(Debug)]
pub struct MockRemote {
    inbound: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    opens: mpsc::UnboundedReceiver<String>,
    reject_opens: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a connected transport/remote pair
    pub fn pair() -> (MockTransport, MockRemote) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (opens_tx, opens_rx) = mpsc::unbounded_channel();
        let reject_opens = Arc::new(AtomicBool::new(false));

        (
            MockTransport {
                inbound: inbound_rx,
                outbound: outbound_tx,
                opens: opens_tx,
                reject_opens: Arc::clone(&reject_opens),
                open: false,
            },
            MockRemote {
                inbound: inbound_tx,
                outbound: outbound_rx,
                opens: opens_rx,
                reject_opens,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self, url: &str) -> Result<(), TransportError> {
        if self.reject_opens.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("open rejected".to_string()));
        }
        self.open = true;
        let _ = self.opens.send(url.to_string());
        Ok(())
    }

    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Send("remote dropped".to_string()))
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.open = false;
    }
}

impl MockRemote {
    /// Wait for the engine to open the transport; returns the URL
    pub async fn expect_open(&mut self) -> String {
        self.opens.recv().await.expect("session task dropped")
    }

    /// Next outbound frame, decoded into a packet
    pub async fn next_packet(&mut self) -> Packet {
        let frame = self.outbound.recv().await.expect("session task dropped");
        let mut buf = BytesMut::from(&frame[..]);
        Packet::decode(&mut buf).expect("undecodable outbound frame")
    }

    /// Inject an inbound packet
    pub fn send_packet(&self, packet: Packet) {
        let frame = packet.to_bytes().expect("unencodable inbound packet");
        let _ = self.inbound.send(TransportEvent::Message(frame));
    }

    /// Inject raw inbound bytes
    pub fn send_bytes(&self, bytes: impl Into<Bytes>) {
        let _ = self.inbound.send(TransportEvent::Message(bytes.into()));
    }

    /// Inject a stream failure
    pub fn send_error(&self, message: impl Into<String>) {
        let _ = self.inbound.send(TransportEvent::Error(message.into()));
    }

    /// Inject a peer close
    pub fn send_closed(&self, code: Option<u16>) {
        let _ = self.inbound.send(TransportEvent::Closed { code, reason: None });
    }

    /// Make subsequent open attempts fail
    pub fn reject_opens(&self, reject: bool) {
        self.reject_opens.store(reject, Ordering::SeqCst);
    }
}
