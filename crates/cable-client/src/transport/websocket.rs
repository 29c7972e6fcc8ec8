//! Production WebSocket transport

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Transport, TransportError, TransportEvent, SUBPROTOCOL};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Binary WebSocket transport announcing the `cable` subprotocol
///
/// Text frames are ignored; transport-level ping/pong is handled by
/// the WebSocket layer and never surfaces to the session engine.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    /// Create a transport with no open stream
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&mut self, url: &str) -> Result<(), TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url, "WebSocket stream open");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream
            .send(WsMessage::Binary(frame.to_vec()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            let next = self.stream.as_mut()?.next().await;
            match next {
                Some(Ok(WsMessage::Binary(data))) => {
                    return Some(TransportEvent::Message(Bytes::from(data)));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    self.stream = None;
                    return Some(TransportEvent::Closed {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame.map(|f| f.reason.into_owned()),
                    });
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(other)) => {
                    tracing::warn!(?other, "ignoring non-binary WebSocket message");
                }
                Some(Err(e)) => {
                    self.stream = None;
                    return Some(TransportEvent::Error(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}
