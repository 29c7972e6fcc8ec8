//! Session engine
//!
//! One task owns the transport, the state machine, the correlation
//! tables, and every timer. User-facing calls reach it over a command
//! channel and are completed through oneshot senders, so all state
//! mutation is serialized without locks.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::codec::Encoder;

use cable_protocol::{
    CableCodec, CloseCode, ConnackCode, Identity, Packet, Properties, Property, ProtocolError,
    Qos, StatusCode, PROTOCOL_VERSION,
};

use crate::config::ClientOptions;
use crate::error::{ClientError, RetryReason};
use crate::handler::{Handler, IncomingMessage, IncomingRequest, Reply};
use crate::retry::{Retrier, RetryOptions};
use crate::transport::{Transport, TransportEvent};

/// Wake-up bound for the deadline timer when nothing is pending
const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Created, never connected
    Unknown,
    /// Transport connection and handshake in progress
    Opening,
    /// Handshake accepted; sends and requests are allowed
    Opened,
    /// Graceful shutdown in progress
    Closing,
    /// Terminal state until the next `connect`
    Closed,
}

/// Parameters for [`crate::Client::send`]
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    /// Delivery guarantee
    pub qos: Qos,
    /// Application-defined subtype
    pub kind: u8,
    /// Message payload
    pub payload: Bytes,
    /// Message properties
    pub props: Properties,
}

/// A completed request's response
#[derive(Debug, Clone)]
pub struct Response {
    /// Outcome code; always [`StatusCode::Ok`] when surfaced to callers
    pub code: StatusCode,
    /// Response body
    pub body: Bytes,
    /// Response properties
    pub props: Properties,
}

/// Commands from the client handle to the session task
pub(crate) enum Command {
    Connect {
        identity: Identity,
        props: Properties,
    },
    Close {
        code: Option<CloseCode>,
        done: oneshot::Sender<()>,
    },
    Send {
        message: OutgoingMessage,
        done: oneshot::Sender<Result<(), ClientError>>,
    },
    Request {
        method: String,
        body: Bytes,
        props: Properties,
        done: oneshot::Sender<Result<Response, ClientError>>,
    },
    AutoRetry(RetryOptions),
}

/// Why the connection cycle stopped
enum Phase {
    /// The session left Opened involuntarily; consult the retrier
    Retry(RetryReason),
    /// The caller asked to close
    Close { ack: Option<oneshot::Sender<()>> },
    /// Every client handle is gone
    Shutdown,
}

/// Why `run_connection` returned
enum Exit {
    Closed,
    Shutdown,
}

/// A QoS-1 send awaiting its Messack
struct PendingMessage {
    kind: u8,
    payload: Bytes,
    props: Properties,
    /// Retransmissions performed so far
    retries: u32,
    deadline: Instant,
    done: oneshot::Sender<Result<(), ClientError>>,
}

/// A request awaiting its Response
struct PendingRequest {
    deadline: Instant,
    done: oneshot::Sender<Result<Response, ClientError>>,
}

/// Monotonic u16 ID source
///
/// Wraps modulo 2^16, skipping zero (reserved for QoS-0 messages) and
/// any ID still present in the correlation table.
#[derive(Debug, Default)]
struct IdSequence {
    last: u16,
}

impl IdSequence {
    fn next_free<V>(&mut self, in_flight: &HashMap<u16, V>) -> u16 {
        debug_assert!(in_flight.len() < usize::from(u16::MAX));
        loop {
            self.last = self.last.wrapping_add(1);
            if self.last != 0 && !in_flight.contains_key(&self.last) {
                return self.last;
            }
        }
    }
}

/// The session task state
pub(crate) struct Session<T: Transport> {
    url: String,
    options: ClientOptions,
    handler: Option<Arc<dyn Handler>>,
    transport: T,
    codec: CableCodec,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<Status>,
    conn_id: watch::Sender<Option<String>>,
    identity: Identity,
    connect_props: Properties,
    retrier: Option<Retrier>,
    message_ids: IdSequence,
    request_ids: IdSequence,
    message_tasks: HashMap<u16, PendingMessage>,
    request_tasks: HashMap<u16, PendingRequest>,
}

impl<T: Transport> Session<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        url: String,
        options: ClientOptions,
        transport: T,
        handler: Option<Arc<dyn Handler>>,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<Status>,
        conn_id: watch::Sender<Option<String>>,
    ) -> Self {
        Self {
            url,
            options,
            handler,
            transport,
            codec: CableCodec::new(),
            commands,
            status,
            conn_id,
            identity: Identity::default(),
            connect_props: Properties::new(),
            retrier: None,
            message_ids: IdSequence::default(),
            request_ids: IdSequence::default(),
            message_tasks: HashMap::new(),
            request_tasks: HashMap::new(),
        }
    }

    /// Entry point for the spawned session task
    pub(crate) async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Connect { identity, props } => {
                    self.identity = identity;
                    self.connect_props = props;
                    if let Exit::Shutdown = self.run_connection().await {
                        return;
                    }
                }
                Command::AutoRetry(options) => {
                    self.retrier = Some(Retrier::new(options));
                }
                Command::Close { done, .. } => {
                    // Terminal even if the session never connected, so
                    // status watchers always observe Closed. Idempotent.
                    self.set_status(Status::Closed).await;
                    let _ = done.send(());
                }
                Command::Send { done, .. } => {
                    let _ = done.send(Err(ClientError::NotReady));
                }
                Command::Request { done, .. } => {
                    let _ = done.send(Err(ClientError::NotReady));
                }
            }
        }
    }

    /// One full connect/opened/reconnect cycle, ending at Closed
    async fn run_connection(&mut self) -> Exit {
        loop {
            self.set_status(Status::Opening).await;

            let phase = match self.establish().await {
                Ok(()) => {
                    if let Some(retrier) = &mut self.retrier {
                        retrier.reset();
                    }
                    self.set_status(Status::Opened).await;
                    self.opened().await
                }
                Err(phase) => phase,
            };

            match phase {
                Phase::Retry(reason) => {
                    self.fail_pending(Some(&reason));
                    self.transport.close().await;

                    let delay = self.retrier.as_mut().and_then(|r| r.next_delay(&reason));
                    let Some(delay) = delay else {
                        tracing::warn!(reason = %reason, "session lost; giving up");
                        self.finish_close(None).await;
                        return Exit::Closed;
                    };

                    tracing::warn!(
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "session lost; retrying"
                    );
                    match self.wait_retry(delay).await {
                        None => continue,
                        Some(Phase::Close { ack }) => {
                            self.set_status(Status::Closing).await;
                            self.finish_close(ack).await;
                            return Exit::Closed;
                        }
                        Some(Phase::Shutdown) | Some(Phase::Retry(_)) => {
                            self.transport.close().await;
                            return Exit::Shutdown;
                        }
                    }
                }
                Phase::Close { ack } => {
                    self.set_status(Status::Closing).await;
                    self.fail_pending(None);
                    self.finish_close(ack).await;
                    return Exit::Closed;
                }
                Phase::Shutdown => {
                    self.transport.close().await;
                    return Exit::Shutdown;
                }
            }
        }
    }

    /// Open the transport and complete the handshake, bounded by the
    /// connect timeout
    async fn establish(&mut self) -> Result<(), Phase> {
        match timeout(self.options.connect_timeout, self.handshake()).await {
            Ok(result) => result,
            Err(_) => Err(Phase::Retry(RetryReason::NetworkError(
                "connect attempt timed out".to_string(),
            ))),
        }
    }

    async fn handshake(&mut self) -> Result<(), Phase> {
        if let Err(e) = self.transport.open(&self.url).await {
            return Err(Phase::Retry(RetryReason::NetworkError(e.to_string())));
        }

        let connect = Packet::Connect {
            version: PROTOCOL_VERSION,
            identity: self.identity.clone(),
            props: self.connect_props.clone(),
        };
        if let Err(reason) = self.write_control(connect).await {
            return Err(Phase::Retry(reason));
        }

        loop {
            tokio::select! {
                event = self.transport.recv() => {
                    let packets = match self.decode_event(event) {
                        Ok(packets) => packets,
                        Err(reason) => return Err(Phase::Retry(reason)),
                    };
                    for packet in packets {
                        match packet {
                            Packet::Connack { code: ConnackCode::Accepted, props } => {
                                self.conn_id
                                    .send_replace(props.get(Property::ConnId).map(str::to_owned));
                                return Ok(());
                            }
                            Packet::Connack { code, .. } => {
                                return Err(Phase::Retry(RetryReason::ConnectFailed(code)));
                            }
                            Packet::Close { code } => {
                                return Err(Phase::Retry(RetryReason::ServerClosed(code)));
                            }
                            other => {
                                tracing::debug!(
                                    packet_type = ?other.packet_type(),
                                    "ignoring packet before handshake completed"
                                );
                            }
                        }
                    }
                }
                command = self.commands.recv() => {
                    if let Some(phase) = self.inactive_command(command).await {
                        return Err(phase);
                    }
                }
            }
        }
    }

    /// The Opened state: heartbeat, dispatch, and operation timers
    async fn opened(&mut self) -> Phase {
        let mut ping_interval = tokio::time::interval_at(
            Instant::now() + self.options.ping_interval,
            self.options.ping_interval,
        );
        let mut ping_deadline: Option<Instant> = None;

        loop {
            let wake = self
                .next_op_deadline()
                .into_iter()
                .chain(ping_deadline)
                .min()
                .unwrap_or_else(|| Instant::now() + IDLE_WAKE);

            tokio::select! {
                command = self.commands.recv() => {
                    if let Some(phase) = self.opened_command(command).await {
                        return phase;
                    }
                }
                event = self.transport.recv() => {
                    match self.decode_event(event) {
                        Ok(packets) => {
                            for packet in packets {
                                if let Packet::Pong { .. } = &packet {
                                    tracing::trace!("Pong received");
                                    ping_deadline = None;
                                    continue;
                                }
                                if let Some(phase) = self.dispatch(packet).await {
                                    return phase;
                                }
                            }
                        }
                        Err(reason) => return Phase::Retry(reason),
                    }
                }
                _ = ping_interval.tick() => {
                    tracing::trace!("sending Ping");
                    if let Err(reason) = self.write_control(Packet::ping()).await {
                        return Phase::Retry(reason);
                    }
                    ping_deadline = Some(Instant::now() + self.options.ping_timeout);
                }
                _ = sleep_until(wake) => {
                    if ping_deadline.is_some_and(|deadline| deadline <= Instant::now()) {
                        tracing::warn!("ping timed out");
                        return Phase::Retry(RetryReason::PingTimeout);
                    }
                    if let Some(phase) = self.expire_ops().await {
                        return phase;
                    }
                }
            }
        }
    }

    /// Dispatch one inbound packet while Opened
    async fn dispatch(&mut self, packet: Packet) -> Option<Phase> {
        match packet {
            Packet::Connect { .. } => {
                // Clients do not receive Connect frames.
                tracing::debug!("ignoring inbound Connect");
            }

            Packet::Connack { .. } => {
                tracing::debug!("ignoring Connack outside handshake");
            }

            Packet::Message {
                id,
                qos,
                dup,
                kind,
                payload,
                props,
            } => {
                if let Some(handler) = self.handler.clone() {
                    handler
                        .on_message(IncomingMessage {
                            kind,
                            dup,
                            payload,
                            props,
                        })
                        .await;
                }
                if qos == Qos::AtLeastOnce {
                    if let Err(reason) = self.write_control(Packet::messack(id)).await {
                        return Some(Phase::Retry(reason));
                    }
                }
            }

            Packet::Messack { id, .. } => match self.message_tasks.remove(&id) {
                Some(pending) => {
                    tracing::debug!(id, "message acknowledged");
                    let _ = pending.done.send(Ok(()));
                }
                None => tracing::debug!(id, "Messack for unknown message"),
            },

            Packet::Request {
                id,
                method,
                body,
                props,
            } => {
                let reply = match self.handler.clone() {
                    Some(handler) => {
                        handler
                            .on_request(IncomingRequest {
                                method,
                                body,
                                props,
                            })
                            .await
                    }
                    None => Reply::status(StatusCode::Unavailable),
                };
                let response = Packet::Response {
                    id,
                    code: reply.code,
                    body: reply.body,
                    props: reply.props,
                };
                if let Err(reason) = self.write_control(response).await {
                    return Some(Phase::Retry(reason));
                }
            }

            Packet::Response {
                id,
                code,
                body,
                props,
            } => match self.request_tasks.remove(&id) {
                Some(pending) => {
                    let result = if code == StatusCode::Ok {
                        Ok(Response { code, body, props })
                    } else {
                        Err(ClientError::RequestFailed(code))
                    };
                    let _ = pending.done.send(result);
                }
                None => tracing::debug!(id, "Response for unknown request"),
            },

            Packet::Ping { .. } => {
                if let Err(reason) = self.write_control(Packet::pong()).await {
                    return Some(Phase::Retry(reason));
                }
            }

            // Handled by the opened loop before dispatch.
            Packet::Pong { .. } => {}

            Packet::Close { code } => {
                return Some(Phase::Retry(RetryReason::ServerClosed(code)));
            }
        }
        None
    }

    /// Handle a command while Opened
    async fn opened_command(&mut self, command: Option<Command>) -> Option<Phase> {
        match command {
            None => Some(Phase::Shutdown),
            Some(Command::Connect { .. }) => None, // idempotent
            Some(Command::AutoRetry(options)) => {
                self.retrier = Some(Retrier::new(options));
                None
            }
            Some(Command::Close { code, done }) => {
                if let Some(code) = code {
                    self.try_write(Packet::Close { code }).await;
                }
                Some(Phase::Close { ack: Some(done) })
            }
            Some(Command::Send { message, done }) => self.start_send(message, done).await,
            Some(Command::Request {
                method,
                body,
                props,
                done,
            }) => self.start_request(method, body, props, done).await,
        }
    }

    /// Handle a command while Opening or waiting to reconnect
    async fn inactive_command(&mut self, command: Option<Command>) -> Option<Phase> {
        match command {
            None => Some(Phase::Shutdown),
            Some(Command::Connect { .. }) => None, // idempotent
            Some(Command::AutoRetry(options)) => {
                self.retrier = Some(Retrier::new(options));
                None
            }
            Some(Command::Close { code, done }) => {
                if let Some(code) = code {
                    self.try_write(Packet::Close { code }).await;
                }
                Some(Phase::Close { ack: Some(done) })
            }
            Some(Command::Send { done, .. }) => {
                let _ = done.send(Err(ClientError::NotReady));
                None
            }
            Some(Command::Request { done, .. }) => {
                let _ = done.send(Err(ClientError::NotReady));
                None
            }
        }
    }

    /// Begin a user-issued send
    async fn start_send(
        &mut self,
        message: OutgoingMessage,
        done: oneshot::Sender<Result<(), ClientError>>,
    ) -> Option<Phase> {
        if message.qos == Qos::AtMostOnce {
            let packet = Packet::Message {
                id: 0,
                qos: Qos::AtMostOnce,
                dup: false,
                kind: message.kind,
                payload: message.payload,
                props: message.props,
            };
            let frame = match self.encode(packet) {
                Ok(frame) => frame,
                Err(e) => {
                    let _ = done.send(Err(e.into()));
                    return None;
                }
            };
            return match self.transport.send(frame).await {
                Ok(()) => {
                    let _ = done.send(Ok(()));
                    None
                }
                Err(e) => {
                    let reason = RetryReason::NetworkError(e.to_string());
                    let _ = done.send(Err(ClientError::ConnectionLost(reason.clone())));
                    Some(Phase::Retry(reason))
                }
            };
        }

        let id = self.message_ids.next_free(&self.message_tasks);
        let packet = Packet::Message {
            id,
            qos: Qos::AtLeastOnce,
            dup: false,
            kind: message.kind,
            payload: message.payload.clone(),
            props: message.props.clone(),
        };
        let frame = match self.encode(packet) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = done.send(Err(e.into()));
                return None;
            }
        };

        // The correlation entry goes in before the frame goes out.
        self.message_tasks.insert(
            id,
            PendingMessage {
                kind: message.kind,
                payload: message.payload,
                props: message.props,
                retries: 0,
                deadline: Instant::now() + self.options.message_timeout,
                done,
            },
        );
        tracing::debug!(id, "sending QoS-1 message");
        match self.transport.send(frame).await {
            Ok(()) => None,
            Err(e) => Some(Phase::Retry(RetryReason::NetworkError(e.to_string()))),
        }
    }

    /// Begin a user-issued request
    async fn start_request(
        &mut self,
        method: String,
        body: Bytes,
        props: Properties,
        done: oneshot::Sender<Result<Response, ClientError>>,
    ) -> Option<Phase> {
        let id = self.request_ids.next_free(&self.request_tasks);
        let packet = Packet::Request {
            id,
            method,
            body,
            props,
        };
        let frame = match self.encode(packet) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = done.send(Err(e.into()));
                return None;
            }
        };

        self.request_tasks.insert(
            id,
            PendingRequest {
                deadline: Instant::now() + self.options.request_timeout,
                done,
            },
        );
        tracing::debug!(id, "sending request");
        match self.transport.send(frame).await {
            Ok(()) => None,
            Err(e) => Some(Phase::Retry(RetryReason::NetworkError(e.to_string()))),
        }
    }

    /// Fire expired operation timers: fail requests, retransmit or
    /// fail QoS-1 messages
    async fn expire_ops(&mut self) -> Option<Phase> {
        let now = Instant::now();

        let expired: Vec<u16> = self
            .request_tasks
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(pending) = self.request_tasks.remove(&id) {
                tracing::warn!(id, "request timed out");
                let _ = pending.done.send(Err(ClientError::RequestTimeout));
            }
        }

        let expired: Vec<u16> = self
            .message_tasks
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            let exhausted = self
                .message_tasks
                .get(&id)
                .is_some_and(|pending| pending.retries >= self.options.message_max_retry);
            if exhausted {
                if let Some(pending) = self.message_tasks.remove(&id) {
                    tracing::warn!(id, "message timed out");
                    let _ = pending.done.send(Err(ClientError::MessageTimeout));
                }
                continue;
            }

            let Some((kind, payload, props, retries)) =
                self.message_tasks.get_mut(&id).map(|pending| {
                    pending.retries += 1;
                    pending.deadline = now + self.options.message_timeout;
                    (
                        pending.kind,
                        pending.payload.clone(),
                        pending.props.clone(),
                        pending.retries,
                    )
                })
            else {
                continue;
            };

            // Retransmissions re-use the original ID and set dup.
            let packet = Packet::Message {
                id,
                qos: Qos::AtLeastOnce,
                dup: true,
                kind,
                payload,
                props,
            };
            tracing::debug!(id, retries, "retransmitting QoS-1 message");
            if let Err(reason) = self.write_control(packet).await {
                return Some(Phase::Retry(reason));
            }
        }

        None
    }

    /// Earliest pending-operation deadline
    fn next_op_deadline(&self) -> Option<Instant> {
        let request = self.request_tasks.values().map(|p| p.deadline).min();
        let message = self.message_tasks.values().map(|p| p.deadline).min();
        match (request, message) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (deadline, None) | (None, deadline) => deadline,
        }
    }

    /// Sleep out a reconnect delay while staying responsive to commands
    async fn wait_retry(&mut self, delay: Duration) -> Option<Phase> {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return None,
                command = self.commands.recv() => {
                    if let Some(phase) = self.inactive_command(command).await {
                        return Some(phase);
                    }
                }
            }
        }
    }

    /// Decode a transport event into whole packets
    ///
    /// Decode failures are folded into a network-level retry reason
    /// rather than surfaced to callers.
    fn decode_event(
        &mut self,
        event: Option<TransportEvent>,
    ) -> Result<Vec<Packet>, RetryReason> {
        match event {
            Some(TransportEvent::Message(data)) => {
                let mut buf = BytesMut::from(&data[..]);
                let mut packets = Vec::new();
                while !buf.is_empty() {
                    match Packet::decode(&mut buf) {
                        Ok(packet) => packets.push(packet),
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping undecodable inbound frame");
                            return Err(RetryReason::NetworkError(e.to_string()));
                        }
                    }
                }
                Ok(packets)
            }
            Some(TransportEvent::Closed { code, reason }) => {
                Err(RetryReason::NetworkError(format!(
                    "transport closed (code: {code:?}, reason: {reason:?})"
                )))
            }
            Some(TransportEvent::Error(message)) => Err(RetryReason::NetworkError(message)),
            None => Err(RetryReason::NetworkError(
                "transport stream ended".to_string(),
            )),
        }
    }

    fn encode(&mut self, packet: Packet) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::new();
        self.codec.encode(packet, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Write an engine-generated packet
    ///
    /// Transport failures become a retry reason; encode failures are
    /// logged and skipped since the connection itself is healthy.
    async fn write_control(&mut self, packet: Packet) -> Result<(), RetryReason> {
        let frame = match self.encode(packet) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode packet");
                return Ok(());
            }
        };
        self.transport
            .send(frame)
            .await
            .map_err(|e| RetryReason::NetworkError(e.to_string()))
    }

    /// Best-effort write used for the final Close frame
    async fn try_write(&mut self, packet: Packet) {
        match self.encode(packet) {
            Ok(frame) => {
                if let Err(e) = self.transport.send(frame).await {
                    tracing::debug!(error = %e, "best-effort write failed");
                }
            }
            Err(e) => tracing::debug!(error = %e, "best-effort encode failed"),
        }
    }

    /// Fail every pending operation with the latest reason
    fn fail_pending(&mut self, reason: Option<&RetryReason>) {
        let error = |reason: Option<&RetryReason>| match reason {
            Some(reason) => ClientError::ConnectionLost(reason.clone()),
            None => ClientError::SessionClosed,
        };
        for (_, pending) in self.message_tasks.drain() {
            let _ = pending.done.send(Err(error(reason)));
        }
        for (_, pending) in self.request_tasks.drain() {
            let _ = pending.done.send(Err(error(reason)));
        }
    }

    /// Tear down the transport and enter Closed
    async fn finish_close(&mut self, ack: Option<oneshot::Sender<()>>) {
        self.transport.close().await;
        self.conn_id.send_replace(None);
        self.set_status(Status::Closed).await;
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    async fn set_status(&mut self, status: Status) {
        if *self.status.borrow() == status {
            return;
        }
        tracing::info!(?status, "session status changed");
        self.status.send_replace(status);
        if let Some(handler) = self.handler.clone() {
            handler.on_status(status).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_sequence_monotonic() {
        let mut ids = IdSequence::default();
        let empty: HashMap<u16, ()> = HashMap::new();
        assert_eq!(ids.next_free(&empty), 1);
        assert_eq!(ids.next_free(&empty), 2);
        assert_eq!(ids.next_free(&empty), 3);
    }

    #[test]
    fn test_id_sequence_skips_zero_on_wrap() {
        let mut ids = IdSequence { last: u16::MAX - 1 };
        let empty: HashMap<u16, ()> = HashMap::new();
        assert_eq!(ids.next_free(&empty), u16::MAX);
        // Wraps past zero.
        assert_eq!(ids.next_free(&empty), 1);
    }

    #[test]
    fn test_id_sequence_skips_in_flight() {
        let mut ids = IdSequence::default();
        let mut in_flight: HashMap<u16, ()> = HashMap::new();
        in_flight.insert(1, ());
        in_flight.insert(2, ());
        assert_eq!(ids.next_free(&in_flight), 3);
    }
}
