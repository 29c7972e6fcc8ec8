//! Integration tests driving the session engine through the mock transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cable_client::{
    Backoff, Client, ClientError, ClientOptions, CloseCode, ConnackCode, Handler, Identity,
    IncomingMessage, IncomingRequest, MockRemote, MockTransport, OutgoingMessage, Packet,
    Properties, Property, Qos, Reply, RetryOptions, RetryReason, Status, StatusCode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn fast_options() -> ClientOptions {
    ClientOptions {
        ping_interval: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Drive a fresh client through the handshake into Opened
async fn open_client(
    options: ClientOptions,
    handler: Option<Arc<dyn Handler>>,
) -> (Client, MockRemote) {
    init_tracing();
    let (transport, mut remote) = MockTransport::pair();
    let client = Client::with_transport("mock://cable", options, transport, handler);

    client.connect(Identity::new("u", "c", "p"), Properties::new());
    remote.expect_open().await;

    let connect = remote.next_packet().await;
    assert!(matches!(connect, Packet::Connect { .. }));
    assert_eq!(client.status(), Status::Opening);

    remote.send_packet(Packet::Connack {
        code: ConnackCode::Accepted,
        props: Properties::new().with(Property::ConnId, "conn-1"),
    });

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Opened).await.unwrap();
    (client, remote)
}

#[tokio::test]
async fn starts_unknown_and_rejects_sends() {
    init_tracing();
    let (transport, _remote) = MockTransport::pair();
    let client =
        Client::with_transport("mock://cable", ClientOptions::default(), transport, None);

    assert_eq!(client.status(), Status::Unknown);
    assert!(!client.is_ready());

    let err = client.send(OutgoingMessage::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::NotReady));

    let err = client
        .request("m", "", Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotReady));
}

#[tokio::test]
async fn connect_carries_extra_properties() {
    init_tracing();
    let (transport, mut remote) = MockTransport::pair();
    let client = Client::with_transport("mock://cable", fast_options(), transport, None);

    client.connect(
        Identity::new("u", "c", "p"),
        Properties::new().with(Property::Channel, "general"),
    );
    remote.expect_open().await;

    match remote.next_packet().await {
        Packet::Connect {
            identity, props, ..
        } => {
            assert_eq!(identity, Identity::new("u", "c", "p"));
            assert_eq!(props.get(Property::Channel), Some("general"));
        }
        other => panic!("expected Connect, got {other:?}"),
    }
}

#[tokio::test]
async fn close_before_connect_reaches_closed() {
    init_tracing();
    let (transport, _remote) = MockTransport::pair();
    let client =
        Client::with_transport("mock://cable", ClientOptions::default(), transport, None);
    assert_eq!(client.status(), Status::Unknown);

    client.close(None).await;
    assert_eq!(client.status(), Status::Closed);
    assert!(!client.is_ready());

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();

    // Still idempotent once Closed.
    client.close(None).await;
    assert_eq!(client.status(), Status::Closed);
}

#[tokio::test]
async fn handshake_reaches_opened() {
    let (client, _remote) = open_client(fast_options(), None).await;
    assert_eq!(client.status(), Status::Opened);
    assert!(client.is_ready());
    assert_eq!(client.id().as_deref(), Some("conn-1"));
}

#[tokio::test]
async fn handshake_rejection_without_retrier_closes() {
    init_tracing();
    let (transport, mut remote) = MockTransport::pair();
    let client = Client::with_transport("mock://cable", fast_options(), transport, None);

    client.connect(Identity::default(), Properties::new());
    remote.expect_open().await;
    let _connect = remote.next_packet().await;
    remote.send_packet(Packet::Connack {
        code: ConnackCode::Rejected,
        props: Properties::new(),
    });

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();
    assert!(!client.is_ready());
}

#[tokio::test]
async fn handshake_rejection_reaches_retry_filter() {
    init_tracing();
    let (transport, mut remote) = MockTransport::pair();
    let client = Client::with_transport("mock://cable", fast_options(), transport, None);

    let (reason_tx, mut reason_rx) = mpsc::unbounded_channel();
    client.auto_retry(RetryOptions {
        limit: None,
        backoff: Backoff::Const { delay: 0.0 },
        suppress: Some(Arc::new(move |reason: &RetryReason| {
            let _ = reason_tx.send(reason.clone());
            true // fatal: close instead of retrying
        })),
    });

    client.connect(Identity::default(), Properties::new());
    remote.expect_open().await;
    let _connect = remote.next_packet().await;
    remote.send_packet(Packet::Connack {
        code: ConnackCode::Duplicate,
        props: Properties::new(),
    });

    let reason = reason_rx.recv().await.unwrap();
    assert_eq!(reason, RetryReason::ConnectFailed(ConnackCode::Duplicate));

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();
}

#[tokio::test]
async fn qos0_send_is_fire_and_forget() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    client
        .send(OutgoingMessage {
            qos: Qos::AtMostOnce,
            kind: 9,
            payload: "hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    match remote.next_packet().await {
        Packet::Message {
            id,
            qos,
            dup,
            kind,
            payload,
            ..
        } => {
            assert_eq!(id, 0);
            assert_eq!(qos, Qos::AtMostOnce);
            assert!(!dup);
            assert_eq!(kind, 9);
            assert_eq!(payload.as_ref(), b"hi");
        }
        other => panic!("expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn qos1_send_completes_on_messack() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    let sender = client.clone();
    let send_task = tokio::spawn(async move {
        sender
            .send(OutgoingMessage {
                qos: Qos::AtLeastOnce,
                kind: 1,
                payload: "ack me".into(),
                ..Default::default()
            })
            .await
    });

    let id = match remote.next_packet().await {
        Packet::Message { id, qos, .. } => {
            assert_eq!(qos, Qos::AtLeastOnce);
            assert_ne!(id, 0);
            id
        }
        other => panic!("expected Message, got {other:?}"),
    };

    remote.send_packet(Packet::messack(id));
    send_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn qos1_send_retransmits_with_dup_then_times_out() {
    let options = ClientOptions {
        message_timeout: Duration::from_millis(30),
        message_max_retry: 2,
        ..fast_options()
    };
    let (client, mut remote) = open_client(options, None).await;

    let sender = client.clone();
    let send_task = tokio::spawn(async move {
        sender
            .send(OutgoingMessage {
                qos: Qos::AtLeastOnce,
                kind: 2,
                payload: "lost".into(),
                ..Default::default()
            })
            .await
    });

    let first_id = match remote.next_packet().await {
        Packet::Message { id, dup, .. } => {
            assert!(!dup);
            id
        }
        other => panic!("expected Message, got {other:?}"),
    };

    // Two retransmissions, same ID, dup set.
    for _ in 0..2 {
        match remote.next_packet().await {
            Packet::Message { id, dup, .. } => {
                assert_eq!(id, first_id);
                assert!(dup);
            }
            other => panic!("expected retransmission, got {other:?}"),
        }
    }

    let err = send_task.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::MessageTimeout));
}

#[tokio::test]
async fn responses_correlate_out_of_order() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    let c = client.clone();
    let task_a = tokio::spawn(async move { c.request("a", "", Properties::new()).await });
    let c = client.clone();
    let task_b = tokio::spawn(async move { c.request("b", "", Properties::new()).await });

    let mut ids = std::collections::HashMap::new();
    for _ in 0..2 {
        match remote.next_packet().await {
            Packet::Request { id, method, .. } => {
                ids.insert(method, id);
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    // Answer in reverse order of arrival.
    remote.send_packet(Packet::response(ids["b"], StatusCode::Ok, "for b"));
    remote.send_packet(Packet::response(ids["a"], StatusCode::Ok, "for a"));

    let response_a = task_a.await.unwrap().unwrap();
    let response_b = task_b.await.unwrap().unwrap();
    assert_eq!(response_a.body.as_ref(), b"for a");
    assert_eq!(response_b.body.as_ref(), b"for b");
}

#[tokio::test]
async fn non_ok_response_fails_the_request() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    let c = client.clone();
    let task = tokio::spawn(async move { c.request("missing", "", Properties::new()).await });

    let id = match remote.next_packet().await {
        Packet::Request { id, .. } => id,
        other => panic!("expected Request, got {other:?}"),
    };
    remote.send_packet(Packet::response(id, StatusCode::NotFound, ""));

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ClientError::RequestFailed(StatusCode::NotFound)
    ));
}

#[tokio::test]
async fn request_times_out() {
    let options = ClientOptions {
        request_timeout: Duration::from_millis(30),
        ..fast_options()
    };
    let (client, mut remote) = open_client(options, None).await;

    let c = client.clone();
    let task = tokio::spawn(async move { c.request("slow", "", Properties::new()).await });

    let _request = remote.next_packet().await;
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::RequestTimeout));
}

#[tokio::test]
async fn missing_pong_raises_ping_timeout() {
    init_tracing();
    let (transport, mut remote) = MockTransport::pair();
    let options = ClientOptions {
        ping_interval: Duration::from_millis(20),
        ping_timeout: Duration::from_millis(10),
        ..Default::default()
    };
    let client = Client::with_transport("mock://cable", options, transport, None);

    let (reason_tx, mut reason_rx) = mpsc::unbounded_channel();
    client.auto_retry(RetryOptions {
        limit: None,
        backoff: Backoff::Const { delay: 0.0 },
        suppress: Some(Arc::new(move |reason: &RetryReason| {
            let _ = reason_tx.send(reason.clone());
            true
        })),
    });

    client.connect(Identity::default(), Properties::new());
    remote.expect_open().await;
    let _connect = remote.next_packet().await;
    remote.send_packet(Packet::Connack {
        code: ConnackCode::Accepted,
        props: Properties::new(),
    });

    // First heartbeat goes unanswered.
    assert!(matches!(remote.next_packet().await, Packet::Ping { .. }));

    let reason = reason_rx.recv().await.unwrap();
    assert_eq!(reason, RetryReason::PingTimeout);

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();
}

#[tokio::test]
async fn answered_pings_keep_the_session_open() {
    let options = ClientOptions {
        ping_interval: Duration::from_millis(25),
        ping_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let (client, mut remote) = open_client(options, None).await;

    for _ in 0..3 {
        assert!(matches!(remote.next_packet().await, Packet::Ping { .. }));
        remote.send_packet(Packet::pong());
    }
    assert!(client.is_ready());
}

struct Recorder {
    messages: mpsc::UnboundedSender<IncomingMessage>,
}

#[async_trait]
impl Handler for Recorder {
    async fn on_message(&self, message: IncomingMessage) {
        let _ = self.messages.send(message);
    }

    async fn on_request(&self, request: IncomingRequest) -> Reply {
        Reply::ok(format!(
            "echo:{}",
            String::from_utf8_lossy(&request.body)
        ))
    }
}

#[tokio::test]
async fn inbound_qos1_message_is_delivered_then_acked() {
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(Recorder {
        messages: message_tx,
    });
    let (_client, mut remote) = open_client(fast_options(), Some(handler)).await;

    remote.send_packet(Packet::Message {
        id: 321,
        qos: Qos::AtLeastOnce,
        dup: false,
        kind: 4,
        payload: "inbound".into(),
        props: Properties::new(),
    });

    let delivered = message_rx.recv().await.unwrap();
    assert_eq!(delivered.kind, 4);
    assert_eq!(delivered.payload.as_ref(), b"inbound");

    match remote.next_packet().await {
        Packet::Messack { id, .. } => assert_eq!(id, 321),
        other => panic!("expected Messack, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_request_is_answered_by_the_handler() {
    let (message_tx, _message_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(Recorder {
        messages: message_tx,
    });
    let (_client, mut remote) = open_client(fast_options(), Some(handler)).await;

    remote.send_packet(Packet::Request {
        id: 55,
        method: "greet".to_string(),
        body: "world".into(),
        props: Properties::new(),
    });

    match remote.next_packet().await {
        Packet::Response { id, code, body, .. } => {
            assert_eq!(id, 55);
            assert_eq!(code, StatusCode::Ok);
            assert_eq!(body.as_ref(), b"echo:world");
        }
        other => panic!("expected Response, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_request_without_handler_is_answered_unavailable() {
    let (_client, mut remote) = open_client(fast_options(), None).await;

    remote.send_packet(Packet::Request {
        id: 7,
        method: "anything".to_string(),
        body: "".into(),
        props: Properties::new(),
    });

    match remote.next_packet().await {
        Packet::Response { id, code, .. } => {
            assert_eq!(id, 7);
            assert_eq!(code, StatusCode::Unavailable);
        }
        other => panic!("expected Response, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_ping_is_answered_with_pong() {
    let (_client, mut remote) = open_client(fast_options(), None).await;

    remote.send_packet(Packet::ping());
    assert!(matches!(remote.next_packet().await, Packet::Pong { .. }));
}

#[tokio::test]
async fn server_close_fails_pending_operations() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    let c = client.clone();
    let task = tokio::spawn(async move { c.request("pending", "", Properties::new()).await });
    let _request = remote.next_packet().await;

    remote.send_packet(Packet::Close {
        code: CloseCode::GoingAway,
    });

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ClientError::ConnectionLost(RetryReason::ServerClosed(CloseCode::GoingAway))
    ));

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();
}

#[tokio::test]
async fn transport_error_triggers_reconnect() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    client.auto_retry(RetryOptions {
        limit: Some(3),
        backoff: Backoff::Const { delay: 0.0 },
        suppress: None,
    });

    remote.send_error("connection reset");

    // The engine dials again and re-handshakes.
    remote.expect_open().await;
    assert!(matches!(remote.next_packet().await, Packet::Connect { .. }));
    remote.send_packet(Packet::Connack {
        code: ConnackCode::Accepted,
        props: Properties::new(),
    });

    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Opened).await.unwrap();

    // The reopened session accepts traffic.
    client.send(OutgoingMessage::default()).await.unwrap();
    assert!(matches!(remote.next_packet().await, Packet::Message { .. }));
}

#[tokio::test]
async fn user_close_sends_close_frame_and_is_idempotent() {
    let (client, mut remote) = open_client(fast_options(), None).await;

    client.close(Some(CloseCode::Normal)).await;

    match remote.next_packet().await {
        Packet::Close { code } => assert_eq!(code, CloseCode::Normal),
        other => panic!("expected Close, got {other:?}"),
    }
    assert_eq!(client.status(), Status::Closed);
    assert_eq!(client.id(), None);

    // Closed is terminal for sends, and close stays idempotent.
    let err = client.send(OutgoingMessage::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::NotReady));
    client.close(None).await;
}

#[tokio::test]
async fn retry_limit_exhaustion_closes_the_session() {
    init_tracing();
    let (transport, remote) = MockTransport::pair();
    let client = Client::with_transport("mock://cable", fast_options(), transport, None);

    client.auto_retry(RetryOptions {
        limit: Some(1),
        backoff: Backoff::Const { delay: 0.0 },
        suppress: None,
    });
    remote.reject_opens(true);

    client.connect(Identity::default(), Properties::new());

    // One initial attempt plus one retry, then Closed.
    let mut status = client.subscribe_status();
    status.wait_for(|s| *s == Status::Closed).await.unwrap();
}
