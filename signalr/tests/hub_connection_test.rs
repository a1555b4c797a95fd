//! SignalR connection tests against an in-process WebSocket hub.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use boxoffice_core::hub::{HubConnection, HubError, HubOptions, ReconnectPolicy};
use boxoffice_signalr::protocol::{handshake_request, ping_message};
use boxoffice_signalr::{ConnectionState, SignalRConfig, SignalRConnection, SignalRTransport};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

async fn listen() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (tcp, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

async fn expect_handshake(ws: &mut ServerSocket) {
    let request = ws.next().await.unwrap().unwrap();
    assert_eq!(request.into_text().unwrap(), handshake_request());
}

async fn handshake(ws: &mut ServerSocket) {
    expect_handshake(ws).await;
    send(ws, "{}\u{1e}").await;
}

async fn send(ws: &mut ServerSocket, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// Drain until the client closes the socket.
async fn drain(ws: &mut ServerSocket) {
    while let Some(Ok(message)) = ws.next().await {
        if message.is_close() {
            break;
        }
    }
}

fn direct() -> SignalRTransport {
    SignalRTransport::with_config(SignalRConfig::default().skip_negotiation(true))
}

fn hub_url(addr: SocketAddr, hub: &str) -> String {
    format!("http://{addr}/hubs/{hub}")
}

fn recorder(connection: &SignalRConnection, event: &str) -> mpsc::UnboundedReceiver<Vec<Value>> {
    let (tx, rx) = mpsc::unbounded_channel();
    connection.on(
        event,
        Arc::new(move |args: &[Value]| {
            let _ = tx.send(args.to_vec());
        }),
    );
    rx
}

async fn wait_for_state(connection: &SignalRConnection, expected: ConnectionState) {
    tokio::time::timeout(WAIT, async {
        while connection.state() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("state not reached");
}

#[tokio::test]
async fn dispatches_invocations_case_insensitively() {
    boxoffice_testing::init_tracing();
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        send(
            &mut ws,
            "{\"type\":1,\"target\":\"ReceiveNotification\",\"arguments\":[{\"id\":\"n1\"}]}\u{1e}",
        )
        .await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "notificationHub")));
    let mut received = recorder(&connection, "receivenotification");

    connection.start().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);

    let args = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(args, vec![json!({"id": "n1"})]);

    connection.stop().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn records_after_handshake_in_same_frame_are_dispatched() {
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_handshake(&mut ws).await;
        send(
            &mut ws,
            "{}\u{1e}{\"type\":1,\"target\":\"Refresh\",\"arguments\":[]}\u{1e}",
        )
        .await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "eventHub")));
    let mut received = recorder(&connection, "Refresh");

    connection.start().await.unwrap();

    let args = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert!(args.is_empty());

    connection.stop().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn handshake_error_fails_start() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_handshake(&mut ws).await;
        send(
            &mut ws,
            "{\"error\":\"Requested protocol 'json' is not available.\"}\u{1e}",
        )
        .await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "ticketHub")));
    let err = connection.start().await.unwrap_err();

    assert_eq!(
        err,
        HubError::Handshake("Requested protocol 'json' is not available.".to_string())
    );
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn silent_server_times_out_handshake() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_handshake(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let transport = SignalRTransport::with_config(
        SignalRConfig::default()
            .skip_negotiation(true)
            .handshake_timeout(Duration::from_millis(200)),
    );
    let connection = transport.connect(HubOptions::new(hub_url(addr, "feedbackHub")));

    let err = connection.start().await.unwrap_err();
    assert!(matches!(err, HubError::Handshake(_)));
}

#[tokio::test]
async fn unreachable_hub_is_a_transport_error() {
    let (listener, addr) = listen().await;
    drop(listener);

    let connection = direct().connect(HubOptions::new(hub_url(addr, "identityHub")));
    let err = connection.start().await.unwrap_err();

    assert!(matches!(err, HubError::Transport(_)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn access_token_is_sent_as_query_parameter() {
    let (listener, addr) = listen().await;
    let seen = Arc::new(Mutex::new(None::<String>));
    let seen_by_server = Arc::clone(&seen);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let record_uri =
            move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                *seen_by_server.lock().unwrap() = Some(request.uri().to_string());
                Ok(response)
            };
        let mut ws = tokio_tungstenite::accept_hdr_async(tcp, record_uri).await.unwrap();
        handshake(&mut ws).await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(
        HubOptions::new(hub_url(addr, "newsHub")).with_access_token("jwt-123"),
    );
    connection.start().await.unwrap();

    let uri = seen.lock().unwrap().clone().unwrap();
    assert_eq!(uri, "/hubs/newsHub?access_token=jwt-123");

    connection.stop().await.unwrap();
}

#[tokio::test]
async fn reconnects_after_unexpected_close_and_keeps_handlers() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut first = accept(&listener).await;
        handshake(&mut first).await;
        send(
            &mut first,
            "{\"type\":7,\"error\":\"Server restarting\",\"allowReconnect\":true}\u{1e}",
        )
        .await;
        drop(first);

        let mut second = accept(&listener).await;
        handshake(&mut second).await;
        send(
            &mut second,
            "{\"type\":1,\"target\":\"ReceiveNews\",\"arguments\":[\"n2\"]}\u{1e}",
        )
        .await;
        drain(&mut second).await;
    });

    let connection = direct().connect(
        HubOptions::new(hub_url(addr, "newsHub"))
            .with_automatic_reconnect(ReconnectPolicy::new(vec![Duration::ZERO])),
    );
    let mut received = recorder(&connection, "ReceiveNews");

    connection.start().await.unwrap();

    let args = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(args, vec![json!("n2")]);
    assert_eq!(connection.state(), ConnectionState::Connected);

    connection.stop().await.unwrap();
}

#[tokio::test]
async fn close_without_reconnect_permission_disconnects() {
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        send(&mut ws, "{\"type\":7,\"error\":\"Kicked\"}\u{1e}").await;
        drain(&mut ws).await;

        // No second connection may arrive.
        tokio::time::timeout(Duration::from_millis(500), listener.accept())
            .await
            .is_err()
    });

    let connection = direct().connect(
        HubOptions::new(hub_url(addr, "commentHub"))
            .with_automatic_reconnect(ReconnectPolicy::new(vec![Duration::ZERO])),
    );
    connection.start().await.unwrap();

    wait_for_state(&connection, ConnectionState::Disconnected).await;
    assert!(connection.is_closed());
    assert!(tokio::time::timeout(WAIT, server).await.unwrap().unwrap());
}

#[tokio::test]
async fn gives_up_when_reconnect_schedule_is_exhausted() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        drop(listener);
        drop(ws);
    });

    let connection = direct().connect(
        HubOptions::new(hub_url(addr, "eventHub")).with_automatic_reconnect(ReconnectPolicy::new(
            vec![Duration::from_millis(10), Duration::from_millis(10)],
        )),
    );
    connection.start().await.unwrap();

    wait_for_state(&connection, ConnectionState::Disconnected).await;
    assert!(connection.is_closed());
    connection.stop().await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "notificationHub")));
    connection.stop().await.unwrap();

    connection.start().await.unwrap();
    connection.stop().await.unwrap();
    connection.stop().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!connection.is_closed());
}

#[tokio::test]
async fn off_removes_handlers() {
    let (listener, addr) = listen().await;
    let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        go_rx.await.unwrap();
        send(
            &mut ws,
            concat!(
                "{\"type\":1,\"target\":\"ReceiveTicket\",\"arguments\":[1]}\u{1e}",
                "{\"type\":1,\"target\":\"Marker\",\"arguments\":[]}\u{1e}",
            ),
        )
        .await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "ticketHub")));
    let mut tickets = recorder(&connection, "ReceiveTicket");
    let mut marker = recorder(&connection, "Marker");

    connection.start().await.unwrap();
    connection.off("receiveticket");
    go_tx.send(()).unwrap();

    tokio::time::timeout(WAIT, marker.recv()).await.unwrap().unwrap();
    assert!(tickets.try_recv().is_err());

    connection.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_record_does_not_drop_its_neighbours() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;
        send(
            &mut ws,
            concat!(
                "{\"type\":1,\"target\":\"A\",\"arguments\":[1]}\u{1e}",
                "{\"type\":1,\"target\":\"B\",\"arguments\":null}\u{1e}",
                "{\"type\":1,\"target\":\"A\",\"arguments\":[2]}\u{1e}",
            ),
        )
        .await;
        drain(&mut ws).await;
    });

    let connection = direct().connect(HubOptions::new(hub_url(addr, "commentHub")));
    let mut received = recorder(&connection, "A");

    connection.start().await.unwrap();

    let first = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(first, vec![json!(1)]);
    assert_eq!(second, vec![json!(2)]);
    assert_eq!(connection.state(), ConnectionState::Connected);

    connection.stop().await.unwrap();
}

#[tokio::test]
async fn stop_aborts_pending_handshake() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_handshake(&mut ws).await;
        tokio::time::sleep(WAIT).await;
    });

    let connection = Arc::new(direct().connect(HubOptions::new(hub_url(addr, "identityHub"))));
    let starting = Arc::clone(&connection);
    let start = tokio::spawn(async move { starting.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connection.state(), ConnectionState::Connecting);

    tokio::time::timeout(WAIT, connection.stop()).await.unwrap().unwrap();

    let err = tokio::time::timeout(WAIT, start).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, HubError::Transport(_)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!connection.is_closed());
}

#[tokio::test]
async fn sends_keep_alive_pings() {
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        handshake(&mut ws).await;

        let mut pings = Vec::new();
        for _ in 0..2 {
            let message = tokio::time::timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
            pings.push(message.into_text().unwrap());
        }
        drain(&mut ws).await;
        pings
    });

    let transport = SignalRTransport::with_config(
        SignalRConfig::default()
            .skip_negotiation(true)
            .keep_alive_interval(Duration::from_millis(100)),
    );
    let connection = transport.connect(HubOptions::new(hub_url(addr, "newsHub")));
    connection.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    connection.stop().await.unwrap();

    let pings = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(pings, vec![ping_message(), ping_message()]);
}

#[tokio::test]
async fn silent_server_triggers_reconnect() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let mut first = accept(&listener).await;
        handshake(&mut first).await;

        // Keep the first socket open but say nothing on it.
        let mut second = accept(&listener).await;
        handshake(&mut second).await;
        send(
            &mut second,
            "{\"type\":1,\"target\":\"ReceiveEvent\",\"arguments\":[\"e1\"]}\u{1e}",
        )
        .await;
        drain(&mut second).await;
        drop(first);
    });

    let transport = SignalRTransport::with_config(
        SignalRConfig::default()
            .skip_negotiation(true)
            .keep_alive_interval(Duration::from_secs(10))
            .server_timeout(Duration::from_millis(200)),
    );
    let connection = transport.connect(
        HubOptions::new(hub_url(addr, "eventHub"))
            .with_automatic_reconnect(ReconnectPolicy::new(vec![Duration::ZERO])),
    );
    let mut received = recorder(&connection, "ReceiveEvent");

    connection.start().await.unwrap();

    let args = tokio::time::timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(args, vec![json!("e1")]);
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert!(!connection.is_closed());

    connection.stop().await.unwrap();
}
