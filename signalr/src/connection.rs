//! SignalR hub connection over WebSocket.
//!
//! `start()` negotiates, opens the socket and completes the handshake, then
//! hands the socket to a background worker. The worker dispatches server
//! invocations to the registered handlers, sends keep-alive pings and, when
//! the socket closes unexpectedly, reconnects according to the
//! [`ReconnectPolicy`](boxoffice_core::ReconnectPolicy) in the options.
//! Handlers live on the connection, so they survive reconnects.

use crate::negotiate::{negotiate, websocket_url};
use crate::protocol::{self, HubMessage};
use crate::transport::SignalRConfig;
use boxoffice_core::hub::{
    EventHandler, HUB_RECONNECTS_TOTAL, HubConnection, HubError, HubFuture, HubOptions,
};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type HandlerMap = RwLock<HashMap<String, Vec<EventHandler>>>;

/// Lifecycle of a [`SignalRConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, stopped, or gave up reconnecting
    Disconnected,
    /// `start()` in progress
    Connecting,
    /// Handshake complete, worker running
    Connected,
    /// Socket lost, automatic reconnect in progress
    Reconnecting,
}

/// A SignalR hub connection using the JSON protocol.
pub struct SignalRConnection {
    options: HubOptions,
    config: SignalRConfig,
    http: Client,
    handlers: Arc<HandlerMap>,
    state: Arc<Mutex<ConnectionState>>,
    closed: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SignalRConnection {
    /// Unstarted connection for `options`.
    #[must_use]
    pub fn new(options: HubOptions, config: SignalRConfig, http: Client) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            options,
            config,
            http,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            closed: Arc::new(AtomicBool::new(false)),
            stop,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        set_state(&self.state, state);
    }
}

impl HubConnection for SignalRConnection {
    fn url(&self) -> &str {
        &self.options.url
    }

    fn start(&self) -> HubFuture<'_> {
        Box::pin(async move {
            let mut worker = self.worker.lock().await;
            if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
                return Ok(());
            }

            self.stop.send_replace(false);
            self.closed.store(false, Ordering::SeqCst);
            self.set_state(ConnectionState::Connecting);

            let opened = tokio::select! {
                () = stopped(self.stop.subscribe()) => Err(HubError::Transport(
                    "connection was stopped during the handshake".to_string(),
                )),
                result = open(&self.http, &self.options, &self.config) => result,
            };
            let (socket, pending) = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(e);
                }
            };

            tracing::info!(url = %self.options.url, "Hub connection started");
            self.set_state(ConnectionState::Connected);

            let task = Worker {
                options: self.options.clone(),
                config: self.config.clone(),
                http: self.http.clone(),
                handlers: Arc::clone(&self.handlers),
                state: Arc::clone(&self.state),
                closed: Arc::clone(&self.closed),
                stop: self.stop.subscribe(),
            };
            *worker = Some(tokio::spawn(task.run(socket, pending)));
            Ok(())
        })
    }

    fn stop(&self) -> HubFuture<'_> {
        Box::pin(async move {
            // Signal first so an in-flight start() gives up its handshake.
            self.stop.send_replace(true);
            let handle = self.worker.lock().await.take();

            if let Some(handle) = handle {
                self.stop.send_replace(true);
                handle
                    .await
                    .map_err(|e| HubError::Transport(format!("hub worker failed: {e}")))?;
                tracing::info!(url = %self.options.url, "Hub connection stopped");
            }

            self.set_state(ConnectionState::Disconnected);
            Ok(())
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_lowercase())
            .or_default()
            .push(handler);
    }

    fn off(&self, event: &str) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event.to_lowercase());
    }
}

impl Drop for SignalRConnection {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

fn set_state(state: &Mutex<ConnectionState>, next: ConnectionState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Resolves once stop is requested or the connection is dropped.
async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Negotiate, upgrade and handshake.
///
/// Returns the socket plus any records the server sent in the same frame as
/// the handshake response.
async fn open(
    http: &Client,
    options: &HubOptions,
    config: &SignalRConfig,
) -> Result<(Socket, String), HubError> {
    let token = options.access_token();
    let (url, connection_token, token) = if config.skip_negotiation {
        (options.url.clone(), None, token)
    } else {
        let negotiated = negotiate(http, &options.url, token).await?;
        (negotiated.url, negotiated.connection_token, negotiated.access_token)
    };

    let ws_url = websocket_url(&url, connection_token.as_deref(), token.as_deref())?;
    tracing::debug!(url = %url, "Opening hub WebSocket");

    tokio::time::timeout(config.handshake_timeout, async {
        let (mut socket, _) = tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .map_err(|e| HubError::Transport(format!("WebSocket connect failed: {e}")))?;

        socket
            .send(Message::Text(protocol::handshake_request()))
            .await
            .map_err(|e| HubError::Transport(format!("sending handshake failed: {e}")))?;

        let pending = read_handshake(&mut socket).await?;
        Ok::<_, HubError>((socket, pending))
    })
    .await
    .map_err(|_| {
        HubError::Handshake(format!(
            "server did not complete the handshake within {:?}",
            config.handshake_timeout
        ))
    })?
}

async fn read_handshake(socket: &mut Socket) -> Result<String, HubError> {
    while let Some(frame) = socket.next().await {
        match frame.map_err(|e| HubError::Transport(e.to_string()))? {
            Message::Text(text) => {
                let Some((response, rest)) = text.split_once(protocol::RECORD_SEPARATOR) else {
                    return Err(HubError::Handshake(
                        "handshake response is not terminated".to_string(),
                    ));
                };
                protocol::parse_handshake_response(response)?;
                return Ok(rest.to_string());
            }
            Message::Binary(_) => {
                return Err(HubError::Protocol(
                    "binary frame during JSON handshake".to_string(),
                ));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(HubError::Handshake(
        "connection closed during the handshake".to_string(),
    ))
}

/// Why the socket loop ended.
enum Exit {
    Stopped,
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

struct Worker {
    options: HubOptions,
    config: SignalRConfig,
    http: Client,
    handlers: Arc<HandlerMap>,
    state: Arc<Mutex<ConnectionState>>,
    closed: Arc<AtomicBool>,
    stop: watch::Receiver<bool>,
}

impl Worker {
    async fn run(self, mut socket: Socket, mut pending: String) {
        loop {
            let exit = match self.dispatch_frame(&pending) {
                Some(exit) => exit,
                None => self.pump(&mut socket).await,
            };

            match exit {
                Exit::Stopped => {
                    if let Err(e) = socket.close(None).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    set_state(&self.state, ConnectionState::Disconnected);
                    return;
                }
                Exit::Closed {
                    error,
                    allow_reconnect,
                } => {
                    tracing::warn!(
                        url = %self.options.url,
                        error = error.as_deref().unwrap_or("none"),
                        "Hub connection closed"
                    );
                    if !allow_reconnect {
                        break;
                    }
                    match self.reconnect().await {
                        Some((next, next_pending)) => {
                            socket = next;
                            pending = next_pending;
                        }
                        None => break,
                    }
                }
            }
        }

        // Ended without stop(): the connection will not recover on its own.
        if !*self.stop.borrow() {
            self.closed.store(true, Ordering::SeqCst);
        }
        set_state(&self.state, ConnectionState::Disconnected);
    }

    /// Read frames until the socket closes or stop is requested.
    async fn pump(&self, socket: &mut Socket) -> Exit {
        let stop = stopped(self.stop.clone());
        tokio::pin!(stop);

        let server_timeout = tokio::time::sleep(self.config.server_timeout);
        tokio::pin!(server_timeout);

        // interval_at panics on a zero period.
        let period = self.config.keep_alive_interval.max(Duration::from_millis(1));
        let mut keep_alive = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                () = &mut stop => return Exit::Stopped,
                () = &mut server_timeout => {
                    return Exit::Closed {
                        error: Some(format!(
                            "no message from the server within {:?}",
                            self.config.server_timeout
                        )),
                        allow_reconnect: true,
                    };
                }
                _ = keep_alive.tick() => {
                    if let Err(e) = socket.send(Message::Text(protocol::ping_message())).await {
                        return Exit::Closed { error: Some(e.to_string()), allow_reconnect: true };
                    }
                }
                frame = socket.next() => {
                    server_timeout
                        .as_mut()
                        .reset(Instant::now() + self.config.server_timeout);

                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(exit) = self.dispatch_frame(&text) {
                                return exit;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Exit::Closed { error: None, allow_reconnect: true };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Exit::Closed {
                                error: Some(e.to_string()),
                                allow_reconnect: true,
                            };
                        }
                    }
                }
            }
        }
    }

    /// Handle every record of a text frame. Returns an exit on a close message.
    fn dispatch_frame(&self, frame: &str) -> Option<Exit> {
        for record in protocol::records(frame) {
            let message = match protocol::parse_message(record) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed hub record");
                    continue;
                }
            };

            match message {
                HubMessage::Invocation { target, arguments } => self.invoke(&target, &arguments),
                HubMessage::Close {
                    error,
                    allow_reconnect,
                } => {
                    return Some(Exit::Closed {
                        error,
                        allow_reconnect,
                    });
                }
                HubMessage::Ping => {}
                HubMessage::Completion { invocation_id, error } => {
                    tracing::debug!(?invocation_id, ?error, "Ignoring completion");
                }
                HubMessage::StreamItem { invocation_id } => {
                    tracing::debug!(?invocation_id, "Ignoring stream item");
                }
                HubMessage::Other(kind) => {
                    tracing::debug!(kind, "Ignoring unsupported hub message");
                }
            }
        }
        None
    }

    fn invoke(&self, target: &str, arguments: &[serde_json::Value]) {
        // Snapshot so handlers may call on()/off() without deadlocking.
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target.to_lowercase())
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::debug!(event = target, "No client method registered for server event");
            return;
        }

        for handler in &handlers {
            handler(arguments);
        }
    }

    async fn reconnect(&self) -> Option<(Socket, String)> {
        let policy = self.options.reconnect.as_ref()?;
        set_state(&self.state, ConnectionState::Reconnecting);

        for attempt in 0..policy.max_attempts() {
            let delay = policy.delay_for_attempt(attempt)?;
            tracing::info!(
                url = %self.options.url,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting hub connection"
            );

            tokio::select! {
                () = stopped(self.stop.clone()) => return None,
                () = tokio::time::sleep(delay) => {}
            }

            metrics::counter!(HUB_RECONNECTS_TOTAL).increment(1);
            let result = tokio::select! {
                () = stopped(self.stop.clone()) => return None,
                result = open(&self.http, &self.options, &self.config) => result,
            };

            match result {
                Ok(opened) => {
                    tracing::info!(url = %self.options.url, "Hub connection reconnected");
                    set_state(&self.state, ConnectionState::Connected);
                    return Some(opened);
                }
                Err(e) => {
                    tracing::warn!(url = %self.options.url, error = %e, "Reconnect attempt failed");
                }
            }
        }

        tracing::warn!(
            url = %self.options.url,
            attempts = policy.max_attempts(),
            "Giving up reconnecting hub connection"
        );
        None
    }
}
