//! Realtime hub abstraction.
//!
//! A hub connection is a long-lived, server-push channel (SignalR in
//! production). The [`HubTransport`] builds connection objects; each
//! [`HubConnection`] is started once, receives named server events and is
//! stopped when the owning channel is torn down.
//!
//! # Lifecycle
//!
//! ```text
//!  build(options) ──> start() ──> on(event, handler)* ──> stop()
//!                       │
//!                       └─ unexpected close ─> automatic reconnect
//!                                              (handlers kept)
//! ```
//!
//! # Implementations
//!
//! - `SignalRTransport` in `boxoffice-signalr` - JSON hub protocol over WebSocket
//! - `MockHubTransport` in `boxoffice-testing` - in-memory, scriptable

use crate::channel::Channel;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Counter a transport increments on every automatic reconnect attempt.
pub const HUB_RECONNECTS_TOTAL: &str = "boxoffice_hub_reconnects_total";

/// Callback invoked with the arguments of a server event.
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Supplies the credential attached to every negotiate/connect request.
pub type AccessTokenFactory = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Boxed future returned by [`HubConnection`] operations.
pub type HubFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HubError>> + Send + 'a>>;

/// Errors from realtime hub operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Connecting a channel failed; the channel is left disconnected
    #[error("Connection failed for channel '{channel}': {reason}")]
    Connection {
        /// The channel that failed
        channel: Channel,
        /// The underlying cause
        reason: String,
    },

    /// Negotiate request failed or returned an unusable response
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Server rejected or did not answer the protocol handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Malformed or unexpected hub message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network or WebSocket failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation needs a started connection
    #[error("Connection is not started")]
    NotConnected,
}

/// Delays between automatic reconnect attempts after an unexpected close.
///
/// Attempt `n` (0-based) waits `delays[n]`; once the list is exhausted the
/// connection gives up and stays closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
}

impl ReconnectPolicy {
    /// Policy with an explicit delay schedule.
    #[must_use]
    pub const fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Delay before attempt `attempt`, or `None` when retries are exhausted.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }

    /// Maximum number of reconnect attempts.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }
}

impl Default for ReconnectPolicy {
    /// 0s, 2s, 10s, 30s.
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ])
    }
}

/// Options used to build a hub connection.
#[derive(Clone)]
pub struct HubOptions {
    /// Hub endpoint (http/https; converted to ws/wss by the transport)
    pub url: String,
    /// Credential provider, when the hub requires authentication
    pub access_token_factory: Option<AccessTokenFactory>,
    /// Automatic reconnect schedule; `None` disables reconnects
    pub reconnect: Option<ReconnectPolicy>,
}

impl HubOptions {
    /// Options for `url` with no credentials and no automatic reconnect.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token_factory: None,
            reconnect: None,
        }
    }

    /// Attach a fixed bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token_factory = Some(Arc::new(move || Some(token.clone())));
        self
    }

    /// Enable automatic reconnect with `policy`.
    #[must_use]
    pub fn with_automatic_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Current credential, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.access_token_factory.as_ref().and_then(|factory| factory())
    }
}

impl fmt::Debug for HubOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubOptions")
            .field("url", &self.url)
            .field("access_token_factory", &self.access_token_factory.is_some())
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// One realtime connection object.
///
/// # Dyn Compatibility
///
/// Operations return [`HubFuture`] so registries can hold
/// `Arc<dyn HubConnection>`.
pub trait HubConnection: Send + Sync {
    /// Endpoint this connection was built for.
    fn url(&self) -> &str;

    /// Negotiate and perform the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] if negotiation, the WebSocket upgrade or the
    /// handshake fails.
    fn start(&self) -> HubFuture<'_>;

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] if the close frame could not be sent.
    fn stop(&self) -> HubFuture<'_>;

    /// Whether a started connection ended without `stop()`: the server
    /// closed it without allowing a reconnect, or every reconnect attempt
    /// failed. A closed connection never recovers; build a new one.
    fn is_closed(&self) -> bool;

    /// Register `handler` for server event `event`. Multiple handlers per
    /// event are invoked in registration order.
    fn on(&self, event: &str, handler: EventHandler);

    /// Remove every handler registered for `event`.
    fn off(&self, event: &str);
}

/// Factory for hub connections.
pub trait HubTransport: Send + Sync {
    /// Build an unstarted connection.
    fn build(&self, options: HubOptions) -> Arc<dyn HubConnection>;
}

/// Result of a connect request on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection was built and its handshake completed
    Connected,
    /// A connection was already bound; the request's url/token were not applied
    AlreadyConnected,
}

/// Result of a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Forwarded to the bound connection
    Registered,
    /// No connection bound; nothing was registered
    Ignored,
}

/// Registry-side view of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection object
    Disconnected,
    /// Connection object stored, handshake in flight
    Connecting,
    /// Connection object stored, started and not closed
    Connected,
}
