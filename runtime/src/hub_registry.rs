//! Registry of realtime hub connections, one per [`Channel`].
//!
//! The registry owns zero or one connection object per channel and routes
//! `connect` / `on` / `disconnect` to it by channel.
//!
//! # Channel State Machine
//!
//! ```text
//!                  connect            handshake ok
//! Disconnected ──────────────> Connecting ──────────────> Connected
//!      ^                           │                          │
//!      │      handshake failed     │                          │
//!      ├───────────────────────────┘                          │
//!      │                     disconnect                       │
//!      └──────────────────────────────────────────────────────┘
//!
//! Connecting/Connected ── connect ──> unchanged (AlreadyConnected)
//! Connected ── transport gives up ──> Disconnected
//! ```
//!
//! A connection whose transport gave up reconnecting is reported as
//! disconnected. Its object stays bound until the next `connect`, which
//! stops it and builds a fresh one.
//!
//! # Listener Lifetime
//!
//! Handlers attach to the connection object bound at registration time.
//! Disconnecting drops that object together with its handlers; a later
//! `connect` starts from an empty handler set. Transport-level automatic
//! reconnects keep the object, so handlers survive those.

use crate::metrics::{HUB_CONNECTED_CHANNELS, HUB_CONNECTS_TOTAL};
use boxoffice_core::channel::Channel;
use boxoffice_core::hub::{
    ChannelState, ConnectOutcome, HubConnection, HubError, HubOptions, HubTransport,
    ReconnectPolicy, Registration,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Connection object bound to a channel.
struct Binding {
    id: u64,
    connection: Arc<dyn HubConnection>,
    started: bool,
}

impl Binding {
    /// Handshake complete and the transport has not given up.
    fn is_connected(&self) -> bool {
        self.started && !self.connection.is_closed()
    }

    /// Still usable: connecting, or connected and not closed.
    fn is_live(&self) -> bool {
        !self.started || !self.connection.is_closed()
    }
}

/// Owns the live hub connection of every channel.
///
/// # Concurrency
///
/// `connect` calls for the same channel are serialized by a per-channel gate,
/// so racing callers never build two objects for one channel. `disconnect`
/// does not wait on the gate: it can abort a handshake that is still in
/// flight, in which case the pending `connect` fails.
pub struct HubConnectionRegistry {
    transport: Arc<dyn HubTransport>,
    reconnect: Option<ReconnectPolicy>,
    bindings: RwLock<HashMap<Channel, Binding>>,
    gates: [Mutex<()>; Channel::COUNT],
    next_id: AtomicU64,
}

impl HubConnectionRegistry {
    /// Create a registry with automatic reconnect enabled
    /// ([`ReconnectPolicy::default`]).
    #[must_use]
    pub fn new(transport: Arc<dyn HubTransport>) -> Self {
        Self::with_reconnect(transport, Some(ReconnectPolicy::default()))
    }

    /// Create a registry with an explicit reconnect policy (`None` disables
    /// automatic reconnect).
    #[must_use]
    pub fn with_reconnect(
        transport: Arc<dyn HubTransport>,
        reconnect: Option<ReconnectPolicy>,
    ) -> Self {
        Self {
            transport,
            reconnect,
            bindings: RwLock::new(HashMap::new()),
            gates: std::array::from_fn(|_| Mutex::new(())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Bind a new connection for `channel` and complete its handshake.
    ///
    /// If the channel already has a live connection object, returns
    /// [`ConnectOutcome::AlreadyConnected`] and leaves it untouched: a
    /// different `url` or `token` is **not** applied. Disconnect first to
    /// rebind. A bound connection that closed for good (see
    /// [`HubConnection::is_closed`]) is stopped and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Connection`] if the handshake fails or the
    /// channel is disconnected while the handshake is in flight. The channel
    /// is left [`ChannelState::Disconnected`], so a retry starts clean.
    pub async fn connect(
        &self,
        channel: Channel,
        url: impl Into<String>,
        token: Option<String>,
    ) -> Result<ConnectOutcome, HubError> {
        let url = url.into();
        let _gate = self.gates[channel as usize].lock().await;

        self.release_closed(channel).await;
        if let Some(existing) = self.connection(channel) {
            if existing.url() == url {
                debug!(%channel, "Hub channel already connected");
            } else {
                warn!(
                    %channel,
                    bound_url = existing.url(),
                    requested_url = %url,
                    "Connect ignored: channel is bound to a different url"
                );
            }
            metrics::counter!(
                HUB_CONNECTS_TOTAL,
                "channel" => channel.as_str(),
                "outcome" => "already_connected"
            )
            .increment(1);
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let mut options = HubOptions::new(url.clone());
        if let Some(token) = token {
            options = options.with_access_token(token);
        }
        if let Some(policy) = &self.reconnect {
            options = options.with_automatic_reconnect(policy.clone());
        }

        let connection = self.transport.build(options);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write_bindings().insert(
            channel,
            Binding {
                id,
                connection: Arc::clone(&connection),
                started: false,
            },
        );

        info!(%channel, %url, "Connecting hub channel");

        let result = connection.start().await;
        let outcome = {
            let mut bindings = self.write_bindings();
            let still_bound = bindings.get(&channel).is_some_and(|b| b.id == id);
            match result {
                Ok(()) if still_bound => {
                    if let Some(binding) = bindings.get_mut(&channel) {
                        binding.started = true;
                    }
                    Ok(())
                }
                Ok(()) => Err("channel was disconnected during the handshake".to_string()),
                Err(e) => {
                    if still_bound {
                        bindings.remove(&channel);
                    }
                    Err(e.to_string())
                }
            }
        };
        self.update_connected_gauge();

        match outcome {
            Ok(()) => {
                metrics::counter!(
                    HUB_CONNECTS_TOTAL,
                    "channel" => channel.as_str(),
                    "outcome" => "connected"
                )
                .increment(1);
                info!(%channel, "Hub channel connected");
                Ok(ConnectOutcome::Connected)
            }
            Err(reason) => {
                metrics::counter!(
                    HUB_CONNECTS_TOTAL,
                    "channel" => channel.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                warn!(%channel, %reason, "Hub channel connect failed");
                if let Err(e) = connection.stop().await {
                    debug!(%channel, error = %e, "Stopping failed connection reported an error");
                }
                Err(HubError::Connection { channel, reason })
            }
        }
    }

    /// Register `handler` for `event` on the channel's current connection.
    ///
    /// Returns [`Registration::Ignored`] (and drops the handler) when the
    /// channel has no connection object. Registrations are not queued for a
    /// later `connect`.
    pub fn on<F>(&self, channel: Channel, event: &str, handler: F) -> Registration
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let Some(connection) = self.connection(channel) else {
            warn!(%channel, event, "Listener ignored: channel is not connected");
            return Registration::Ignored;
        };

        connection.on(event, Arc::new(handler));
        debug!(%channel, event, "Listener registered");
        Registration::Registered
    }

    /// Remove every handler for `event` on the channel's current connection.
    pub fn off(&self, channel: Channel, event: &str) -> Registration {
        let Some(connection) = self.connection(channel) else {
            debug!(%channel, event, "Listener removal ignored: channel is not connected");
            return Registration::Ignored;
        };

        connection.off(event);
        Registration::Registered
    }

    /// Stop and drop the channel's connection. No-op when disconnected.
    ///
    /// Errors raised while stopping are logged, not returned.
    pub async fn disconnect(&self, channel: Channel) {
        let binding = self.write_bindings().remove(&channel);
        let Some(binding) = binding else {
            debug!(%channel, "Disconnect ignored: channel is not connected");
            return;
        };
        self.update_connected_gauge();

        if let Err(e) = binding.connection.stop().await {
            warn!(%channel, error = %e, "Error while stopping hub connection");
        }
        info!(%channel, "Hub channel disconnected");
    }

    /// Disconnect every channel.
    pub async fn disconnect_all(&self) {
        for channel in Channel::ALL {
            self.disconnect(channel).await;
        }
    }

    /// Current state of `channel`.
    #[must_use]
    pub fn state(&self, channel: Channel) -> ChannelState {
        match self.read_bindings().get(&channel) {
            Some(binding) if binding.is_connected() => ChannelState::Connected,
            Some(binding) if binding.is_live() => ChannelState::Connecting,
            _ => ChannelState::Disconnected,
        }
    }

    /// Whether `channel` holds a started connection.
    #[must_use]
    pub fn is_connected(&self, channel: Channel) -> bool {
        self.state(channel) == ChannelState::Connected
    }

    /// Channels holding a started connection, in declaration order.
    #[must_use]
    pub fn connected_channels(&self) -> Vec<Channel> {
        let bindings = self.read_bindings();
        Channel::ALL
            .into_iter()
            .filter(|channel| bindings.get(channel).is_some_and(Binding::is_connected))
            .collect()
    }

    /// The live connection object bound to `channel`, if any.
    #[must_use]
    pub fn connection(&self, channel: Channel) -> Option<Arc<dyn HubConnection>> {
        self.read_bindings()
            .get(&channel)
            .filter(|binding| binding.is_live())
            .map(|binding| Arc::clone(&binding.connection))
    }

    /// Drop a binding whose transport gave up. Caller holds the channel gate.
    async fn release_closed(&self, channel: Channel) {
        let closed = {
            let mut bindings = self.write_bindings();
            match bindings.get(&channel) {
                Some(binding) if !binding.is_live() => bindings.remove(&channel),
                _ => None,
            }
        };
        let Some(binding) = closed else {
            return;
        };
        self.update_connected_gauge();

        info!(%channel, "Releasing closed hub connection");
        if let Err(e) = binding.connection.stop().await {
            debug!(%channel, error = %e, "Stopping closed connection reported an error");
        }
    }

    #[allow(clippy::cast_precision_loss)] // at most seven channels
    fn update_connected_gauge(&self) {
        let connected = self
            .read_bindings()
            .values()
            .filter(|b| b.is_connected())
            .count();
        metrics::gauge!(HUB_CONNECTED_CHANNELS).set(connected as f64);
    }

    fn read_bindings(&self) -> RwLockReadGuard<'_, HashMap<Channel, Binding>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_bindings(&self) -> RwLockWriteGuard<'_, HashMap<Channel, Binding>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }
}
