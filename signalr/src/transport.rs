//! [`HubTransport`] implementation building [`SignalRConnection`]s.

use crate::connection::SignalRConnection;
use boxoffice_core::hub::{HubConnection, HubOptions, HubTransport};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default keep-alive ping interval.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Default time without any server message before the socket is considered lost.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Protocol timing and negotiation settings shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRConfig {
    /// Upper bound for WebSocket upgrade plus handshake
    pub handshake_timeout: Duration,
    /// How often a ping is sent to the server
    pub keep_alive_interval: Duration,
    /// Silence after which the connection is treated as closed
    pub server_timeout: Duration,
    /// Connect the WebSocket directly, without `POST /negotiate`
    pub skip_negotiation: bool,
}

impl Default for SignalRConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            skip_negotiation: false,
        }
    }
}

impl SignalRConfig {
    /// Set the handshake timeout.
    #[must_use]
    pub const fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the keep-alive interval.
    #[must_use]
    pub const fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the server timeout.
    #[must_use]
    pub const fn server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// Skip the negotiate request.
    #[must_use]
    pub const fn skip_negotiation(mut self, skip: bool) -> Self {
        self.skip_negotiation = skip;
        self
    }
}

/// Builds SignalR connections that share one HTTP client.
///
/// # Example
///
/// ```no_run
/// use boxoffice_core::{HubOptions, HubTransport};
/// use boxoffice_signalr::SignalRTransport;
///
/// # async fn example() -> Result<(), boxoffice_core::HubError> {
/// let transport = SignalRTransport::new();
/// let connection = transport.build(HubOptions::new("http://localhost:5000/hubs/newsHub"));
/// connection.on("ReceiveNews", std::sync::Arc::new(|args| println!("{args:?}")));
/// connection.start().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignalRTransport {
    http: Client,
    config: SignalRConfig,
}

impl SignalRTransport {
    /// Transport with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport with explicit settings.
    #[must_use]
    pub fn with_config(config: SignalRConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Settings applied to every connection.
    #[must_use]
    pub const fn config(&self) -> &SignalRConfig {
        &self.config
    }

    /// Build a concrete connection, for callers that need its state.
    #[must_use]
    pub fn connect(&self, options: HubOptions) -> SignalRConnection {
        SignalRConnection::new(options, self.config.clone(), self.http.clone())
    }
}

impl HubTransport for SignalRTransport {
    fn build(&self, options: HubOptions) -> Arc<dyn HubConnection> {
        Arc::new(self.connect(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SignalRConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(15));
        assert_eq!(config.server_timeout, Duration::from_secs(30));
        assert!(!config.skip_negotiation);
    }

    #[test]
    fn test_config_builder() {
        let config = SignalRConfig::default()
            .handshake_timeout(Duration::from_secs(1))
            .keep_alive_interval(Duration::from_millis(200))
            .skip_negotiation(true);

        let transport = SignalRTransport::with_config(config.clone());
        assert_eq!(transport.config(), &config);
    }

    #[test]
    fn test_build_keeps_url() {
        let transport = SignalRTransport::new();
        let connection = transport.build(HubOptions::new("http://localhost/hubs/commentHub"));
        assert_eq!(connection.url(), "http://localhost/hubs/commentHub");
    }
}
