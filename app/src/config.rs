//! Configuration management for the Box Office client.
//!
//! Loads configuration from environment variables with sensible defaults.

use boxoffice_core::Channel;
use boxoffice_runtime::CategoryCacheConfig;
use boxoffice_signalr::SignalRConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Catalog REST API configuration
    pub api: ApiConfig,
    /// Realtime hub configuration
    pub hub: HubConfig,
    /// Category cache configuration
    pub categories: CategoryConfig,
    /// Bearer token for both the REST API and the hubs
    pub access_token: Option<String>,
}

/// Catalog REST API configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:5000/api`
    pub url: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Realtime hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Base URL the per-channel hubs hang off, e.g. `http://localhost:5000/hubs`
    pub url: String,
    /// Handshake timeout in seconds
    pub handshake_timeout_secs: u64,
    /// Keep-alive ping interval in seconds
    pub keep_alive_secs: u64,
    /// Connect WebSockets directly without negotiating
    pub skip_negotiation: bool,
    /// Channels the binary connects on startup
    pub channels: Vec<Channel>,
    /// Server events logged on every connected channel (empty: one
    /// `Receive{Channel}` event per channel)
    pub events: Vec<String>,
}

/// Category cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Page size of the listing request
    pub page_size: u32,
    /// Maximum number of pages fetched by `initialize`
    pub max_pages: u32,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api: ApiConfig {
                url: lookup("BOXOFFICE_API_URL")
                    .unwrap_or_else(|| "http://localhost:5000/api".to_string()),
                request_timeout_secs: parsed(&lookup, "BOXOFFICE_REQUEST_TIMEOUT_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or(30),
            },
            hub: HubConfig {
                url: lookup("BOXOFFICE_HUB_URL")
                    .unwrap_or_else(|| "http://localhost:5000/hubs".to_string()),
                handshake_timeout_secs: parsed(&lookup, "BOXOFFICE_HANDSHAKE_TIMEOUT_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or(15),
                keep_alive_secs: parsed(&lookup, "BOXOFFICE_KEEP_ALIVE_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or(15),
                skip_negotiation: lookup("BOXOFFICE_SKIP_NEGOTIATION")
                    .is_some_and(|s| matches!(s.trim(), "1" | "true" | "TRUE" | "yes")),
                channels: lookup("BOXOFFICE_CHANNELS")
                    .map_or_else(|| vec![Channel::Notification], |s| parse_channels(&s)),
                events: lookup("BOXOFFICE_EVENTS")
                    .map(|s| split_list(&s).map(str::to_string).collect())
                    .unwrap_or_default(),
            },
            categories: CategoryConfig {
                page_size: parsed(&lookup, "BOXOFFICE_CATEGORY_PAGE_SIZE")
                    .filter(|size| *size > 0)
                    .unwrap_or(100),
                max_pages: parsed(&lookup, "BOXOFFICE_CATEGORY_MAX_PAGES")
                    .filter(|pages| *pages > 0)
                    .unwrap_or(1),
            },
            access_token: lookup("BOXOFFICE_ACCESS_TOKEN").filter(|token| !token.is_empty()),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl HubConfig {
    /// Endpoint of `channel`'s hub.
    #[must_use]
    pub fn channel_url(&self, channel: Channel) -> String {
        channel.hub_url(&self.url)
    }

    /// Events to log on `channel`.
    #[must_use]
    pub fn events_for(&self, channel: Channel) -> Vec<String> {
        if self.events.is_empty() {
            vec![default_event(channel)]
        } else {
            self.events.clone()
        }
    }

    /// Transport settings for the SignalR connections.
    #[must_use]
    pub const fn signalr(&self) -> SignalRConfig {
        SignalRConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            keep_alive_interval: Duration::from_secs(self.keep_alive_secs),
            server_timeout: Duration::from_secs(self.keep_alive_secs.saturating_mul(2)),
            skip_negotiation: self.skip_negotiation,
        }
    }
}

impl CategoryConfig {
    /// Cache settings.
    #[must_use]
    pub const fn cache(&self) -> CategoryCacheConfig {
        CategoryCacheConfig {
            page_size: self.page_size,
            max_pages: self.max_pages,
        }
    }
}

/// `Receive{Channel}`, e.g. `ReceiveNotification`.
fn default_event(channel: Channel) -> String {
    let name = channel.as_str();
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        format!("Receive{}{}", first.to_ascii_uppercase(), chars.as_str())
    })
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_channels(value: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    for name in split_list(value) {
        match Channel::from_str(name) {
            Ok(channel) if !channels.contains(&channel) => channels.push(channel),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping unknown channel in BOXOFFICE_CHANNELS"),
        }
    }
    channels
}
