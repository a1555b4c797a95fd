//! Application wiring: one category cache and one hub registry per process.

use crate::config::Config;
use boxoffice_core::{CategoryApi, Channel, ConnectOutcome, HubError, HubTransport, Registration};
use boxoffice_rest::CategoryClient;
use boxoffice_runtime::{CategoryError, CategoryMappingCache, HubConnectionRegistry};
use boxoffice_signalr::SignalRTransport;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while assembling the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// REST client could not be built
    #[error("Failed to build REST client: {0}")]
    RestClient(#[from] boxoffice_core::ApiError),

    /// Category cache failed to initialize
    #[error(transparent)]
    Categories(#[from] CategoryError),
}

/// Long-lived services shared by the whole client.
pub struct BoxOffice {
    config: Config,
    categories: Arc<CategoryMappingCache>,
    hubs: Arc<HubConnectionRegistry>,
}

impl BoxOffice {
    /// Assemble from explicit collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        api: Arc<dyn CategoryApi>,
        transport: Arc<dyn HubTransport>,
    ) -> Self {
        let categories = Arc::new(CategoryMappingCache::with_config(
            api,
            config.categories.cache(),
        ));
        let hubs = Arc::new(HubConnectionRegistry::new(transport));
        Self {
            config,
            categories,
            hubs,
        }
    }

    /// Assemble with the REST client and SignalR transport described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RestClient`] if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let mut client =
            CategoryClient::with_timeout(&config.api.url, config.api.request_timeout())?;
        if let Some(token) = &config.access_token {
            client = client.with_access_token(token.clone());
        }
        let transport = SignalRTransport::with_config(config.hub.signalr());

        Ok(Self::new(config, Arc::new(client), Arc::new(transport)))
    }

    /// Loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Category name → id cache.
    #[must_use]
    pub fn categories(&self) -> &Arc<CategoryMappingCache> {
        &self.categories
    }

    /// Channel → connection registry.
    #[must_use]
    pub fn hubs(&self) -> &Arc<HubConnectionRegistry> {
        &self.hubs
    }

    /// Fetch the category listing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Categories`] if the listing request failed.
    pub async fn load_categories(&self) -> Result<usize, AppError> {
        self.categories.initialize().await?;
        let count = self.categories.len();
        info!(categories = count, "Category cache ready");
        Ok(count)
    }

    /// Resolve category names to ids, logging names that did not match.
    #[must_use]
    pub fn resolve_categories(&self, names: &[String]) -> Vec<String> {
        let ids = self.categories.resolve_ids(names);
        if ids.len() < names.len() {
            let unknown: Vec<&str> = names
                .iter()
                .filter(|name| self.categories.resolve_id(name).is_none())
                .map(String::as_str)
                .collect();
            warn!(?unknown, "Some category names are not in the catalog");
        }
        ids
    }

    /// Connect `channel` to its hub, using the configured credential.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Connection`] if the handshake failed.
    pub async fn connect(&self, channel: Channel) -> Result<ConnectOutcome, HubError> {
        self.hubs
            .connect(
                channel,
                self.config.hub.channel_url(channel),
                self.config.access_token.clone(),
            )
            .await
    }

    /// Connect every configured channel and log the configured events on
    /// each. Returns the channels that ended up connected.
    pub async fn connect_configured(&self) -> Vec<Channel> {
        let mut connected = Vec::new();
        for &channel in &self.config.hub.channels {
            match self.connect(channel).await {
                Ok(_) => {
                    self.log_events(channel);
                    connected.push(channel);
                }
                Err(e) => warn!(%channel, error = %e, "Channel unavailable"),
            }
        }
        connected
    }

    /// Log every configured server event received on `channel`.
    pub fn log_events(&self, channel: Channel) {
        for event in self.config.hub.events_for(channel) {
            let name = event.clone();
            let registration = self.hubs.on(channel, &event, move |args| {
                info!(%channel, event = %name, ?args, "Server event");
            });
            if registration == Registration::Ignored {
                warn!(%channel, %event, "Listener not registered");
            }
        }
    }

    /// Disconnect every channel.
    pub async fn shutdown(&self) {
        let connected = self.hubs.connected_channels();
        self.hubs.disconnect_all().await;
        info!(channels = connected.len(), "Hub channels disconnected");
    }
}
