//! # Box Office Runtime
//!
//! Stateful client units shared by the storefront, dashboard and admin
//! console.
//!
//! ## Core Components
//!
//! - **[`CategoryMappingCache`]**: fetches the category listing once and
//!   resolves category names to ids synchronously
//! - **[`HubConnectionRegistry`]**: owns at most one realtime connection per
//!   [`Channel`](boxoffice_core::Channel) and routes listeners to it
//!
//! Both are plain owned values: construct them once per application or
//! session and pass them (or an `Arc`) to whatever needs them.
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_runtime::{CategoryMappingCache, HubConnectionRegistry};
//! use boxoffice_core::Channel;
//!
//! let categories = CategoryMappingCache::new(api);
//! categories.initialize().await?;
//! let ids = categories.resolve_ids(&form.category_names);
//!
//! let hubs = HubConnectionRegistry::new(transport);
//! hubs.connect(Channel::Notification, url, Some(token)).await?;
//! hubs.on(Channel::Notification, "ReceiveNotification", |args| {
//!     tracing::info!(?args, "notification");
//! });
//! ```

/// Category name → id cache
pub mod category_cache;

/// Realtime hub connection registry
pub mod hub_registry;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the runtime units
pub mod error {
    use boxoffice_core::category::ApiError;
    use thiserror::Error;

    /// Errors raised by [`CategoryMappingCache`](crate::CategoryMappingCache).
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum CategoryError {
        /// The category listing could not be fetched or parsed.
        ///
        /// The cache stays uninitialized; retrying is safe.
        #[error("Failed to fetch categories: {0}")]
        Fetch(#[from] ApiError),
    }
}

pub use category_cache::{CategoryCacheConfig, CategoryMappingCache};
pub use error::CategoryError;
pub use hub_registry::HubConnectionRegistry;
