//! # Box Office Testing
//!
//! Test doubles and helpers for the Box Office client crates.
//!
//! This crate provides:
//! - [`MockCategoryApi`]: scripted category listing pages and failures
//! - [`MockHubTransport`] / [`MockHubConnection`]: in-memory realtime hubs
//! - Fixtures and a tracing initializer for tests
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{fixtures, MockCategoryApi};
//! use boxoffice_runtime::CategoryMappingCache;
//!
//! #[tokio::test]
//! async fn resolves_names() {
//!     let api = Arc::new(MockCategoryApi::with_categories(fixtures::categories()));
//!     let cache = CategoryMappingCache::new(api);
//!     cache.initialize().await.unwrap();
//!     assert_eq!(cache.resolve_id("music").as_deref(), Some("c1"));
//! }
//! ```

mod category_mocks;
mod hub_mocks;

pub use category_mocks::MockCategoryApi;
pub use hub_mocks::{MockHubConnection, MockHubTransport};

/// Shared test data.
pub mod fixtures {
    use boxoffice_core::category::Category;

    /// `Music` (`c1`) and `Tech` (`c2`).
    #[must_use]
    pub fn categories() -> Vec<Category> {
        vec![
            Category::new("c1", "Music").with_description("Concerts and live sets"),
            Category::new("c2", "Tech").with_description("Conferences and meetups"),
        ]
    }
}

/// Install a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
