//! # Box Office Core
//!
//! Core traits and types shared by the Box Office client crates.
//!
//! The storefront, event-manager dashboard and admin console talk to two
//! kinds of backends:
//!
//! - **REST** for paginated listings such as categories ([`category`])
//! - **Realtime hubs** for server-pushed events, one per [`Channel`] ([`hub`])
//!
//! This crate only defines the seams. Transports live in `boxoffice-rest` and
//! `boxoffice-signalr`, the stateful units (category cache, hub registry) in
//! `boxoffice-runtime`, and in-memory doubles in `boxoffice-testing`.
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_core::{Channel, CategoryApi, HubTransport};
//!
//! fn wire(api: Arc<dyn CategoryApi>, transport: Arc<dyn HubTransport>) {
//!     let cache = CategoryMappingCache::new(api);
//!     let hubs = HubConnectionRegistry::new(transport);
//!     // hand both to the UI layer
//! }
//! ```

pub mod category;
pub mod channel;
pub mod hub;

pub use category::{ApiError, ApiResponse, Category, CategoryApi, Page, PageRequest};
pub use channel::Channel;
pub use hub::{
    AccessTokenFactory, ChannelState, ConnectOutcome, EventHandler, HubConnection, HubError,
    HubOptions, HubTransport, ReconnectPolicy, Registration,
};
