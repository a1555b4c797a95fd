//! # Box Office REST Client
//!
//! HTTP client for the Box Office catalog API, implementing
//! [`CategoryApi`](boxoffice_core::CategoryApi).
//!
//! ## Example
//!
//! ```no_run
//! use boxoffice_rest::CategoryClient;
//! use boxoffice_core::PageRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CategoryClient::new("http://localhost:5000/api")
//!         .with_access_token("eyJhbGciOi...");
//!
//!     let page = client.categories(PageRequest::default()).await?;
//!     for category in page.items {
//!         println!("{} -> {}", category.category_name, category.category_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Status Mapping
//!
//! - `200` - body parsed as `{ "data": Page<Category> }`
//! - `401` - [`ApiError::Unauthorized`](boxoffice_core::ApiError::Unauthorized)
//! - anything else - [`ApiError::Status`](boxoffice_core::ApiError::Status) with the body

pub mod client;

pub use client::CategoryClient;
