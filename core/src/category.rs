//! Category catalog abstraction.
//!
//! The storefront and dashboard forms collect category *names*, while the
//! backend expects category *ids*. This module defines the wire types of the
//! paginated category listing and the [`CategoryApi`] trait used to fetch it.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "data": {
//!     "items": [
//!       { "categoryId": "c1", "categoryName": "Music", "categoryDescription": "Live music" }
//!     ],
//!     "pageNumber": 1,
//!     "pageSize": 100,
//!     "totalItems": 1,
//!     "totalPages": 1,
//!     "hasNextPage": false,
//!     "hasPreviousPage": false
//!   }
//! }
//! ```
//!
//! # Implementations
//!
//! - `CategoryClient` in `boxoffice-rest` - HTTP/JSON via reqwest
//! - `MockCategoryApi` in `boxoffice-testing` - scripted pages for tests

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Default number of categories requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A single category as returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Backend identifier
    pub category_id: String,
    /// Display name (matched case-insensitively)
    pub category_name: String,
    /// Free-text description
    #[serde(default)]
    pub category_description: Option<String>,
}

impl Category {
    /// Create a category without a description.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category_id: id.into(),
            category_name: name.into(),
            category_description: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.category_description = Some(description.into());
        self
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    #[serde(default)]
    pub page_number: u32,
    /// Requested page size
    #[serde(default)]
    pub page_size: u32,
    /// Total items across all pages
    #[serde(default)]
    pub total_items: u64,
    /// Total number of pages
    #[serde(default)]
    pub total_pages: u32,
    /// Whether a following page exists
    #[serde(default)]
    pub has_next_page: bool,
    /// Whether a preceding page exists
    #[serde(default)]
    pub has_previous_page: bool,
}

impl<T> Page<T> {
    /// A single, complete page holding `items`.
    #[must_use]
    pub fn single(items: Vec<T>) -> Self {
        let len = items.len();
        Self {
            items,
            page_number: 1,
            page_size: u32::try_from(len).unwrap_or(u32::MAX),
            total_items: len as u64,
            total_pages: 1,
            has_next_page: false,
            has_previous_page: false,
        }
    }
}

/// Response envelope wrapping every payload of the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Wrapped payload
    pub data: T,
}

/// Page coordinates for a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page_number: u32,
    /// Items per page
    pub page_size: u32,
}

impl PageRequest {
    /// First page with the given size.
    #[must_use]
    pub const fn first(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size,
        }
    }

    /// The page following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page_number: self.page_number + 1,
            page_size: self.page_size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Errors from the REST transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP request could not be sent or completed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body could not be parsed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Credentials missing or rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// API answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

/// Source of the category listing.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the cache can hold an
/// `Arc<dyn CategoryApi>`.
pub trait CategoryApi: Send + Sync {
    /// Fetch one page of categories.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failures, non-success statuses or
    /// malformed bodies.
    fn list_categories(
        &self,
        page: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Category>, ApiError>> + Send + '_>>;
}

/// Normalize a category name for case-insensitive lookup.
///
/// Trims surrounding whitespace and lowercases.
///
/// ```
/// use boxoffice_core::category::normalize_name;
///
/// assert_eq!(normalize_name("  Live Music "), "live music");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
