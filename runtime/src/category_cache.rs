//! Category name → id index built from the paginated catalog listing.
//!
//! Forms collect category names; the backend wants ids. The cache fetches the
//! listing once, then answers lookups synchronously until [`reset`] is
//! called. There is no TTL.
//!
//! Names are normalized (trimmed, lowercased) on both insert and lookup, so
//! `"MUSIC"`, `"music"` and `" Music "` resolve to the same id.
//!
//! # Example
//!
//! ```ignore
//! let cache = CategoryMappingCache::new(Arc::new(CategoryClient::new(base_url)));
//! cache.initialize().await?;
//!
//! let ids = cache.resolve_ids(&["Music", "Tech"]);
//! ```
//!
//! [`reset`]: CategoryMappingCache::reset

use crate::error::CategoryError;
use crate::metrics::CATEGORY_FETCHES_TOTAL;
use boxoffice_core::category::{
    ApiError, Category, CategoryApi, DEFAULT_PAGE_SIZE, PageRequest, normalize_name,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Fetch settings for [`CategoryMappingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCacheConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Upper bound on pages fetched per build (at least 1)
    pub max_pages: u32,
}

impl Default for CategoryCacheConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 1,
        }
    }
}

/// Normalized name → id, in insertion order.
#[derive(Debug, Default)]
struct CategoryIndex {
    initialized: bool,
    ids: HashMap<String, String>,
    names: Vec<String>,
}

impl CategoryIndex {
    fn from_categories(categories: Vec<Category>) -> Self {
        let mut index = Self {
            initialized: true,
            ids: HashMap::with_capacity(categories.len()),
            names: Vec::with_capacity(categories.len()),
        };

        for category in categories {
            let name = normalize_name(&category.category_name);
            // A repeated name keeps its first position, last id wins
            if index.ids.insert(name.clone(), category.category_id).is_none() {
                index.names.push(name);
            }
        }

        index
    }

    fn get(&self, name: &str) -> Option<&String> {
        if !self.initialized {
            return None;
        }
        self.ids.get(&normalize_name(name))
    }
}

/// One-shot category name → id cache.
///
/// Construct one per application/session and share it by reference or `Arc`.
///
/// # Concurrency
///
/// [`initialize`](Self::initialize) is single-flighted: concurrent callers
/// wait for the in-flight fetch and then observe its result, so the listing
/// is fetched at most once per successful build. Lookups take a read lock
/// and never wait on the network.
pub struct CategoryMappingCache {
    api: Arc<dyn CategoryApi>,
    config: CategoryCacheConfig,
    index: RwLock<CategoryIndex>,
    init_gate: Mutex<()>,
}

impl CategoryMappingCache {
    /// Create an uninitialized cache with the default fetch settings
    /// (one page of 100).
    #[must_use]
    pub fn new(api: Arc<dyn CategoryApi>) -> Self {
        Self::with_config(api, CategoryCacheConfig::default())
    }

    /// Create an uninitialized cache with explicit fetch settings.
    #[must_use]
    pub fn with_config(api: Arc<dyn CategoryApi>, config: CategoryCacheConfig) -> Self {
        Self {
            api,
            config,
            index: RwLock::new(CategoryIndex::default()),
            init_gate: Mutex::new(()),
        }
    }

    /// Fetch the listing and build the index. No-op once initialized.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::Fetch`] if the listing cannot be fetched or
    /// parsed. The cache is then left uninitialized and empty, so calling
    /// `initialize` again retries.
    pub async fn initialize(&self) -> Result<(), CategoryError> {
        if self.is_initialized() {
            return Ok(());
        }

        let _guard = self.init_gate.lock().await;
        if self.is_initialized() {
            debug!("Category cache initialized by a concurrent caller");
            return Ok(());
        }

        match self.fetch_all().await {
            Ok(categories) => {
                let index = CategoryIndex::from_categories(categories);
                info!(categories = index.names.len(), "Category cache initialized");
                *self.write_index() = index;
                metrics::counter!(CATEGORY_FETCHES_TOTAL, "outcome" => "success").increment(1);
                Ok(())
            }
            Err(e) => {
                *self.write_index() = CategoryIndex::default();
                metrics::counter!(CATEGORY_FETCHES_TOTAL, "outcome" => "failure").increment(1);
                warn!(error = %e, "Category cache initialization failed");
                Err(CategoryError::Fetch(e))
            }
        }
    }

    /// Resolve each name to its id. Unknown names are omitted; order and
    /// duplicates are preserved. Empty before initialization.
    #[must_use]
    pub fn resolve_ids<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let index = self.read_index();
        names
            .iter()
            .filter_map(|name| index.get(name.as_ref()).cloned())
            .collect()
    }

    /// Resolve a single name. `None` when unknown or not yet initialized.
    #[must_use]
    pub fn resolve_id(&self, name: &str) -> Option<String> {
        self.read_index().get(name).cloned()
    }

    /// Known normalized names, in listing order.
    #[must_use]
    pub fn list_names(&self) -> Vec<String> {
        let index = self.read_index();
        if index.initialized {
            index.names.clone()
        } else {
            Vec::new()
        }
    }

    /// Whether a fetch has completed successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.read_index().initialized
    }

    /// Number of known categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_index().names.len()
    }

    /// Whether no categories are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the index so the next [`initialize`](Self::initialize) fetches
    /// again.
    ///
    /// Waits for an in-flight `initialize` to finish first, so its result
    /// cannot repopulate the index after the reset.
    pub async fn reset(&self) {
        let _guard = self.init_gate.lock().await;
        *self.write_index() = CategoryIndex::default();
        debug!("Category cache reset");
    }

    async fn fetch_all(&self) -> Result<Vec<Category>, ApiError> {
        let max_pages = self.config.max_pages.max(1);
        let mut request = PageRequest::first(self.config.page_size);
        let mut categories = Vec::new();

        for fetched in 1..=max_pages {
            let page = self.api.list_categories(request).await?;
            debug!(
                page_number = request.page_number,
                items = page.items.len(),
                "Fetched category page"
            );
            categories.extend(page.items);

            if !page.has_next_page {
                break;
            }
            if fetched == max_pages {
                warn!(
                    pages = max_pages,
                    total_items = page.total_items,
                    "Category listing has more pages than fetched; remaining names will not resolve"
                );
                break;
            }
            request = request.next();
        }

        Ok(categories)
    }

    fn read_index(&self) -> RwLockReadGuard<'_, CategoryIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, CategoryIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}
