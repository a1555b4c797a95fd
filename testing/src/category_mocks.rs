//! Scriptable [`CategoryApi`] for cache tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use boxoffice_core::category::{ApiError, Category, CategoryApi, Page, PageRequest};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory category listing.
///
/// Each call pops the next scripted response; when the script is empty the
/// fallback page (if any) is served, otherwise the call fails with
/// [`ApiError::RequestFailed`].
///
/// # Example
///
/// ```
/// use boxoffice_testing::MockCategoryApi;
/// use boxoffice_core::category::{Category, CategoryApi, PageRequest};
///
/// # async fn example() {
/// let api = MockCategoryApi::with_categories(vec![Category::new("c1", "Music")]);
/// let page = api.list_categories(PageRequest::default()).await.unwrap();
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(api.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockCategoryApi {
    script: Mutex<VecDeque<Result<Page<Category>, ApiError>>>,
    fallback: Option<Page<Category>>,
    requests: Mutex<Vec<PageRequest>>,
    delay: Option<Duration>,
}

impl MockCategoryApi {
    /// Empty script, no fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a single complete page of `categories` on every call.
    #[must_use]
    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            fallback: Some(Page::single(categories)),
            ..Self::default()
        }
    }

    /// Delay every response by `delay` (for concurrency tests).
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful page.
    pub fn push_page(&self, page: Page<Category>) {
        self.script.lock().unwrap().push_back(Ok(page));
    }

    /// Queue a failure.
    pub fn push_failure(&self, error: ApiError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Number of `list_categories` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Page requests received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<Page<Category>, ApiError> {
        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }
        self.fallback
            .clone()
            .ok_or_else(|| ApiError::RequestFailed("no scripted response".to_string()))
    }
}

impl CategoryApi for MockCategoryApi {
    fn list_categories(
        &self,
        page: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Category>, ApiError>> + Send + '_>> {
        self.requests.lock().unwrap().push(page);
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}
