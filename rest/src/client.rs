//! Category REST client implementation

use boxoffice_core::category::{ApiError, ApiResponse, Category, CategoryApi, Page, PageRequest};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Catalog API client
#[derive(Clone)]
pub struct CategoryClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl CategoryClient {
    /// Create a client for the API rooted at `base_url` (e.g.
    /// `https://tickets.example.com/api`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Create a client whose requests time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RequestFailed` if the HTTP client cannot be built
    /// (TLS backend initialization)
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// API root this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of categories
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn categories(&self, page: PageRequest) -> Result<Page<Category>, ApiError> {
        tracing::debug!(
            page_number = page.page_number,
            page_size = page.page_size,
            "Requesting categories"
        );

        let request = self
            .client
            .get(format!("{}/categories", self.base_url))
            .query(&[("pageNumber", page.page_number), ("pageSize", page.page_size)]);

        let envelope: ApiResponse<Page<Category>> = self.send(request).await?;
        Ok(envelope.data)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| ApiError::ResponseParseFailed(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }
}

impl CategoryApi for CategoryClient {
    fn list_categories(
        &self,
        page: PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Category>, ApiError>> + Send + '_>> {
        Box::pin(self.categories(page))
    }
}
