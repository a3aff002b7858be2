//! HTTP client for the book catalog service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::domain::value_objects::BookId;
use crate::ports::book_catalog::{BookCatalog, BookRecord, CatalogError, Result};

/// Catalog client that tries each configured base URL in order.
///
/// Every address is tried once. The first successful answer wins and the
/// error from the last address is returned when none succeeds.
pub struct CatalogClient {
    client: Client,
    base_urls: Vec<String>,
}

impl CatalogClient {
    /// Create a client with a fixed per-request timeout.
    pub fn new(base_urls: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let base_urls = base_urls
            .into_iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();

        Ok(Self { client, base_urls })
    }

    fn book_url(base_url: &str, book_id: BookId) -> String {
        format!("{}/api/books/{}", base_url, book_id)
    }

    fn check_status(status: StatusCode, url: &str, book_id: BookId) -> Result<()> {
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(book_id));
        }
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BookCatalog for CatalogClient {
    async fn fetch(&self, book_id: BookId) -> Result<BookRecord> {
        let mut last_error = CatalogError::NoAddress;

        for base_url in &self.base_urls {
            let url = Self::book_url(base_url, book_id);
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(url = %url, "Catalog address unreachable: {}", e);
                    last_error = CatalogError::Transport(e.to_string());
                    continue;
                }
            };

            if let Err(e) = Self::check_status(response.status(), &url, book_id) {
                tracing::debug!(url = %url, "Catalog address answered with an error: {}", e);
                last_error = e;
                continue;
            }

            match response.json::<BookRecord>().await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    tracing::debug!(url = %url, "Catalog address sent an invalid record: {}", e);
                    last_error = CatalogError::InvalidRecord(e.to_string());
                }
            }
        }

        Err(last_error)
    }

    async fn update(&self, book_id: BookId, record: &BookRecord) -> Result<()> {
        let mut last_error = CatalogError::NoAddress;

        for base_url in &self.base_urls {
            let url = Self::book_url(base_url, book_id);
            let response = match self.client.put(&url).json(record).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(url = %url, "Catalog address unreachable: {}", e);
                    last_error = CatalogError::Transport(e.to_string());
                    continue;
                }
            };

            match Self::check_status(response.status(), &url, book_id) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(url = %url, "Catalog address answered with an error: {}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
