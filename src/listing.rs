//! Remote release listing
//!
//! The listing is treated as opaque text; archive names are pulled out of it
//! by [`ArchivePattern`](crate::manifest::ArchivePattern).

use crate::error::{Error, ListingError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Source of the raw release directory listing
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Fetch the listing body as text
    ///
    /// # Errors
    ///
    /// Any failure is fatal to the pipeline: without a listing no archive
    /// identifiers can be derived.
    async fn fetch_listing(&self) -> Result<String>;
}

/// Listing provider that GETs the release directory page over HTTP
pub struct HttpListingProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpListingProvider {
    /// Create a provider for `url` with a request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ListingError::Request {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    /// The listing URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ListingProvider for HttpListingProvider {
    async fn fetch_listing(&self) -> Result<String> {
        tracing::debug!(url = %self.url, "fetching release listing");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| ListingError::Request {
                url: self.url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(Error::Listing(ListingError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|source| ListingError::Request {
                url: self.url.clone(),
                source,
            })?;

        tracing::debug!(url = %self.url, bytes = body.len(), "release listing received");
        Ok(body)
    }
}

/// Listing provider returning fixed text
#[derive(Debug, Clone, Default)]
pub struct StaticListing(pub String);

#[async_trait]
impl ListingProvider for StaticListing {
    async fn fetch_listing(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
