//! Source-text resolution for the planning-summary pipeline.
//!
//! Callers supply either raw text or a URL. Raw text wins outright — when it
//! is present no network fetch happens and the markup stripper never runs.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::error::ApiError;
use crate::html::html_to_text;

/// Seam over the best-effort upstream page fetch.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL and return the raw response body.
    async fn fetch(&self, url: &str) -> Result<String, ApiError>;
}

/// Plain HTTP fetcher with a bounded request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Surface upstream rate limiting distinguishably so callers can
            // back off, rather than masking it as a generic failure.
            if status.as_u16() == 429 {
                return Err(ApiError::RateLimited { body });
            }
            return Err(ApiError::Fetch(format!("{status}: {body}")));
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::Fetch(e.to_string()))
    }
}

/// Resolve the text to summarise. Precedence: non-empty `raw_text` is used
/// verbatim; otherwise `url` is fetched and run through the markup stripper.
/// No path yielding non-empty text is a validation error.
pub async fn resolve_source_text(
    raw_text: Option<&str>,
    url: Option<&str>,
    fetcher: &dyn PageFetcher,
) -> Result<String, ApiError> {
    if let Some(text) = raw_text {
        if !text.is_empty() {
            return Ok(text.to_string());
        }
    }

    if let Some(url) = url {
        if !url.is_empty() {
            let body = fetcher.fetch(url).await?;
            let text = html_to_text(&body);
            info!("Fetched planning page: {} -> {} chars of text", url, text.len());
            if !text.is_empty() {
                return Ok(text);
            }
        }
    }

    Err(ApiError::Validation(
        "No text available to summarise".to_string(),
    ))
}
