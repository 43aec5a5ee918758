//! HTTP page fetcher
//!
//! Fetches pages with reqwest and reduces them to their visible text.

use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument};

use crate::fetch::config::FetcherConfig;
use crate::fetch::error::FetchError;
use crate::fetch::extract::visible_text;
use crate::fetch::PageFetcher;

/// Page fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// The underlying reqwest client
    client: ReqwestClient,

    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a fetcher with the default configuration
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a fetcher with a custom configuration
    pub fn with_config(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!("Fetched {} bytes from {}", html.len(), url);

        visible_text(&html, &self.config.exclude_selectors)
    }
}
