//! # Fetcher Configuration Module
//!
//! Configuration for [`HttpFetcher`](super::HttpFetcher), built with a builder
//! like the rest of the crate's configs.

use std::time::Duration;

/// Configuration for the HTTP page fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Upper bound for a single request, connect to last byte
    pub timeout: Duration,

    /// User agent to use for requests
    pub user_agent: String,

    /// CSS selectors for elements whose text is ignored
    pub exclude_selectors: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: format!("urlspy/{}", env!("CARGO_PKG_VERSION")),
            exclude_selectors: vec![
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
                "template".to_string(),
            ],
        }
    }
}

/// Builder for FetcherConfig
#[derive(Debug, Default)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: FetcherConfig::default(),
        }
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add CSS selectors to ignore on top of the defaults
    pub fn exclude_selectors(mut self, exclude_selectors: Vec<String>) -> Self {
        self.config.exclude_selectors.extend(exclude_selectors);
        self
    }

    /// Build the configuration
    pub fn build(self) -> FetcherConfig {
        self.config
    }
}

impl FetcherConfig {
    /// Create a new builder
    pub fn builder() -> FetcherConfigBuilder {
        FetcherConfigBuilder::new()
    }
}
