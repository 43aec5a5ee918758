//! # Engine Configuration Module
//!
//! Timing and buffering knobs for the monitoring engine. None of them affect
//! which occurrences are reported, only when.

use std::time::Duration;

/// Configuration for the engine and its workers
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time a worker sleeps between two polls of its page
    pub poll_interval: Duration,

    /// Upper bound for one fetch, on top of the fetcher's own timeout
    pub fetch_timeout: Duration,

    /// How long shutdown waits for workers to acknowledge the stop request
    pub shutdown_grace: Duration,

    /// Capacity of the channel carrying worker reports to the supervisor
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(20),
            shutdown_grace: Duration::from_secs(5),
            event_buffer: 256,
        }
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the time between polls
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    /// Set the fetch timeout
    pub fn fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.config.fetch_timeout = fetch_timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.config.shutdown_grace = shutdown_grace;
        self
    }

    /// Set the worker report channel capacity
    pub fn event_buffer(mut self, event_buffer: usize) -> Self {
        self.config.event_buffer = event_buffer.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl EngineConfig {
    /// Create a new builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}
