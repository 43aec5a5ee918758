//! # Scripted Page Fetcher
//!
//! A `PageFetcher` that serves pages from memory. Each URL has a script of
//! responses; every fetch consumes the next one, and the last response repeats
//! once the script runs out. Used by tests to drive workers through exact
//! page histories without network access.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::fetch::error::FetchError;
use crate::fetch::PageFetcher;

#[derive(Debug, Clone)]
enum Step {
    Page(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    fetches: usize,
}

/// In-memory fetcher with per-URL response scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the script for `url` with a single page served forever
    pub async fn set_page(&self, url: &str, text: &str) {
        let mut scripts = self.scripts.lock().await;
        let script = scripts.entry(url.to_string()).or_default();
        script.steps.clear();
        script.steps.push_back(Step::Page(text.to_string()));
    }

    /// Queue a page to be served after the ones already scripted
    pub async fn push_page(&self, url: &str, text: &str) {
        let mut scripts = self.scripts.lock().await;
        let script = scripts.entry(url.to_string()).or_default();
        script.steps.push_back(Step::Page(text.to_string()));
    }

    /// Queue a failed fetch
    pub async fn push_failure(&self, url: &str, message: &str) {
        let mut scripts = self.scripts.lock().await;
        let script = scripts.entry(url.to_string()).or_default();
        script.steps.push_back(Step::Fail(message.to_string()));
    }

    /// Make every fetch take `delay` before answering
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    /// Number of fetches made for `url` so far
    pub async fn fetch_count(&self, url: &str) -> usize {
        let scripts = self.scripts.lock().await;
        scripts.get(url).map_or(0, |script| script.fetches)
    }
}

impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let step = {
            let mut scripts = self.scripts.lock().await;
            let script = scripts
                .get_mut(url)
                .ok_or_else(|| FetchError::Other(format!("No page scripted for {}", url)))?;
            script.fetches += 1;
            if script.steps.len() > 1 {
                script.steps.pop_front()
            } else {
                script.steps.front().cloned()
            }
        };

        match step {
            Some(Step::Page(text)) => Ok(text.to_lowercase()),
            Some(Step::Fail(message)) => Err(FetchError::Other(message)),
            None => Err(FetchError::Other(format!("No page scripted for {}", url))),
        }
    }
}
