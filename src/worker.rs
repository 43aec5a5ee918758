//! # Polling Worker
//!
//! One worker task watches one URL. It fetches the page, scans it against the
//! live keyword view published by the engine and reports every occurrence
//! back. Whether an occurrence is new is decided by the engine, never here.
//!
//! ## States
//!
//! - `Baselining`: scan and report occurrences as already known
//! - `Polling`: scan and report occurrences as candidates for notification
//! - `Sleeping`: wait for the poll interval or a control signal
//! - `Stopped`: final; the task returns
//!
//! A keyword change always leads to a baseline scan, either through a
//! `Control::ReScan` or because the keyword epoch moved since the last one.
//! A `Control::Wake` received mid-fetch lets the fetch finish and skips the
//! sleep after it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::engine::config::EngineConfig;
use crate::engine::events::{Control, KeywordSet, ScanReport, WorkerEvent, WorkerId};
use crate::fetch::{FetchError, PageFetcher};
use crate::scan::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Baselining,
    Polling,
    Sleeping,
    Stopped,
}

#[derive(Debug)]
enum CycleOutcome {
    Completed,
    Failed,
    /// The fetch was abandoned because of a `ReScan` or `Stop`
    Interrupted(Control),
    /// The engine no longer listens to reports
    Disconnected,
}

pub(crate) struct Worker<F> {
    id: WorkerId,
    url: String,
    fetcher: Arc<F>,
    keywords: watch::Receiver<KeywordSet>,
    control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::Sender<WorkerEvent>,
    poll_interval: Duration,
    fetch_timeout: Duration,
    /// A `Wake` arrived mid-fetch; the next sleep is skipped
    wake_pending: bool,
}

impl<F: PageFetcher> Worker<F> {
    pub fn new(
        id: WorkerId,
        url: String,
        fetcher: Arc<F>,
        keywords: watch::Receiver<KeywordSet>,
        control: mpsc::UnboundedReceiver<Control>,
        events: mpsc::Sender<WorkerEvent>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            id,
            url,
            fetcher,
            keywords,
            control,
            events,
            poll_interval: config.poll_interval,
            fetch_timeout: config.fetch_timeout,
            wake_pending: false,
        }
    }

    /// Run until stopped, then report `Stopped`
    #[instrument(name = "worker", skip(self), fields(worker = %self.id, url = %self.url))]
    pub async fn run(mut self) {
        info!("Worker started");
        let mut state = WorkerState::Baselining;
        // Where a sleep that ends without ReScan or Stop leads
        let mut resume = WorkerState::Polling;
        let mut baselined_epoch: Option<u64> = None;

        while state != WorkerState::Stopped {
            state = match state {
                WorkerState::Baselining | WorkerState::Polling => {
                    let requested = state == WorkerState::Baselining;
                    match self.cycle(requested, &mut baselined_epoch).await {
                        CycleOutcome::Completed => {
                            resume = WorkerState::Polling;
                            WorkerState::Sleeping
                        }
                        CycleOutcome::Failed => {
                            resume = state;
                            WorkerState::Sleeping
                        }
                        CycleOutcome::Interrupted(Control::Stop) | CycleOutcome::Disconnected => {
                            WorkerState::Stopped
                        }
                        CycleOutcome::Interrupted(_) => WorkerState::Baselining,
                    }
                }
                WorkerState::Sleeping => match self.sleep().await {
                    None | Some(Control::Wake) => resume,
                    Some(Control::ReScan) => WorkerState::Baselining,
                    Some(Control::Stop) => WorkerState::Stopped,
                },
                WorkerState::Stopped => WorkerState::Stopped,
            };
        }

        info!("Worker stopped");
        let _ = self
            .events
            .send(WorkerEvent::Stopped {
                worker: self.id,
                url: self.url.clone(),
            })
            .await;
    }

    /// Fetch and scan once, racing the fetch against control signals
    async fn cycle(&mut self, requested: bool, baselined_epoch: &mut Option<u64>) -> CycleOutcome {
        let set = self.keywords.borrow_and_update().clone();
        let baseline = requested || *baselined_epoch != Some(set.epoch);
        debug!(baseline, epoch = set.epoch, "Fetching page");
        self.wake_pending = false;

        let result = {
            let fetch = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&self.url));
            tokio::pin!(fetch);
            loop {
                tokio::select! {
                    result = &mut fetch => break result,
                    control = self.control.recv() => match control.unwrap_or(Control::Stop) {
                        Control::Wake => {
                            self.wake_pending = true;
                            continue;
                        }
                        control => {
                            debug!(?control, "Fetch abandoned");
                            return CycleOutcome::Interrupted(control);
                        }
                    },
                }
            }
        };

        let at = Utc::now();
        let result = result.unwrap_or_else(|_| {
            Err(FetchError::Timeout {
                url: self.url.clone(),
            })
        });

        let (event, outcome) = match result {
            Ok(text) => {
                let occurrences = scan(&text, &set.words);
                debug!(
                    monotonic_counter.page_fetches = 1_u64,
                    baseline,
                    occurrences = occurrences.len(),
                    "Scanned page"
                );
                if baseline {
                    *baselined_epoch = Some(set.epoch);
                }
                let event = WorkerEvent::Scanned {
                    worker: self.id,
                    url: self.url.clone(),
                    report: ScanReport {
                        baseline,
                        epoch: set.epoch,
                        occurrences,
                    },
                    at,
                };
                (event, CycleOutcome::Completed)
            }
            Err(e) => {
                warn!(monotonic_counter.fetch_failures = 1_u64, error = %e, "Fetch failed");
                let event = WorkerEvent::FetchFailed {
                    worker: self.id,
                    url: self.url.clone(),
                    error: e.to_string(),
                    at,
                };
                (event, CycleOutcome::Failed)
            }
        };

        if self.events.send(event).await.is_err() {
            return CycleOutcome::Disconnected;
        }
        outcome
    }

    /// Wait for the poll interval. Returns the coalesced control signal that
    /// cut the sleep short, or `None` when the timer elapsed.
    async fn sleep(&mut self) -> Option<Control> {
        let woken = std::mem::take(&mut self.wake_pending).then_some(Control::Wake);
        if let Some(control) = self.drain(woken) {
            return Some(control);
        }
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => None,
            control = self.control.recv() => {
                self.drain(Some(control.unwrap_or(Control::Stop)))
            }
        }
    }

    /// Merge every queued signal into `pending`. A closed channel counts as `Stop`.
    fn drain(&mut self, mut pending: Option<Control>) -> Option<Control> {
        loop {
            let next = match self.control.try_recv() {
                Ok(control) => control,
                Err(TryRecvError::Empty) => return pending,
                Err(TryRecvError::Disconnected) => Control::Stop,
            };
            let merged = pending.map_or(next, |p| p.merge(next));
            if merged == Control::Stop {
                return Some(Control::Stop);
            }
            pending = Some(merged);
        }
    }
}
