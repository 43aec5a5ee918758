//! The task that owns all engine state.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::engine::Command;
use crate::engine::config::EngineConfig;
use crate::engine::events::{Control, KeywordSet, WorkerEvent, WorkerId};
use crate::engine::state::EngineState;
use crate::fetch::PageFetcher;
use crate::notify::Notifier;
use crate::store::Snapshot;
use crate::worker::Worker;

/// The supervisor's side of a running worker
struct WorkerHandle {
    id: WorkerId,
    control: mpsc::UnboundedSender<Control>,
    keywords: watch::Sender<KeywordSet>,
}

pub(crate) struct Supervisor<F, N> {
    config: EngineConfig,
    fetcher: Arc<F>,
    notifier: Arc<N>,
    state: EngineState,

    /// Live worker per watched URL
    workers: HashMap<String, WorkerHandle>,
    /// Every spawned worker task, including stopping ones
    tasks: Vec<JoinHandle<()>>,
    next_worker: u64,

    events_tx: mpsc::Sender<WorkerEvent>,
    events: mpsc::Receiver<WorkerEvent>,
    commands: mpsc::Receiver<Command>,

    persist_tx: mpsc::UnboundedSender<Snapshot>,
    writer: JoinHandle<()>,
}

impl<F: PageFetcher, N: Notifier> Supervisor<F, N> {
    pub fn new(
        config: EngineConfig,
        fetcher: Arc<F>,
        notifier: Arc<N>,
        state: EngineState,
        commands: mpsc::Receiver<Command>,
        persist_tx: mpsc::UnboundedSender<Snapshot>,
        writer: JoinHandle<()>,
    ) -> Self {
        let (events_tx, events) = mpsc::channel(config.event_buffer.max(1));
        Self {
            config,
            fetcher,
            notifier,
            state,
            workers: HashMap::new(),
            tasks: Vec::new(),
            next_worker: 0,
            events_tx,
            events,
            commands,
            persist_tx,
            writer,
        }
    }

    /// Serve commands and worker reports until shutdown
    pub async fn run(mut self) {
        let urls: Vec<String> = self.state.urls().cloned().collect();
        for url in &urls {
            self.start_worker(url);
        }
        info!(targets = urls.len(), "Engine started");

        let reply = loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle_command(command) {
                            break Some(reply);
                        }
                    }
                    None => {
                        info!("All engine handles dropped");
                        break None;
                    }
                },
            }
        };

        self.shutdown().await;
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::AddUrl { url, reply } => {
                let result = self.state.add_target(&url).map(|()| {
                    info!(%url, "Watching URL");
                    self.start_worker(&url);
                    self.persist();
                    url
                });
                let _ = reply.send(result);
            }
            Command::RemoveUrl { url, reply } => {
                let removed = self.state.remove_target(&url);
                if let Some(handle) = self.workers.remove(&url) {
                    debug!(worker = %handle.id, %url, "Stopping worker");
                    let _ = handle.control.send(Control::Stop);
                }
                if removed {
                    info!(%url, "Stopped watching URL");
                    self.persist();
                }
                let _ = reply.send(removed);
            }
            Command::AddKeyword {
                url,
                keyword,
                reply,
            } => {
                let result = self.state.add_keyword(&url, &keyword).map(|set| {
                    info!(%url, %keyword, epoch = set.epoch, "Added keyword");
                    self.publish(&url, set);
                    self.persist();
                });
                let _ = reply.send(result);
            }
            Command::RemoveKeyword {
                url,
                keyword,
                reply,
            } => {
                let removed = match self.state.remove_keyword(&url, &keyword) {
                    Some(set) => {
                        info!(%url, %keyword, epoch = set.epoch, "Removed keyword");
                        self.publish(&url, set);
                        self.persist();
                        true
                    }
                    None => false,
                };
                let _ = reply.send(removed);
            }
            Command::RefreshAll => {
                debug!(workers = self.workers.len(), "Waking all workers");
                for handle in self.workers.values() {
                    let _ = handle.control.send(Control::Wake);
                }
            }
            Command::ReportError { message } => self.notifier.on_error(&message),
            Command::Targets { reply } => {
                let _ = reply.send(self.state.targets());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.state.status());
            }
            Command::Log { reply } => {
                let _ = reply.send(self.state.log().to_vec());
            }
            Command::RemoveLogEntry { index, reply } => {
                let removed = self.state.remove_log_entry(index);
                if removed {
                    self.persist();
                }
                let _ = reply.send(removed);
            }
            Command::ClearLog { reply } => {
                let cleared = self.state.clear_log();
                if cleared {
                    self.persist();
                }
                let _ = reply.send(cleared);
            }
            Command::Shutdown { reply } => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Scanned {
                worker,
                url,
                report,
                at,
            } => {
                if !self.is_live(&url, worker) {
                    debug!(%worker, %url, "Dropping report from retired worker");
                    return;
                }
                let outcome = self.state.apply_scan(&url, report, at);
                for entry in &outcome.matches {
                    info!(
                        monotonic_counter.matches_reported = 1_u64,
                        url = %entry.url,
                        keyword = %entry.keyword,
                        "New match"
                    );
                    self.notifier
                        .on_match(&entry.url, &entry.keyword, entry.timestamp);
                }
                if outcome.recorded > 0 {
                    self.persist();
                }
            }
            WorkerEvent::FetchFailed {
                worker,
                url,
                error,
                at,
            } => {
                if !self.is_live(&url, worker) {
                    return;
                }
                self.state.record_failure(&url, &error, at);
                self.notifier
                    .on_error(&format!("Could not check {}: {}", url, error));
            }
            WorkerEvent::Stopped { worker, url } => {
                debug!(%worker, %url, "Worker exited");
                if self.is_live(&url, worker) {
                    self.workers.remove(&url);
                }
            }
        }
    }

    fn is_live(&self, url: &str, worker: WorkerId) -> bool {
        self.workers.get(url).is_some_and(|handle| handle.id == worker)
    }

    /// Spawn the worker for `url` unless one is already running
    fn start_worker(&mut self, url: &str) {
        if self.workers.contains_key(url) {
            return;
        }
        let Some(set) = self.state.keyword_set(url) else {
            return;
        };

        self.next_worker += 1;
        let id = WorkerId(self.next_worker);
        let (control, control_rx) = mpsc::unbounded_channel();
        let (keywords, keywords_rx) = watch::channel(set);
        let worker = Worker::new(
            id,
            url.to_string(),
            Arc::clone(&self.fetcher),
            keywords_rx,
            control_rx,
            self.events_tx.clone(),
            &self.config,
        );

        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(worker.run()));
        self.workers.insert(
            url.to_string(),
            WorkerHandle {
                id,
                control,
                keywords,
            },
        );
        debug!(worker = %id, %url, "Spawned worker");
    }

    /// Hand a new keyword set to the worker of `url` and make it baseline
    fn publish(&self, url: &str, set: KeywordSet) {
        if let Some(handle) = self.workers.get(url) {
            handle.keywords.send_replace(set);
            let _ = handle.control.send(Control::ReScan);
        }
    }

    fn persist(&self) {
        if self.persist_tx.send(self.state.snapshot()).is_err() {
            warn!("Persistence writer is gone, state not saved");
        }
    }

    /// Stop every worker, wait for them within the grace period, then flush
    async fn shutdown(mut self) {
        info!(workers = self.workers.len(), "Shutting down");
        for handle in self.workers.values() {
            let _ = handle.control.send(Control::Stop);
        }

        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<AbortHandle> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let joined = join_all(tasks);
        let grace = tokio::time::sleep(self.config.shutdown_grace);
        tokio::pin!(joined, grace);

        // Reports sent before the stop landed are still applied
        loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                _ = &mut joined => break,
                _ = &mut grace => {
                    warn!(
                        grace = ?self.config.shutdown_grace,
                        "Workers did not stop in time, aborting them"
                    );
                    aborts.iter().for_each(AbortHandle::abort);
                    break;
                }
            }
        }
        self.workers.clear();

        self.persist();
        drop(self.persist_tx);
        if let Err(e) = self.writer.await {
            error!(error = %e, "Persistence writer failed");
        }
        info!("Engine stopped");
    }
}
