//! Retry queue for node identity resolution
//!
//! Producers (the change watcher, the HTTP API) push nodes onto a bounded
//! channel. One worker wakes on a jittered tick, drains everything queued,
//! resolves the batch concurrently and carries failures over to the next
//! tick until a node has failed `max_retries` times.

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use torch_core::config::QueueConfig;
use torch_core::metrics::resolution::{QUEUE_DEPTH, RETRIES_EXHAUSTED_TOTAL};
use torch_core::resilience::backoff::jittered;
use torch_core::{Error, Peer, ResolutionStatus, Result};

use super::metric_registry::MetricRegistry;
use super::resolver::IdentityResolver;

/// A node waiting for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub peer: Peer,
    /// Failed resolutions so far
    pub retry_count: u32,
}

pub struct RetryQueue {
    tx: mpsc::Sender<PendingTask>,
    rx: Mutex<Option<mpsc::Receiver<PendingTask>>>,
    statuses: DashMap<String, ResolutionStatus>,
    max_retries: u32,
}

impl RetryQueue {
    #[must_use]
    pub fn new(capacity: usize, max_retries: u32) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            statuses: DashMap::new(),
            max_retries,
        }
    }

    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity, config.max_retries)
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Queue `peer` with a fresh retry budget
    ///
    /// Waits for capacity when the channel is full.
    pub async fn enqueue(&self, peer: Peer) -> Result<()> {
        let node_name = peer.node_name.clone();
        self.statuses
            .insert(node_name.clone(), ResolutionStatus::Pending { attempt: 0 });
        self.tx
            .send(PendingTask {
                peer,
                retry_count: 0,
            })
            .await
            .map_err(|_| Error::Internal("retry queue is closed".to_string()))?;
        QUEUE_DEPTH.inc();
        tracing::info!(node_name = %node_name, "Node added to the retry queue");
        Ok(())
    }

    #[must_use]
    pub fn status(&self, node_name: &str) -> Option<ResolutionStatus> {
        self.statuses.get(node_name).map(|s| s.value().clone())
    }

    #[must_use]
    pub fn statuses(&self) -> BTreeMap<String, ResolutionStatus> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Record a resolution that happened outside the worker
    pub fn mark_resolved(&self, node_name: &str, address: &str) {
        self.statuses.insert(
            node_name.to_string(),
            ResolutionStatus::Resolved {
                address: address.to_string(),
            },
        );
    }

    fn set_status(&self, node_name: &str, status: ResolutionStatus) {
        self.statuses.insert(node_name.to_string(), status);
    }

    /// Hand the receiving side to the worker; only the first caller gets it
    pub(crate) fn take_receiver(&self) -> Option<mpsc::Receiver<PendingTask>> {
        self.rx.lock().take()
    }
}

/// What one tick did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub resolved: Vec<String>,
    pub retrying: Vec<String>,
    pub exhausted: Vec<String>,
}

impl TickReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.retrying.is_empty() && self.exhausted.is_empty()
    }
}

/// Consumer side of the [`RetryQueue`]
pub struct RetryWorker {
    queue: Arc<RetryQueue>,
    rx: mpsc::Receiver<PendingTask>,
    resolver: Arc<IdentityResolver>,
    registry: Arc<MetricRegistry>,
    /// Failed tasks carried to the next tick
    backlog: Vec<PendingTask>,
    tick_interval: Duration,
    jitter: Duration,
}

impl RetryWorker {
    /// Attach a worker to `queue`
    ///
    /// Fails if another worker already owns the queue.
    pub fn new(
        queue: Arc<RetryQueue>,
        resolver: Arc<IdentityResolver>,
        registry: Arc<MetricRegistry>,
        config: &QueueConfig,
    ) -> Result<Self> {
        let rx = queue
            .take_receiver()
            .ok_or_else(|| Error::Internal("retry queue already has a worker".to_string()))?;
        Ok(Self {
            queue,
            rx,
            resolver,
            registry,
            backlog: Vec::new(),
            tick_interval: config.tick_interval(),
            jitter: config.jitter(),
        })
    }

    /// Tasks for this tick: everything queued plus the carried backlog
    ///
    /// A fresh enqueue replaces a carried task for the same node.
    fn drain(&mut self) -> Vec<PendingTask> {
        let mut batch = Vec::new();
        let mut seen = HashSet::new();
        while let Ok(task) = self.rx.try_recv() {
            QUEUE_DEPTH.dec();
            if seen.insert(task.peer.node_name.clone()) {
                batch.push(task);
            }
        }
        for task in std::mem::take(&mut self.backlog) {
            QUEUE_DEPTH.dec();
            if seen.insert(task.peer.node_name.clone()) {
                batch.push(task);
            }
        }
        batch
    }

    /// Drain and process everything currently queued
    pub async fn run_tick(&mut self) -> TickReport {
        let batch = self.drain();
        let mut report = TickReport::default();
        if batch.is_empty() {
            return report;
        }
        tracing::debug!(tasks = batch.len(), "Processing retry queue");

        let resolver = &self.resolver;
        let results = join_all(batch.into_iter().map(|task| async move {
            let result = resolver.resolve(&task.peer).await;
            (task, result)
        }))
        .await;

        for (mut task, result) in results {
            let node_name = task.peer.node_name.clone();
            match result {
                Ok(address) => {
                    self.registry.record(&node_name, &address);
                    self.queue
                        .set_status(&node_name, ResolutionStatus::Resolved { address });
                    report.resolved.push(node_name);
                }
                Err(e) => {
                    task.retry_count += 1;
                    if task.retry_count < self.queue.max_retries() {
                        tracing::info!(
                            node_name = %node_name,
                            attempt = task.retry_count,
                            error = %e,
                            "Resolution failed, retrying on next tick"
                        );
                        self.queue.set_status(
                            &node_name,
                            ResolutionStatus::Pending {
                                attempt: task.retry_count,
                            },
                        );
                        QUEUE_DEPTH.inc();
                        self.backlog.push(task);
                        report.retrying.push(node_name);
                    } else {
                        tracing::warn!(
                            node_name = %node_name,
                            attempts = task.retry_count,
                            error = %e,
                            "Max retry count reached, dropping node"
                        );
                        RETRIES_EXHAUSTED_TOTAL
                            .with_label_values(&[node_name.as_str()])
                            .inc();
                        self.queue.set_status(
                            &node_name,
                            ResolutionStatus::Exhausted {
                                attempts: task.retry_count,
                            },
                        );
                        report.exhausted.push(node_name);
                    }
                }
            }
        }

        report
    }

    /// Tick until `cancel` fires; queued tasks are abandoned on shutdown
    pub fn start(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_ms = self.tick_interval.as_millis() as u64,
                jitter_ms = self.jitter.as_millis() as u64,
                "Retry worker started"
            );
            loop {
                let delay = jittered(self.tick_interval, self.jitter);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    report = self.run_tick() => {
                        if !report.is_empty() {
                            tracing::debug!(?report, "Retry tick finished");
                        }
                    }
                }
            }
            tracing::info!("Retry worker stopped");
        })
    }
}
