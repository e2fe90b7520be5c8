//! DA node lifecycle watcher
//!
//! Follows workload events in the namespace and queues configured DA nodes
//! for resolution when their workload appears. The very first subscription
//! must succeed; afterwards a failed or finished stream is re-established
//! with exponential backoff until cancelled. Every new stream starts with a
//! fresh view of which workloads were already queued.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use torch_core::config::WatcherConfig;
use torch_core::metrics::watcher::RECONNECTS_TOTAL;
use torch_core::resilience::backoff::Backoff;
use torch_core::{MutualPeersConfig, Result};

use crate::sync::RetryQueue;

/// Lifecycle event of a named workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    /// Created, updated or listed during a (re)sync
    Applied(String),
    Deleted(String),
}

pub type WorkloadStream = BoxStream<'static, Result<WorkloadEvent>>;

/// Source of workload events
#[async_trait]
pub trait WorkloadEventSource: Send + Sync {
    /// Open a new event stream; an error means the watch could not be established
    async fn subscribe(&self) -> Result<WorkloadStream>;
}

pub struct ChangeWatcher {
    source: Arc<dyn WorkloadEventSource>,
    queue: Arc<RetryQueue>,
    peers: Arc<MutualPeersConfig>,
    name_prefix: String,
    initial_backoff: Duration,
    max_backoff: Duration,
    /// Workloads already queued since they appeared
    seen: HashSet<String>,
}

impl ChangeWatcher {
    pub fn new(
        source: Arc<dyn WorkloadEventSource>,
        queue: Arc<RetryQueue>,
        peers: Arc<MutualPeersConfig>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            source,
            queue,
            peers,
            name_prefix: config.name_prefix.clone(),
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            seen: HashSet::new(),
        }
    }

    /// Open the first stream and follow it in the background
    ///
    /// Fails if that first stream cannot be opened.
    pub async fn start(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let stream = self.source.subscribe().await?;
        tracing::info!(prefix = %self.name_prefix, "Watching workloads for DA nodes");
        Ok(tokio::spawn(self.run(stream, cancel)))
    }

    async fn run(mut self, mut stream: WorkloadStream, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.initial_backoff, self.max_backoff);

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    backoff.reset();
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = self.handle_event(event) => {}
                    }
                    continue;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Workload watch stream failed");
                }
                None => {
                    tracing::warn!("Workload watch stream ended");
                }
            }

            match self.reconnect(&mut backoff, &cancel).await {
                Some(new_stream) => {
                    // Deletions may have been missed; the relist rebuilds the set
                    self.seen.clear();
                    stream = new_stream;
                }
                None => break,
            }
        }

        tracing::info!("Workload watcher stopped");
    }

    /// Resubscribe with backoff; `None` once cancelled
    async fn reconnect(
        &self,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> Option<WorkloadStream> {
        loop {
            let delay = backoff.next_delay();
            tracing::info!(delay_secs = delay.as_secs(), "Reconnecting workload watch");
            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }

            RECONNECTS_TOTAL.inc();
            match self.source.subscribe().await {
                Ok(stream) => {
                    tracing::info!("Workload watch re-established");
                    return Some(stream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Workload watch reconnect failed");
                }
            }
        }
    }

    async fn handle_event(&mut self, event: WorkloadEvent) {
        match event {
            WorkloadEvent::Applied(name) => {
                if !name.starts_with(&self.name_prefix) || self.seen.contains(&name) {
                    return;
                }
                let Some((_, peer)) = self.peers.find(&name) else {
                    tracing::info!(workload = %name, "DA workload is not in the mutual peers config, skipping");
                    return;
                };
                tracing::info!(workload = %name, "New DA workload detected");
                match self.queue.enqueue(peer.clone()).await {
                    Ok(()) => {
                        self.seen.insert(name);
                    }
                    Err(e) => {
                        tracing::error!(workload = %name, error = %e, "Failed to queue DA node");
                    }
                }
            }
            WorkloadEvent::Deleted(name) => {
                if self.seen.remove(&name) {
                    tracing::info!(workload = %name, "DA workload deleted");
                }
            }
        }
    }
}
