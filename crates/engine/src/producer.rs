use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use latprobe_client::ContentSource;
use latprobe_core::Batch;

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    pub batches_published: u64,
    pub fetch_failures: u64,
    pub empty_fetches: u64,
}

/// Keeps the batch queue full of freshly sampled items.
///
/// Failed fetches are retried right away with another random source; the
/// queue's capacity is the only thing that slows the producer down.
pub struct BatchProducer {
    source: Arc<dyn ContentSource>,
    tags: Vec<String>,
    batch_size: usize,
}

impl BatchProducer {
    pub fn new(source: Arc<dyn ContentSource>, tags: Vec<String>, batch_size: usize) -> Result<Self, EngineError> {
        if tags.is_empty() {
            return Err(EngineError::NoSources);
        }
        Ok(Self {
            source,
            tags,
            batch_size,
        })
    }

    /// Uniformly random pick among the configured tags.
    fn pick_tag(&self) -> &str {
        let i = rand::thread_rng().gen_range(0..self.tags.len());
        &self.tags[i]
    }

    /// Run until cancelled or until the receiving side of the queue is gone.
    pub async fn run(self, queue: mpsc::Sender<Batch>, cancel: CancellationToken) -> ProducerStats {
        let mut stats = ProducerStats::default();

        while !cancel.is_cancelled() {
            let tag = self.pick_tag().to_string();

            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = self.source.sample(&tag, self.batch_size) => fetched,
            };

            let items = match fetched {
                Ok(items) => items,
                Err(e) => {
                    warn!(source = %tag, error = %e, "fetch failed, retrying");
                    stats.fetch_failures += 1;
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            if items.is_empty() {
                debug!(source = %tag, "empty fetch, skipping");
                stats.empty_fetches += 1;
                tokio::task::yield_now().await;
                continue;
            }

            let batch = Batch::new(tag, items);
            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = queue.send(batch) => {
                    if sent.is_err() {
                        debug!("batch queue closed");
                        break;
                    }
                }
            }
            stats.batches_published += 1;
        }

        info!(
            published = stats.batches_published,
            failures = stats.fetch_failures,
            "batch producer stopped"
        );
        stats
    }

    pub fn spawn(self, queue: mpsc::Sender<Batch>, cancel: CancellationToken) -> JoinHandle<ProducerStats> {
        tokio::spawn(self.run(queue, cancel))
    }
}
