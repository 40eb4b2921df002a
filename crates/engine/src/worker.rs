use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use latprobe_client::Scorer;
use latprobe_core::{Measurement, SampledItem};
use latprobe_storage::MeasurementSink;

use crate::counter::CompletionCounter;

/// Handles every worker shares. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct WorkerContext {
    pub scorer: Arc<dyn Scorer>,
    pub sink: Arc<dyn MeasurementSink>,
    pub counter: Arc<CompletionCounter>,
    /// Caps concurrently scoring workers when set.
    pub limiter: Option<Arc<Semaphore>>,
}

impl WorkerContext {
    pub fn new(scorer: Arc<dyn Scorer>, sink: Arc<dyn MeasurementSink>) -> Self {
        Self {
            scorer,
            sink,
            counter: Arc::new(CompletionCounter::new()),
            limiter: None,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.limiter = max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// Measured and written to the sink.
    Recorded { elapsed_secs: f64 },
    /// The scoring call failed; nothing was counted or written.
    ScoreFailed,
    /// Measured and counted, but the sink rejected the write.
    SinkFailed,
}

/// One scoring call for one sampled item.
pub struct ScoringWorker {
    ctx: WorkerContext,
    source_tag: Arc<str>,
    item: SampledItem,
    delay: Duration,
}

impl ScoringWorker {
    pub fn new(ctx: WorkerContext, source_tag: Arc<str>, item: SampledItem, delay: Duration) -> Self {
        Self {
            ctx,
            source_tag,
            item,
            delay,
        }
    }

    pub async fn run(self) -> WorkerOutcome {
        // Sleeping workers hold no permit and no lock.
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let permit = match &self.ctx.limiter {
            Some(limiter) => limiter.clone().acquire_owned().await.ok(),
            None => None,
        };

        let started = Instant::now();
        let scored = self.ctx.scorer.score(&self.source_tag, self.item.id).await;
        let elapsed_secs = started.elapsed().as_secs_f64();
        drop(permit);

        if let Err(e) = scored {
            warn!(
                source = %self.source_tag,
                item_id = self.item.id,
                error = %e,
                "scoring call failed, measurement dropped"
            );
            return WorkerOutcome::ScoreFailed;
        }

        self.ctx.counter.increment();

        let measurement = Measurement::new(self.item.id, &*self.source_tag, elapsed_secs);
        match self.ctx.sink.record(&measurement).await {
            Ok(()) => {
                debug!(source = %self.source_tag, item_id = self.item.id, elapsed_secs, "measurement recorded");
                WorkerOutcome::Recorded { elapsed_secs }
            }
            Err(e) => {
                warn!(
                    source = %self.source_tag,
                    item_id = self.item.id,
                    error = %e,
                    "failed to write measurement"
                );
                WorkerOutcome::SinkFailed
            }
        }
    }
}
