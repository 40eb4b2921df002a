use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use latprobe_client::Scorer;
use latprobe_core::{Batch, RunConfig};
use latprobe_storage::MeasurementSink;

use crate::counter::CompletionCounter;
use crate::error::EngineError;
use crate::producer::BatchProducer;
use crate::report::{LatencyReport, RunSummary};
use crate::throttle::SpikeSchedule;
use crate::worker::{ScoringWorker, WorkerContext, WorkerOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Finalizing,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Finalizing => write!(f, "finalizing"),
            RunState::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub batches_dispatched: u64,
    /// Batches read after the deadline and thrown away.
    pub batches_dropped: u64,
    /// Dispatched batches that carried a non-zero delay.
    pub delayed_batches: u64,
    pub items_dispatched: u64,
    pub recorded: u64,
    pub score_failures: u64,
    pub sink_failures: u64,
    pub panicked: u64,
}

/// Drains the batch queue until the deadline, then waits for every worker
/// it started and reads the report back from the sink.
pub struct RunController {
    config: RunConfig,
    schedule: SpikeSchedule,
    ctx: WorkerContext,
    state: RunState,
    stats: RunStats,
}

impl RunController {
    pub fn new(config: RunConfig, scorer: Arc<dyn Scorer>, sink: Arc<dyn MeasurementSink>) -> Result<Self, EngineError> {
        let schedule = SpikeSchedule::new(config.concurrency_ceiling as f64, config.spike_anchor)?;
        let ctx = WorkerContext::new(scorer, sink).with_max_in_flight(config.max_in_flight);
        Ok(Self {
            config,
            schedule,
            ctx,
            state: RunState::Running,
            stats: RunStats::default(),
        })
    }

    pub fn counter(&self) -> Arc<CompletionCounter> {
        self.ctx.counter.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The queue between producer and controller, `concurrency_ceiling`
    /// batches deep.
    pub fn batch_queue(&self) -> (mpsc::Sender<Batch>, mpsc::Receiver<Batch>) {
        mpsc::channel(self.config.queue_capacity())
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "run state changed");
        self.state = next;
    }

    /// Start a producer on a queue sized by the concurrency ceiling, run to
    /// completion, then stop the producer.
    pub async fn execute(self, producer: BatchProducer) -> Result<RunSummary, EngineError> {
        let (tx, rx) = self.batch_queue();
        let cancel = CancellationToken::new();
        let handle = producer.spawn(tx, cancel.clone());

        let result = self.run(rx).await;

        cancel.cancel();
        let producer_stats = match handle.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(error = %e, "batch producer task failed");
                None
            }
        };

        let mut summary = result?;
        summary.producer = producer_stats;
        Ok(summary)
    }

    /// Consume batches from `batches` until the deadline passes or the queue
    /// closes. The receiver is dropped before waiting on workers.
    pub async fn run(mut self, mut batches: mpsc::Receiver<Batch>) -> Result<RunSummary, EngineError> {
        let started = Instant::now();
        let deadline = self.config.duration;
        let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();

        info!(
            duration_secs = deadline.as_secs_f64(),
            ceiling = self.config.concurrency_ceiling,
            anchor = %self.config.spike_anchor,
            "run started"
        );

        while self.state == RunState::Running {
            let Some(batch) = batches.recv().await else {
                warn!("batch queue closed, finalizing early");
                self.transition(RunState::Finalizing);
                break;
            };

            if started.elapsed() > deadline {
                debug!(source = %batch.source_tag, items = batch.len(), "deadline passed, batch dropped");
                self.stats.batches_dropped += 1;
                self.transition(RunState::Finalizing);
                break;
            }

            self.dispatch(batch, &mut workers);

            while let Some(joined) = workers.try_join_next() {
                self.tally(joined);
            }
        }

        drop(batches);

        info!(outstanding = workers.len(), "waiting for workers");
        while let Some(joined) = workers.join_next().await {
            self.tally(joined);
        }
        self.transition(RunState::Done);

        let report = LatencyReport::collect(self.ctx.sink.as_ref()).await?;
        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            total = report.total,
            dispatched = self.stats.items_dispatched,
            recorded = self.stats.recorded,
            elapsed_secs,
            "run finished"
        );

        Ok(RunSummary {
            report,
            stats: self.stats,
            producer: None,
            elapsed_secs,
        })
    }

    /// One delay per batch, read from the counter before any of its workers
    /// exist.
    fn dispatch(&mut self, batch: Batch, workers: &mut JoinSet<WorkerOutcome>) {
        let count = self.ctx.counter.value();
        let delay = self.schedule.delay(count);
        if !delay.is_zero() {
            self.stats.delayed_batches += 1;
            info!(
                count,
                delay_secs = delay.as_secs(),
                source = %batch.source_tag,
                "inside spike window, delaying batch"
            );
        }

        let tag: Arc<str> = Arc::from(batch.source_tag);
        for item in batch.items {
            workers.spawn(ScoringWorker::new(self.ctx.clone(), tag.clone(), item, delay).run());
            self.stats.items_dispatched += 1;
        }
        self.stats.batches_dispatched += 1;
    }

    fn tally(&mut self, joined: Result<WorkerOutcome, JoinError>) {
        match joined {
            Ok(WorkerOutcome::Recorded { .. }) => self.stats.recorded += 1,
            Ok(WorkerOutcome::ScoreFailed) => self.stats.score_failures += 1,
            Ok(WorkerOutcome::SinkFailed) => self.stats.sink_failures += 1,
            Err(e) => {
                error!(error = %e, "scoring worker panicked");
                self.stats.panicked += 1;
            }
        }
    }
}
