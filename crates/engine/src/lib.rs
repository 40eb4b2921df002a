pub mod controller;
pub mod counter;
pub mod error;
pub mod producer;
pub mod report;
pub mod throttle;
pub mod worker;

pub use controller::{RunController, RunState, RunStats};
pub use counter::CompletionCounter;
pub use error::EngineError;
pub use producer::{BatchProducer, ProducerStats};
pub use report::{LatencyReport, RunSummary};
pub use throttle::SpikeSchedule;
pub use worker::{ScoringWorker, WorkerContext, WorkerOutcome};
