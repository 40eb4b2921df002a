use std::fmt;

use serde::Serialize;

use latprobe_storage::{LatencyFilter, MeasurementSink, SinkError};

use crate::controller::RunStats;
use crate::producer::ProducerStats;

/// Bucket edges in seconds.
pub const FAST_SECS: f64 = 0.2;
pub const OK_SECS: f64 = 0.3;
pub const SLOW_SECS: f64 = 0.5;

/// Latency distribution read back from the sink once the run is over.
///
/// The three "within" buckets are cumulative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyReport {
    pub total: u64,
    pub within_200ms: u64,
    pub within_300ms: u64,
    pub within_500ms: u64,
    pub above_500ms: u64,
}

impl LatencyReport {
    pub async fn collect(sink: &dyn MeasurementSink) -> Result<Self, SinkError> {
        Ok(Self {
            total: sink.total_count().await?,
            within_200ms: sink.count_where(LatencyFilter::AtMost(FAST_SECS)).await?,
            within_300ms: sink.count_where(LatencyFilter::AtMost(OK_SECS)).await?,
            within_500ms: sink.count_where(LatencyFilter::AtMost(SLOW_SECS)).await?,
            above_500ms: sink.count_where(LatencyFilter::Above(SLOW_SECS)).await?,
        })
    }

    /// `part` as a percentage of the total; 0 for an empty report.
    pub fn percent(&self, part: u64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        part as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total requests: {}", self.total)?;
        writeln!(f, "200ms and under: {:.2}%", self.percent(self.within_200ms))?;
        writeln!(f, "300ms and under: {:.2}%", self.percent(self.within_300ms))?;
        writeln!(f, "500ms and under: {:.2}%", self.percent(self.within_500ms))?;
        write!(f, "Above 500ms: {:.2}%", self.percent(self.above_500ms))
    }
}

/// Everything a finished run has to say about itself.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub report: LatencyReport,
    pub stats: RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<ProducerStats>,
    pub elapsed_secs: f64,
}
