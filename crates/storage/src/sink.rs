//! Measurement sink trait and latency predicates.

use async_trait::async_trait;

use latprobe_core::Measurement;

use crate::error::SinkError;

/// Predicate over a measurement's elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyFilter {
    /// `elapsed <= secs`
    AtMost(f64),
    /// `elapsed > secs`
    Above(f64),
}

impl LatencyFilter {
    pub fn matches(&self, elapsed_secs: f64) -> bool {
        match *self {
            LatencyFilter::AtMost(secs) => elapsed_secs <= secs,
            LatencyFilter::Above(secs) => elapsed_secs > secs,
        }
    }
}

/// Destination for measurements.
///
/// Implementations must accept concurrent `record` calls from many workers;
/// any serialization they need happens internally.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError>;

    async fn count_where(&self, filter: LatencyFilter) -> Result<u64, SinkError>;

    async fn total_count(&self) -> Result<u64, SinkError>;
}
