use async_trait::async_trait;
use tokio::sync::Mutex;

use latprobe_core::Measurement;

use crate::error::SinkError;
use crate::sink::{LatencyFilter, MeasurementSink};

/// In-process sink. Nothing survives the process.
#[derive(Default)]
pub struct MemorySink {
    measurements: Mutex<Vec<Measurement>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in write order.
    pub async fn snapshot(&self) -> Vec<Measurement> {
        self.measurements.lock().await.clone()
    }
}

#[async_trait]
impl MeasurementSink for MemorySink {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        self.measurements.lock().await.push(measurement.clone());
        Ok(())
    }

    async fn count_where(&self, filter: LatencyFilter) -> Result<u64, SinkError> {
        let measurements = self.measurements.lock().await;
        Ok(measurements
            .iter()
            .filter(|m| filter.matches(m.elapsed_secs))
            .count() as u64)
    }

    async fn total_count(&self) -> Result<u64, SinkError> {
        Ok(self.measurements.lock().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn counts_by_filter() {
        let sink = MemorySink::new();
        for (i, secs) in [0.1, 0.25, 0.4, 0.9].into_iter().enumerate() {
            sink.record(&Measurement::new(i as i64, "en", secs)).await.unwrap();
        }
        assert_eq!(sink.total_count().await.unwrap(), 4);
        assert_eq!(sink.count_where(LatencyFilter::AtMost(0.2)).await.unwrap(), 1);
        assert_eq!(sink.count_where(LatencyFilter::AtMost(0.5)).await.unwrap(), 3);
        assert_eq!(sink.count_where(LatencyFilter::Above(0.5)).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_all_kept() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..200)
            .map(|i| {
                let sink = sink.clone();
                tokio::spawn(async move {
                    sink.record(&Measurement::new(i, "ja", 0.01)).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(sink.total_count().await.unwrap(), 200);
        assert_eq!(sink.snapshot().await.len(), 200);
    }
}
