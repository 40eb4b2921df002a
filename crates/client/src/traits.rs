use async_trait::async_trait;
use thiserror::Error;

use latprobe_core::SampledItem;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scoring service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Raised by in-process scorers (tests, dry runs).
    #[error("scoring rejected: {0}")]
    Rejected(String),
}

/// A service that hands out random articles for one source tag.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch up to `count` items from `source_tag`. Fewer may come back.
    async fn sample(&self, source_tag: &str, count: usize) -> Result<Vec<SampledItem>, SourceError>;
}

/// The service whose latency is being measured.
///
/// Only success or failure matters; the score payload is never inspected.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, source_tag: &str, item_id: i64) -> Result<(), ScoreError>;
}
