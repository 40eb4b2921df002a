use thiserror::Error;

use latprobe_core::ConfigError;
use latprobe_storage::SinkError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("report query failed: {0}")]
    Sink(#[from] SinkError),

    #[error("no content sources configured")]
    NoSources,
}
