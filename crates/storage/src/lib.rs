pub mod error;
pub mod memory;
pub mod sink;
pub mod sqlite;

pub use error::SinkError;
pub use memory::MemorySink;
pub use sink::{LatencyFilter, MeasurementSink};
pub use sqlite::SqliteSink;
