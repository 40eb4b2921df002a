pub mod config;
pub mod error;
pub mod item;

pub use config::{Config, RunConfig, SpikeAnchor};
pub use error::*;
pub use item::*;
