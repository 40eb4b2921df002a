//! HTTP collaborators: the random-article source that feeds the load
//! generator and the scoring service under measurement.

pub mod liftwing;
pub mod traits;
pub mod wikipedia;

pub use liftwing::LiftWingScorer;
pub use traits::{ContentSource, ScoreError, Scorer, SourceError};
pub use wikipedia::WikipediaSource;
