use std::path::PathBuf;

use clap::Parser;

/// Adaptive load generator for a scoring service.
///
/// Samples random articles, scores each one concurrently, and injects
/// long pauses at fixed points of the run to expose cold-cache behaviour.
/// Every option not given here is read from the environment (or `.env`).
#[derive(Parser, Debug)]
#[command(name = "latprobe", version, about)]
pub struct Cli {
    /// Env file to load instead of `./.env`.
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Run length in minutes. Overrides DURATION.
    #[arg(long)]
    pub duration: Option<String>,

    /// Concurrency ceiling. Overrides LIMIT.
    #[arg(long)]
    pub limit: Option<String>,

    /// SQLite file for measurements. Overrides DATABASE_PATH.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Print the run summary as JSON instead of the plain report.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Value given on the command line for a configuration key.
    pub fn override_for(&self, key: &str) -> Option<String> {
        match key {
            "DURATION" => self.duration.clone(),
            "LIMIT" => self.limit.clone(),
            "DATABASE_PATH" => self.database.as_ref().map(|p| p.display().to_string()),
            _ => None,
        }
    }
}
