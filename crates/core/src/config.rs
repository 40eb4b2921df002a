use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Load an explicitly named env file. Unlike [`load_dotenv`], a missing
/// file is an error.
pub fn load_dotenv_from(path: &Path) -> Result<(), ConfigError> {
    dotenvy::from_path(path)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid("--env-file", path.display().to_string(), e.to_string()))
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn required<L>(lookup: &L, key: &'static str) -> Result<String, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or(ConfigError::Missing(key))
}

fn optional_or<L>(lookup: &L, key: &str, default: &str) -> String
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn optional_parse<L, T>(lookup: &L, key: &'static str) -> Result<Option<T>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string())),
        None => Ok(None),
    }
}

/// Parse a run length given in (possibly fractional) minutes.
pub fn duration_from_minutes(raw: &str) -> Result<Duration, ConfigError> {
    let minutes: f64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| ConfigError::invalid("DURATION", raw, e.to_string()))?;
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(ConfigError::invalid("DURATION", raw, "must be a positive number of minutes"));
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .map_err(|e| ConfigError::invalid("DURATION", raw, e.to_string()))
}

/// Parse the concurrency ceiling. Zero and negative values are rejected.
pub fn parse_ceiling(raw: &str) -> Result<u32, ConfigError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::invalid("LIMIT", raw, e.to_string()))?;
    if value <= 0 {
        return Err(ConfigError::invalid("LIMIT", raw, "must be a positive integer"));
    }
    u32::try_from(value).map_err(|e| ConfigError::invalid("LIMIT", raw, e.to_string()))
}

pub const DEFAULT_BATCH_SIZE: usize = 50;

pub const DEFAULT_SOURCES: &[&str] = &[
    "en", "de", "fr", "it", "es", "ru", "ja", "nl", "pt", "pl", "zh", "sv", "vi", "uk", "ca",
    "no", "fi", "hu", "ko", "id",
];

pub const DEFAULT_SOURCE_URL_TEMPLATE: &str = "https://{tag}.wikipedia.org/w/api.php";

pub const DEFAULT_SCORING_URL: &str =
    "https://api.wikimedia.org/service/lw/inference/v1/models/revertrisk-language-agnostic:predict";

pub const DEFAULT_DATABASE_PATH: &str = "response_times.db";

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunConfig,
    pub source: SourceConfig,
    pub scoring: ScoringConfig,
    pub sink: SinkConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// A value returned by `overrides` wins over the environment.
    pub fn from_env<O>(overrides: O) -> Result<Self, ConfigError>
    where
        O: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| overrides(key).or_else(|| env_opt(key)))
    }

    /// Build config from an arbitrary key lookup. Empty values must be
    /// reported as `None` by the lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            run: RunConfig::from_lookup(&lookup)?,
            source: SourceConfig::from_lookup(&lookup)?,
            scoring: ScoringConfig::from_lookup(&lookup)?,
            sink: SinkConfig::from_lookup(&lookup),
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  run:      duration={:?}, ceiling={}, batch_size={}, anchor={}, max_in_flight={}",
            self.run.duration,
            self.run.concurrency_ceiling,
            self.run.batch_size,
            self.run.spike_anchor,
            self.run
                .max_in_flight
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );
        tracing::info!(
            "  source:   {} tags, url={}",
            self.source.tags.len(),
            self.source.url_template
        );
        tracing::info!("  scoring:  url={}", self.scoring.url);
        tracing::info!("  sink:     database={}", self.sink.database_path.display());
    }
}

// ── Run ───────────────────────────────────────────────────────

/// Where the linear delay model is evaluated from inside a spike window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeAnchor {
    /// Evaluate at the raw completion count.
    #[default]
    Origin,
    /// Evaluate at the distance from the current window's lower edge.
    Window,
}

impl FromStr for SpikeAnchor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "origin" => Ok(SpikeAnchor::Origin),
            "window" => Ok(SpikeAnchor::Window),
            _ => Err(ConfigError::invalid("SPIKE_ANCHOR", s, "expected origin|window")),
        }
    }
}

impl fmt::Display for SpikeAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpikeAnchor::Origin => write!(f, "origin"),
            SpikeAnchor::Window => write!(f, "window"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub duration: Duration,
    /// Scales the spike windows and sizes the batch queue.
    pub concurrency_ceiling: u32,
    pub batch_size: usize,
    pub spike_anchor: SpikeAnchor,
    /// Upper bound on concurrently running workers; `None` means unbounded.
    pub max_in_flight: Option<usize>,
}

impl RunConfig {
    pub fn new(duration: Duration, concurrency_ceiling: u32) -> Self {
        Self {
            duration,
            concurrency_ceiling,
            batch_size: DEFAULT_BATCH_SIZE,
            spike_anchor: SpikeAnchor::Origin,
            max_in_flight: None,
        }
    }

    fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let duration = duration_from_minutes(&required(lookup, "DURATION")?)?;
        let concurrency_ceiling = parse_ceiling(&required(lookup, "LIMIT")?)?;

        let batch_size = optional_parse::<_, usize>(lookup, "BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::invalid("BATCH_SIZE", "0", "must be at least 1"));
        }

        let spike_anchor = match lookup("SPIKE_ANCHOR") {
            Some(raw) => raw.parse()?,
            None => SpikeAnchor::Origin,
        };

        let max_in_flight = optional_parse::<_, usize>(lookup, "MAX_IN_FLIGHT")?;
        if max_in_flight == Some(0) {
            return Err(ConfigError::invalid("MAX_IN_FLIGHT", "0", "must be at least 1"));
        }

        Ok(Self {
            duration,
            concurrency_ceiling,
            batch_size,
            spike_anchor,
            max_in_flight,
        })
    }

    /// Capacity of the batch queue between producer and controller.
    pub fn queue_capacity(&self) -> usize {
        self.concurrency_ceiling as usize
    }
}

// ── Content source ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub tags: Vec<String>,
    /// Endpoint URL; `{tag}` is replaced with the source tag.
    pub url_template: String,
    pub timeout: Option<Duration>,
}

impl SourceConfig {
    fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let tags: Vec<String> = match lookup("SOURCES") {
            Some(raw) => raw
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => DEFAULT_SOURCES.iter().map(|t| t.to_string()).collect(),
        };
        if tags.is_empty() {
            return Err(ConfigError::invalid("SOURCES", "", "at least one source tag is required"));
        }

        let timeout = optional_parse::<_, u64>(lookup, "HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            tags,
            url_template: optional_or(lookup, "SOURCE_URL_TEMPLATE", DEFAULT_SOURCE_URL_TEMPLATE),
            timeout,
        })
    }
}

// ── Scoring ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct ScoringConfig {
    pub url: String,
    pub access_token: String,
}

impl ScoringConfig {
    fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: optional_or(lookup, "SCORING_URL", DEFAULT_SCORING_URL),
            access_token: required(lookup, "ACCESS_TOKEN")?,
        })
    }
}

impl fmt::Debug for ScoringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringConfig")
            .field("url", &self.url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

// ── Sink ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub database_path: PathBuf,
}

impl SinkConfig {
    fn from_lookup<L>(lookup: &L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        Self {
            database_path: PathBuf::from(optional_or(lookup, "DATABASE_PATH", DEFAULT_DATABASE_PATH)),
        }
    }
}
