//! Startup configuration.
//!
//! Every setting is collected once (CLI flags, falling back to environment
//! variables and `.env`) into [`ConfigArgs`], then validated into an
//! [`AppConfig`]. Nothing reads the environment after that point.

use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const MAX_PLACES_LIMIT: usize = 20;

/// Which wall clock opening hours are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClock {
    /// The place's own timezone (falls back to UTC when unknown).
    #[default]
    Local,
    /// Always UTC, regardless of where the place is.
    Utc,
}

/// Configuration errors, reported before the service starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0} (set it in the environment or .env)")]
    MissingKey(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("could not determine a cache directory; set CITYZEN_CACHE_DIR")]
    NoCacheDir,
}

/// Raw, unvalidated settings.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Weather API key.
    #[arg(long, env = "WEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    /// Places API key.
    #[arg(long, env = "PLACES_API_KEY", hide_env_values = true)]
    pub places_api_key: Option<String>,

    /// Directory for the response caches. Defaults to ~/.cityzen.
    #[arg(long, env = "CITYZEN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// How long a weather response stays fresh.
    #[arg(long, env = "WEATHER_TTL_SECS", default_value_t = 3600)]
    pub weather_ttl_secs: u64,

    /// How long a places response stays fresh.
    #[arg(long, env = "PLACES_TTL_SECS", default_value_t = 86400)]
    pub places_ttl_secs: u64,

    /// Period of the cache eviction / status refresh job.
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 900)]
    pub refresh_interval_secs: u64,

    /// Number of top-rated places returned per search (1-20).
    #[arg(long, env = "PLACES_LIMIT", default_value_t = 10)]
    pub places_limit: usize,

    /// Clock used for "open now": the place's local time or UTC.
    #[arg(long, env = "STATUS_CLOCK", value_enum, default_value_t = StatusClock::Local)]
    pub status_clock: StatusClock,

    /// Token required by the admin routes. Admin routes are disabled when unset.
    #[arg(long, env = "CITYZEN_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Offline mode: only serve what is already cached.
    #[arg(long, env = "CITYZEN_OFFLINE")]
    pub offline: bool,
}

/// Credentials for the two upstream APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeys {
    pub weather: String,
    pub places: String,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` only in offline mode.
    pub api_keys: Option<ApiKeys>,
    pub cache_dir: PathBuf,
    pub weather_ttl: Duration,
    pub places_ttl: Duration,
    pub refresh_interval: Duration,
    pub places_limit: usize,
    pub status_clock: StatusClock,
    pub admin_token: Option<String>,
    pub offline: bool,
}

impl ConfigArgs {
    pub fn validate(self) -> Result<AppConfig, ConfigError> {
        let weather_key = non_blank(self.weather_api_key);
        let places_key = non_blank(self.places_api_key);

        let api_keys = match (weather_key, places_key) {
            (Some(weather), Some(places)) => Some(ApiKeys { weather, places }),
            _ if self.offline => None,
            (None, _) => return Err(ConfigError::MissingKey("WEATHER_API_KEY")),
            (_, None) => return Err(ConfigError::MissingKey("PLACES_API_KEY")),
        };

        let weather_ttl = positive_secs("WEATHER_TTL_SECS", self.weather_ttl_secs)?;
        let places_ttl = positive_secs("PLACES_TTL_SECS", self.places_ttl_secs)?;
        let refresh_interval = positive_secs("REFRESH_INTERVAL_SECS", self.refresh_interval_secs)?;

        if !(1..=MAX_PLACES_LIMIT).contains(&self.places_limit) {
            return Err(ConfigError::InvalidValue {
                field: "PLACES_LIMIT",
                reason: format!("must be between 1 and {}, got {}", MAX_PLACES_LIMIT, self.places_limit),
            });
        }

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .map(|home| home.join(".cityzen"))
                .ok_or(ConfigError::NoCacheDir)?,
        };

        Ok(AppConfig {
            api_keys,
            cache_dir,
            weather_ttl,
            places_ttl,
            refresh_interval,
            places_limit: self.places_limit,
            status_clock: self.status_clock,
            admin_token: non_blank(self.admin_token),
            offline: self.offline,
        })
    }
}

impl AppConfig {
    pub fn weather_cache_path(&self) -> PathBuf {
        self.cache_dir.join("weather.json")
    }

    pub fn places_cache_path(&self) -> PathBuf {
        self.cache_dir.join("places.json")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive_secs(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
