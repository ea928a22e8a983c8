//! Core types shared by the providers, the cache and the API.

use crate::hours::{OpenStatus, WeeklyHours};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A place returned by the places API, with its last computed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    /// Average rating (1.0 to 5.0)
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub location: Option<Coordinates>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub opening_hours: Option<WeeklyHours>,
    /// Offset of the place's local time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    /// IANA timezone id (e.g. "Europe/Paris")
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Overwritten wholesale whenever the status is recomputed.
    #[serde(default)]
    pub open_status: OpenStatus,
}

/// Current weather for a city. Temperatures in °C, wind in m/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    pub location: Coordinates,
    pub condition: String,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity: u32,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    /// Shift from UTC in seconds.
    pub utc_offset_secs: i32,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
    /// Observation time, unix seconds.
    pub observed_at: i64,
}

impl Weather {
    /// Observation time on the city's own clock.
    pub fn local_observed_at(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.utc_offset_secs)?;
        DateTime::from_timestamp(self.observed_at, 0).map(|utc| utc.with_timezone(&offset))
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
    #[error("no results for '{0}'")]
    NotFound(String),
    #[error("offline and '{0}' is not cached")]
    Offline(String),
}
