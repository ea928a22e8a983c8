//! City explorer: orchestrates the lookup chain.
//!
//! Places:  cache → places API (top-rated first, status stamped) → cache
//! Weather: cache → weather API → cache
//! Refresh: evict expired entries, then recompute every cached place's status.

use crate::cache::TtlCache;
use crate::config::{AppConfig, StatusClock};
use crate::hours::{self, OpenStatus};
use crate::providers::{
    GooglePlacesClient, OpenWeatherClient, Place, PlacesSource, ProviderError, Weather,
    WeatherSource,
};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_PLACES_LIMIT: usize = 10;

/// Where a piece of a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    Cache,
    Api,
}

/// Everything the explorer knows about one city or country.
#[derive(Debug, Clone, Serialize)]
pub struct CityReport {
    pub query: String,
    pub places: Vec<Place>,
    pub places_source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_source: Option<Source>,
    /// Why weather is missing, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_error: Option<String>,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub weather_evicted: usize,
    pub places_evicted: usize,
    pub places_updated: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evicted {} weather / {} places entries, updated {} place statuses",
            self.weather_evicted, self.places_evicted, self.places_updated
        )
    }
}

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("empty query")]
    EmptyQuery,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The explorer with its caches and upstream sources.
pub struct CityExplorer {
    places_cache: TtlCache<Vec<Place>>,
    weather_cache: TtlCache<Weather>,
    places_source: Option<Box<dyn PlacesSource>>,
    weather_source: Option<Box<dyn WeatherSource>>,
    status_clock: StatusClock,
    places_limit: usize,
    offline: bool,
}

impl CityExplorer {
    /// An explorer with no upstream sources: it answers from cache only.
    pub fn new(places_cache: TtlCache<Vec<Place>>, weather_cache: TtlCache<Weather>) -> Self {
        Self {
            places_cache,
            weather_cache,
            places_source: None,
            weather_source: None,
            status_clock: StatusClock::default(),
            places_limit: DEFAULT_PLACES_LIMIT,
            offline: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let places_cache = TtlCache::load_from(config.places_cache_path(), config.places_ttl);
        let weather_cache = TtlCache::load_from(config.weather_cache_path(), config.weather_ttl);
        let mut explorer = Self::new(places_cache, weather_cache)
            .with_clock(config.status_clock)
            .with_limit(config.places_limit);
        if let Some(keys) = &config.api_keys {
            explorer = explorer.with_sources(
                Box::new(GooglePlacesClient::new(keys.places.clone())),
                Box::new(OpenWeatherClient::new(keys.weather.clone())),
            );
        }
        explorer.set_offline(config.offline);
        explorer
    }

    pub fn with_sources(
        mut self,
        places: Box<dyn PlacesSource>,
        weather: Box<dyn WeatherSource>,
    ) -> Self {
        self.places_source = Some(places);
        self.weather_source = Some(weather);
        self
    }

    pub fn with_clock(mut self, clock: StatusClock) -> Self {
        self.status_clock = clock;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.places_limit = limit;
        self
    }

    /// Set offline mode: skip upstream calls.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Top-rated places for a city or country, with live statuses.
    pub fn places(&mut self, query: &str) -> Result<(Vec<Place>, Source), ExploreError> {
        let key = normalize_query(query)?;
        let now = Utc::now();

        if let Some(mut places) = self.places_cache.get(&key) {
            debug!(query = %key, "places cache hit");
            // Statuses move with the clock even when the listing doesn't.
            for place in &mut places {
                place.open_status = place_status(place, now, self.status_clock);
            }
            return Ok((places, Source::Cache));
        }

        let source = match (&self.places_source, self.offline) {
            (Some(source), false) => source,
            _ => return Err(ProviderError::Offline(key).into()),
        };
        let mut places = source.search(&key, self.places_limit)?;
        rank_top_rated(&mut places, self.places_limit);
        for place in &mut places {
            place.open_status = place_status(place, now, self.status_clock);
        }

        info!(query = %key, count = places.len(), "fetched places");
        self.places_cache.put(&key, places.clone());
        Ok((places, Source::Api))
    }

    /// Current weather for a city.
    pub fn weather(&mut self, city: &str) -> Result<(Weather, Source), ExploreError> {
        let key = normalize_query(city)?;

        if let Some(weather) = self.weather_cache.get(&key) {
            debug!(city = %key, "weather cache hit");
            return Ok((weather, Source::Cache));
        }

        let source = match (&self.weather_source, self.offline) {
            (Some(source), false) => source,
            _ => return Err(ProviderError::Offline(key).into()),
        };
        let weather = source.current(&key)?;

        info!(city = %key, condition = %weather.condition, "fetched weather");
        self.weather_cache.put(&key, weather.clone());
        Ok((weather, Source::Api))
    }

    /// Places and weather together. Missing weather does not fail the report.
    pub fn search(&mut self, query: &str) -> Result<CityReport, ExploreError> {
        let (places, places_source) = self.places(query)?;

        let (weather, weather_source, weather_error) = match self.weather(query) {
            Ok((weather, source)) => (Some(weather), Some(source), None),
            Err(e) => {
                warn!(query = %query.trim(), error = %e, "weather unavailable");
                (None, None, Some(e.to_string()))
            }
        };

        Ok(CityReport {
            query: query.trim().to_string(),
            places,
            places_source,
            weather,
            weather_source,
            weather_error,
        })
    }

    /// Evict expired cache entries and recompute the status of every cached place.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> RefreshSummary {
        let now_ms = now.timestamp_millis();
        let weather_evicted = self.weather_cache.evict_expired(now_ms);
        let places_evicted = self.places_cache.evict_expired(now_ms);

        let clock = self.status_clock;
        let places_updated = self.places_cache.update_all(now_ms, |places| {
            let mut changed = 0;
            for place in places.iter_mut() {
                let status = place_status(place, now, clock);
                if status != place.open_status {
                    place.open_status = status;
                    changed += 1;
                }
            }
            changed
        });

        RefreshSummary {
            weather_evicted,
            places_evicted,
            places_updated,
        }
    }
}

/// Human-readable summary of a report, for the terminal.
pub fn render_summary(report: &CityReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {}\n", report.query));

    match &report.weather {
        Some(w) => {
            out.push_str(&format!(
                "  {:.1}°C (feels {:.1}°C), {}, humidity {}%, wind {:.1} m/s",
                w.temperature_c, w.feels_like_c, w.description, w.humidity, w.wind_speed_ms
            ));
            if let Some(local) = w.local_observed_at() {
                out.push_str(&format!(", observed {} local", local.format("%H:%M")));
            }
            out.push('\n');
        }
        None => out.push_str("  weather unavailable\n"),
    }

    out.push('\n');
    for (i, place) in report.places.iter().enumerate() {
        let rating = place
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| " -- ".into());
        out.push_str(&format!(
            "  {:>2}. {} {:<40} [{}]\n",
            i + 1,
            rating,
            place.name,
            place.open_status
        ));
    }
    out
}

/// Status of `place` at `now`. With [`StatusClock::Local`] the place's IANA
/// timezone is preferred, then its UTC offset, then UTC.
pub fn place_status(place: &Place, now: DateTime<Utc>, clock: StatusClock) -> OpenStatus {
    let weekly = place.opening_hours.as_ref();
    if clock == StatusClock::Utc {
        return hours::resolve(weekly, &now);
    }
    if let Some(tz) = place.time_zone.as_deref().and_then(|id| id.parse::<Tz>().ok()) {
        return hours::resolve(weekly, &now.with_timezone(&tz));
    }
    match place
        .utc_offset_minutes
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
    {
        Some(offset) => hours::resolve(weekly, &now.with_timezone(&offset)),
        None => hours::resolve(weekly, &now),
    }
}

/// Highest rating first (unrated last), ties broken by number of ratings.
fn rank_top_rated(places: &mut Vec<Place>, limit: usize) {
    places.sort_by(|a, b| {
        let ra = a.rating.unwrap_or(f64::MIN);
        let rb = b.rating.unwrap_or(f64::MIN);
        rb.total_cmp(&ra)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
    });
    places.truncate(limit);
}

fn normalize_query(query: &str) -> Result<String, ExploreError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ExploreError::EmptyQuery);
    }
    Ok(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}
