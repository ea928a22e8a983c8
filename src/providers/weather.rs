//! OpenWeather current-conditions client.

use super::types::{Coordinates, ProviderError, Weather};
use super::{agent, from_ureq, WeatherSource};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: agent(),
        }
    }
}

impl WeatherSource for OpenWeatherClient {
    fn current(&self, city: &str) -> Result<Weather, ProviderError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .agent
            .get(&url)
            .query("q", city)
            .query("appid", &self.api_key)
            .query("units", "metric")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(404, _) => ProviderError::NotFound(city.to_string()),
                other => from_ureq(other),
            })?;

        let body: CurrentWeatherResponse = response
            .into_json()
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        body.into_weather()
    }
}

// ─── Wire format ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct CurrentWeatherResponse {
    name: String,
    coord: WireCoord,
    #[serde(default)]
    weather: Vec<WireCondition>,
    main: WireMain,
    #[serde(default)]
    wind: Option<WireWind>,
    #[serde(default)]
    sys: Option<WireSys>,
    #[serde(default)]
    timezone: i32,
    dt: i64,
}

#[derive(Deserialize)]
struct WireCoord {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct WireCondition {
    main: String,
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Deserialize)]
struct WireMain {
    temp: f64,
    feels_like: f64,
    pressure: f64,
    humidity: u32,
}

#[derive(Deserialize)]
struct WireWind {
    speed: f64,
}

#[derive(Deserialize)]
struct WireSys {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

impl CurrentWeatherResponse {
    fn into_weather(self) -> Result<Weather, ProviderError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no weather condition".into()))?;
        let sys = self.sys.unwrap_or(WireSys {
            country: None,
            sunrise: None,
            sunset: None,
        });

        Ok(Weather {
            city: self.name,
            country: sys.country,
            location: Coordinates {
                lat: self.coord.lat,
                lon: self.coord.lon,
            },
            condition: condition.main,
            description: condition.description,
            icon: condition.icon,
            temperature_c: self.main.temp,
            feels_like_c: self.main.feels_like,
            humidity: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed_ms: self.wind.map(|w| w.speed).unwrap_or(0.0),
            utc_offset_secs: self.timezone,
            sunrise: sys.sunrise,
            sunset: sys.sunset,
            observed_at: self.dt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LONDON: &str = r#"{
        "coord": {"lon": -0.1257, "lat": 51.5085},
        "weather": [{"id": 300, "main": "Drizzle", "description": "light intensity drizzle", "icon": "09d"}],
        "base": "stations",
        "main": {"temp": 7.17, "feels_like": 4.86, "temp_min": 6.1, "temp_max": 8.0, "pressure": 1012, "humidity": 81},
        "visibility": 10000,
        "wind": {"speed": 4.1, "deg": 80},
        "dt": 1704103200,
        "sys": {"type": 2, "id": 2075535, "country": "GB", "sunrise": 1704096357, "sunset": 1704124624},
        "timezone": 0,
        "id": 2643743,
        "name": "London",
        "cod": 200
    }"#;

    fn parse(json: &str) -> Result<Weather, ProviderError> {
        let body: CurrentWeatherResponse = serde_json::from_str(json).unwrap();
        body.into_weather()
    }

    #[test]
    fn test_parse_current_weather() {
        let weather = parse(LONDON).unwrap();
        assert_eq!(weather.city, "London");
        assert_eq!(weather.country.as_deref(), Some("GB"));
        assert_eq!(weather.condition, "Drizzle");
        assert_eq!(weather.icon.as_deref(), Some("09d"));
        assert_eq!(weather.humidity, 81);
        assert_relative_eq!(weather.temperature_c, 7.17);
        assert_relative_eq!(weather.feels_like_c, 4.86);
        assert_relative_eq!(weather.pressure_hpa, 1012.0);
        assert_relative_eq!(weather.wind_speed_ms, 4.1);
        assert_relative_eq!(weather.location.lat, 51.5085, epsilon = 1e-6);
        assert_eq!(weather.sunrise, Some(1704096357));
    }

    #[test]
    fn test_missing_condition_is_invalid() {
        let json = LONDON.replace(
            r#"[{"id": 300, "main": "Drizzle", "description": "light intensity drizzle", "icon": "09d"}]"#,
            "[]",
        );
        assert!(matches!(parse(&json), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_local_observed_time() {
        let json = LONDON.replace(r#""timezone": 0"#, r#""timezone": 3600"#);
        let weather = parse(&json).unwrap();
        let local = weather.local_observed_at().unwrap();
        // 1704103200 is 2024-01-01T10:00:00Z
        assert_eq!(local.to_rfc3339(), "2024-01-01T11:00:00+01:00");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenWeatherClient::with_base_url("key", "http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
    }
}
