//! Google Places (New) text-search client.

use super::types::{Coordinates, Place, ProviderError};
use super::{agent, from_ureq, PlacesSource};
use crate::hours::{OpenStatus, WeeklyHours};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://places.googleapis.com";

/// Fields requested from the API; everything else is billed for nothing.
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,\
places.rating,places.userRatingCount,places.location,places.types,\
places.regularOpeningHours.weekdayDescriptions,places.utcOffsetMinutes,places.timeZone";

pub struct GooglePlacesClient {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl GooglePlacesClient {
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

impl PlacesSource for GooglePlacesClient {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, ProviderError> {
        let url = format!("{}/v1/places:searchText", self.base_url);
        let response = self
            .agent
            .post(&url)
            .set("X-Goog-Api-Key", &self.api_key)
            .set("X-Goog-FieldMask", FIELD_MASK)
            .send_json(serde_json::json!({
                "textQuery": text_query(query),
                "pageSize": limit,
                // the hours resolver reads English weekday names
                "languageCode": "en",
            }))
            .map_err(from_ureq)?;

        let body: SearchTextResponse = response
            .into_json()
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if body.places.is_empty() {
            return Err(ProviderError::NotFound(query.to_string()));
        }

        Ok(body.places.into_iter().map(WirePlace::into_place).collect())
    }
}

fn text_query(query: &str) -> String {
    format!("top places in {}", query.trim())
}

// ─── Wire format ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<WirePlace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlace {
    id: String,
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_rating_count: Option<u32>,
    #[serde(default)]
    location: Option<LatLng>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    regular_opening_hours: Option<OpeningHours>,
    #[serde(default)]
    utc_offset_minutes: Option<i32>,
    #[serde(default)]
    time_zone: Option<TimeZoneId>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}

#[derive(Deserialize)]
struct TimeZoneId {
    id: String,
}

impl WirePlace {
    fn into_place(self) -> Place {
        let name = self
            .display_name
            .map(|d| d.text)
            .unwrap_or_else(|| self.id.clone());
        let opening_hours = self
            .regular_opening_hours
            .map(|h| h.weekday_descriptions)
            .filter(|lines| !lines.is_empty())
            .map(WeeklyHours::new);

        Place {
            id: self.id,
            name,
            address: self.formatted_address,
            rating: self.rating,
            rating_count: self.user_rating_count.unwrap_or(0),
            location: self.location.map(|l| Coordinates {
                lat: l.latitude,
                lon: l.longitude,
            }),
            types: self.types,
            opening_hours,
            utc_offset_minutes: self.utc_offset_minutes,
            time_zone: self.time_zone.map(|tz| tz.id),
            open_status: OpenStatus::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    const PARIS: &str = r#"{
        "places": [
            {
                "id": "ChIJLU7jZClu5kcR4PcOOO6p3I0",
                "types": ["tourist_attraction", "point_of_interest"],
                "formattedAddress": "Av. Gustave Eiffel, 75007 Paris, France",
                "location": {"latitude": 48.8584, "longitude": 2.2945},
                "rating": 4.7,
                "userRatingCount": 412345,
                "utcOffsetMinutes": 60,
                "timeZone": {"id": "Europe/Paris"},
                "regularOpeningHours": {
                    "weekdayDescriptions": [
                        "Monday: 9:30 AM – 11:45 PM",
                        "Tuesday: 9:30 AM – 11:45 PM",
                        "Wednesday: 9:30 AM – 11:45 PM",
                        "Thursday: 9:30 AM – 11:45 PM",
                        "Friday: 9:30 AM – 11:45 PM",
                        "Saturday: 9:30 AM – 11:45 PM",
                        "Sunday: 9:30 AM – 11:45 PM"
                    ]
                },
                "displayName": {"text": "Eiffel Tower", "languageCode": "en"}
            },
            {
                "id": "no-hours",
                "rating": 4.1,
                "regularOpeningHours": {"weekdayDescriptions": []}
            }
        ]
    }"#;

    fn parse(json: &str) -> Vec<Place> {
        let body: SearchTextResponse = serde_json::from_str(json).unwrap();
        body.places.into_iter().map(WirePlace::into_place).collect()
    }

    #[test]
    fn test_parse_places() {
        let places = parse(PARIS);
        assert_eq!(places.len(), 2);

        let tower = &places[0];
        assert_eq!(tower.name, "Eiffel Tower");
        assert_eq!(tower.rating, Some(4.7));
        assert_eq!(tower.rating_count, 412345);
        assert_eq!(tower.time_zone.as_deref(), Some("Europe/Paris"));
        assert_eq!(tower.utc_offset_minutes, Some(60));
        assert_eq!(tower.open_status, OpenStatus::Unavailable);

        let hours = tower.opening_hours.as_ref().unwrap();
        assert_eq!(hours.lines().len(), 7);
        assert!(hours.entry_for(Weekday::Wed).unwrap().starts_with("Wednesday: 9:30"));
    }

    #[test]
    fn test_missing_fields_default() {
        let places = parse(PARIS);
        let bare = &places[1];
        assert_eq!(bare.name, "no-hours");
        assert_eq!(bare.rating_count, 0);
        assert!(bare.opening_hours.is_none());
        assert!(bare.location.is_none());
    }

    #[test]
    fn test_empty_response() {
        assert!(parse("{}").is_empty());
    }

    #[test]
    fn test_text_query() {
        assert_eq!(text_query("  Lisbon "), "top places in Lisbon");
    }
}
