use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::explorer::{CityExplorer, CityReport, ExploreError, Source};
use crate::hours::{self, OpenStatus, WeeklyHours};
use crate::providers::{Place, ProviderError, Weather};
use crate::usage::{ServiceId, ServiceUsage, UsageError, UsageRecord};

use super::state::AppState;

/// Identifies the caller whose quota a request is charged to.
pub const USER_HEADER: &str = "x-user-id";
pub const ADMIN_HEADER: &str = "x-admin-token";

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

impl From<ExploreError> for ApiError {
    fn from(err: ExploreError) -> Self {
        let status = match &err {
            ExploreError::EmptyQuery => StatusCode::BAD_REQUEST,
            ExploreError::Provider(ProviderError::NotFound(_)) => StatusCode::NOT_FOUND,
            ExploreError::Provider(ProviderError::Offline(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ExploreError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        api_error(status, err.to_string())
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        let status = match &err {
            UsageError::UnknownService(_) => StatusCode::BAD_REQUEST,
            UsageError::NotGranted(_) => StatusCode::FORBIDDEN,
            UsageError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        };
        api_error(status, err.to_string())
    }
}

// ─── GET /health ─────────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── GET /api/search ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchQuery>,
) -> Result<Json<CityReport>, ApiError> {
    let start = Instant::now();
    let query = required(params.query, "query")?;
    charge(&state, &headers, ServiceId::Places)?;

    let q = query.clone();
    let report = with_explorer(&state, move |explorer| explorer.search(&q)).await?;

    info!(
        query = %query,
        places = report.places.len(),
        weather = report.weather.is_some(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/search"
    );
    Ok(Json(report))
}

// ─── GET /api/places ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct PlacesResponse {
    pub query: String,
    pub source: Source,
    pub places: Vec<Place>,
}

pub async fn places(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchQuery>,
) -> Result<Json<PlacesResponse>, ApiError> {
    let start = Instant::now();
    let query = required(params.query, "query")?;
    charge(&state, &headers, ServiceId::Places)?;

    let q = query.clone();
    let (places, source) = with_explorer(&state, move |explorer| explorer.places(&q)).await?;

    info!(
        query = %query,
        count = places.len(),
        source = ?source,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/places"
    );
    Ok(Json(PlacesResponse { query, source, places }))
}

// ─── GET /api/weather ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

#[derive(Serialize)]
pub struct WeatherResponse {
    pub source: Source,
    pub weather: Weather,
}

pub async fn weather(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let start = Instant::now();
    let city = required(params.city, "city")?;
    charge(&state, &headers, ServiceId::Weather)?;

    let c = city.clone();
    let (weather, source) = with_explorer(&state, move |explorer| explorer.weather(&c)).await?;

    info!(
        city = %city,
        source = ?source,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/weather"
    );
    Ok(Json(WeatherResponse { source, weather }))
}

// ─── POST /api/status ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StatusRequest {
    pub weekday_descriptions: Vec<String>,
    /// IANA timezone to read the hours in. UTC when absent.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Instant to evaluate at. Now when absent.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: OpenStatus,
    pub evaluated_at: String,
}

pub async fn status(Json(req): Json<StatusRequest>) -> Result<Json<StatusResponse>, ApiError> {
    let hours = WeeklyHours::new(req.weekday_descriptions);
    let at = req.at.unwrap_or_else(Utc::now);

    let (status, evaluated_at) = match req.timezone.as_deref() {
        Some(id) => {
            let tz: Tz = id.parse().map_err(|_| {
                api_error(StatusCode::BAD_REQUEST, format!("Unknown timezone '{}'", id))
            })?;
            let local = at.with_timezone(&tz);
            (hours::resolve(Some(&hours), &local), local.to_rfc3339())
        }
        None => (hours::resolve(Some(&hours), &at), at.to_rfc3339()),
    };

    Ok(Json(StatusResponse { status, evaluated_at }))
}

// ─── Admin: /api/users/{user}/services ───────────────────────────

#[derive(Deserialize)]
pub struct GrantBody {
    pub max_requests: u32,
}

pub async fn user_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user): Path<String>,
) -> Result<Json<ServiceUsage>, ApiError> {
    require_admin(&state, &headers)?;
    let ledger = state.ledger.lock().unwrap_or_else(|p| p.into_inner());
    Ok(Json(ledger.usage(&user)))
}

pub async fn grant_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user, service)): Path<(String, String)>,
    Json(body): Json<GrantBody>,
) -> Result<Json<UsageRecord>, ApiError> {
    require_admin(&state, &headers)?;
    let service: ServiceId = service.parse()?;
    let record = {
        let mut ledger = state.ledger.lock().unwrap_or_else(|p| p.into_inner());
        ledger.grant(&user, service, body.max_requests)
    };
    info!(user = %user, service = %service, max_requests = body.max_requests, "service granted");
    Ok(Json(record))
}

pub async fn revoke_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user, service)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    let service: ServiceId = service.parse()?;
    let removed = {
        let mut ledger = state.ledger.lock().unwrap_or_else(|p| p.into_inner());
        ledger.revoke(&user, service)
    };
    match removed {
        Some(_) => {
            info!(user = %user, service = %service, "service revoked");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("user '{}' has no '{}' service", user, service),
        )),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Missing '{}' parameter", name)))
}

/// Count the request against the caller's quota. Anonymous requests are not charged.
fn charge(state: &AppState, headers: &HeaderMap, service: ServiceId) -> Result<(), ApiError> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty());
    if let Some(user) = user {
        let mut ledger = state.ledger.lock().unwrap_or_else(|p| p.into_inner());
        let record = ledger.consume(user, service)?;
        debug!(user, service = %service, remaining = record.remaining(), "quota charged");
    }
    Ok(())
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(api_error(StatusCode::NOT_FOUND, "Admin routes are disabled"));
    };
    let supplied = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    if supplied == Some(expected) {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "Invalid admin token"))
    }
}

/// Run `f` against the shared explorer on the blocking pool (providers use blocking HTTP).
async fn with_explorer<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut CityExplorer) -> Result<T, ExploreError> + Send + 'static,
    T: Send + 'static,
{
    let explorer = state.explorer.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut explorer = explorer.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut explorer)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(result?)
}
