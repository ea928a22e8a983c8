mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post, put};
use axum::Router;
use std::io;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::explorer::CityExplorer;
use crate::jobs;
use crate::usage::UsageLedger;

pub use handlers::{ADMIN_HEADER, USER_HEADER};
pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search", get(handlers::search))
        .route("/api/places", get(handlers::places))
        .route("/api/weather", get(handlers::weather))
        .route("/api/status", post(handlers::status))
        .route("/api/users/{user}/services", get(handlers::user_services))
        .route(
            "/api/users/{user}/services/{service}",
            put(handlers::grant_service).delete(handlers::revoke_service),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API and run the refresh job until Ctrl+C.
pub async fn start(config: &AppConfig, host: &str, port: u16) -> io::Result<()> {
    let explorer = Arc::new(Mutex::new(CityExplorer::from_config(config)));
    let refresh = jobs::spawn_refresh(explorer.clone(), config.refresh_interval);

    let state = Arc::new(AppState {
        explorer,
        ledger: Mutex::new(UsageLedger::new()),
        admin_token: config.admin_token.clone(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        refresh_every_secs = config.refresh_interval.as_secs(),
        offline = config.offline,
        "CityZen server listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await;
    refresh.abort();
    served
}
