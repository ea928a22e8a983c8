//! Background refresh job: cache eviction and "open now" recomputation.

use crate::explorer::{CityExplorer, RefreshSummary};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Run one refresh pass against the shared explorer on the blocking pool.
pub async fn refresh_once(explorer: Arc<Mutex<CityExplorer>>) -> Option<RefreshSummary> {
    let result = tokio::task::spawn_blocking(move || {
        let mut explorer = explorer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        explorer.refresh(Utc::now())
    })
    .await;

    match result {
        Ok(summary) => Some(summary),
        Err(e) => {
            error!(error = %e, "refresh pass panicked");
            None
        }
    }
}

/// Spawn the periodic refresh. The first pass runs one `period` after start.
pub fn spawn_refresh(explorer: Arc<Mutex<CityExplorer>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; skip that one.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Some(summary) = refresh_once(explorer.clone()).await {
                info!(
                    weather_evicted = summary.weather_evicted,
                    places_evicted = summary.places_evicted,
                    places_updated = summary.places_updated,
                    "cache refresh complete"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use tempfile::TempDir;

    fn shared_explorer(dir: &TempDir) -> Arc<Mutex<CityExplorer>> {
        let ttl = Duration::from_secs(60);
        let explorer = CityExplorer::new(
            TtlCache::load_from(dir.path().join("places.json"), ttl),
            TtlCache::load_from(dir.path().join("weather.json"), ttl),
        );
        Arc::new(Mutex::new(explorer))
    }

    #[tokio::test]
    async fn test_refresh_once_on_empty_caches() {
        let dir = TempDir::new().unwrap();
        let summary = refresh_once(shared_explorer(&dir)).await;
        assert_eq!(summary, Some(RefreshSummary::default()));
    }

    #[tokio::test]
    async fn test_spawned_job_keeps_running() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_refresh(shared_explorer(&dir), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
