use crate::explorer::CityExplorer;
use crate::usage::UsageLedger;
use std::sync::{Arc, Mutex};

pub struct AppState {
    /// Shared with the refresh job.
    pub explorer: Arc<Mutex<CityExplorer>>,
    pub ledger: Mutex<UsageLedger>,
    pub admin_token: Option<String>,
}
