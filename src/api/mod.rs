// HTTP API served to the houses

mod houses;
pub mod render;

pub use houses::{ApiError, HouseParams, FORBIDDEN_BODY};

use crate::auth::AccessGate;
use crate::mac::TargetMacs;
use crate::state::HouseStore;
use axum::{routing::any, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HouseStore>,
    pub gate: Arc<AccessGate>,
    pub target_macs: Arc<TargetMacs>,
}

/// Create API router with the house endpoints
///
/// Every endpoint answers any method; the houses only ever issue GETs.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(houses::usage))
        .route("/state", any(houses::get_state))
        .route("/on", any(houses::turn_on))
        .route("/off", any(houses::turn_off))
        .route("/target_mac", any(houses::target_mac))
        .route("/log", any(houses::get_log))
        .route("/info", any(houses::get_info))
        .with_state(Arc::new(state))
}

/// Serve files from `dir` for every path the API does not claim
pub fn with_static_files(router: Router, dir: impl AsRef<Path>) -> Router {
    router.fallback_service(ServeDir::new(dir))
}
