use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::debug;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    debug!("GET /health - Health check");
    let (capacity, available) = state.registry.pool_usage();
    Json(json!({
        "status": "OK",
        "activeJobs": state.registry.active_count(),
        "cachedResults": state.users.cached_results(),
        "workers": { "capacity": capacity, "available": available },
    }))
}
