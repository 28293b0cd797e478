use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and whether the
/// generative backend has a credential, plus the number of live sessions.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "librasmed-api",
        "generative_backend_configured": state.config.gemini_api_key.is_some(),
        "catalog_entries": state.catalog.len(),
        "active_sessions": state.sessions.len().await,
    }))
}
