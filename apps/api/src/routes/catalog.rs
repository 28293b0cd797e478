use axum::{extract::State, Json};

use crate::catalog::SymptomEntry;
use crate::state::AppState;

/// GET /api/v1/catalog
/// The checklist in display order.
pub async fn handle_get_catalog(State(state): State<AppState>) -> Json<Vec<SymptomEntry>> {
    Json(state.catalog.entries().to_vec())
}
