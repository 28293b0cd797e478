//! Axum route handlers for sessions: lifecycle, translation and the symptom checklist.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::SymptomEntry;
use crate::errors::AppError;
use crate::session::{spawn_generation, SessionSnapshot, SymptomImageStatus, TranslationView};
use crate::state::AppState;
use crate::translation::translate_and_illustrate;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SymptomStateResponse {
    pub symptom_id: String,
    pub selected: bool,
    pub image: SymptomImageStatus,
}

fn catalog_entry(state: &AppState, symptom_id: &str) -> Result<SymptomEntry, AppError> {
    state
        .catalog
        .get(symptom_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Symptom {symptom_id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(session.snapshot(&state.catalog)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.snapshot(&state.catalog)))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/reset
///
/// Clears translation, selection and image cache, as when the user navigates away.
pub async fn handle_reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.sessions.get(id).await?;
    session.reset();
    Ok(Json(session.snapshot(&state.catalog)))
}

// ────────────────────────────────────────────────────────────────────────────
// Translation
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/translate
///
/// Two-stage pipeline: translate → illustrate the explanation. One translation per
/// session at a time; a second request while one is running gets `409`.
pub async fn handle_translate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslationView>, AppError> {
    let session = state.sessions.get(id).await?;
    let guard = session.begin_translation()?;

    let result = translate_and_illustrate(
        &request.text,
        state.translator.as_ref(),
        state.illustrator.as_ref(),
    )
    .await?;

    let view = TranslationView::from(&result);
    guard.complete(result);
    Ok(Json(view))
}

// ────────────────────────────────────────────────────────────────────────────
// Symptom checklist
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/symptoms/:symptom_id/toggle
///
/// Selecting a symptom starts its illustration unless one is cached or in flight.
/// Deselecting leaves any running generation and the cache alone.
pub async fn handle_toggle_symptom(
    State(state): State<AppState>,
    Path((id, symptom_id)): Path<(Uuid, String)>,
) -> Result<Json<SymptomStateResponse>, AppError> {
    let session = state.sessions.get(id).await?;
    let entry = catalog_entry(&state, &symptom_id)?;

    let selected = session.toggle(&entry.id);
    info!(session = %id, symptom = %entry.id, selected, "Symptom toggled");
    if selected {
        spawn_generation(session.clone(), entry, state.illustrator.clone());
    }

    Ok(Json(SymptomStateResponse {
        image: session.image_state(&symptom_id).status(),
        symptom_id,
        selected,
    }))
}

/// POST /api/v1/sessions/:id/symptoms/:symptom_id/retry
///
/// Manual retry after a failure. No-op while the image is pending or ready.
pub async fn handle_retry_symptom(
    State(state): State<AppState>,
    Path((id, symptom_id)): Path<(Uuid, String)>,
) -> Result<Json<SymptomStateResponse>, AppError> {
    let session = state.sessions.get(id).await?;
    let entry = catalog_entry(&state, &symptom_id)?;

    spawn_generation(session.clone(), entry, state.illustrator.clone());

    Ok(Json(SymptomStateResponse {
        selected: session.is_selected(&symptom_id),
        image: session.image_state(&symptom_id).status(),
        symptom_id,
    }))
}

/// GET /api/v1/sessions/:id/symptoms/:symptom_id/image
pub async fn handle_get_symptom_image(
    State(state): State<AppState>,
    Path((id, symptom_id)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let session = state.sessions.get(id).await?;
    let image = session
        .cached_image(&symptom_id)
        .ok_or_else(|| AppError::NotFound(format!("No image cached for symptom {symptom_id}")))?;

    Ok(([(header::CONTENT_TYPE, image.mime_type)], image.data).into_response())
}
