//! Axum route handlers for document export.
//!
//! Composition decodes every embedded image and PDF encoding compresses them, so both
//! run inside `tokio::task::spawn_blocking`.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{compose, DocumentModel, Page, PageConfig};
use crate::render::{render_pdf, PDF_FILE_NAME};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub page_config: PageConfig,
    pub page_count: usize,
    pub pages: Vec<Page>,
}

async fn document_model(state: &AppState, id: Uuid) -> Result<DocumentModel, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(session.document_model(&state.catalog, Local::now().date_naive()))
}

/// GET /api/v1/sessions/:id/document
///
/// Composes the current translation and selected symptoms and returns the PDF as a download.
pub async fn handle_export_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let model = document_model(&state, id).await?;
    let config = state.page_config;

    let pdf = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        let pages = compose(&model, &config)?;
        Ok(render_pdf(&pages, &config)?)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in export: {e}")))??;

    tracing::info!(session = %id, bytes = pdf.len(), "Document exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{PDF_FILE_NAME}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

/// GET /api/v1/sessions/:id/document/layout
///
/// The composed pages as JSON (image pixels omitted), for previews and debugging.
pub async fn handle_document_layout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LayoutResponse>, AppError> {
    let model = document_model(&state, id).await?;
    let config = state.page_config;

    let pages = tokio::task::spawn_blocking(move || compose(&model, &config))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in layout: {e}")))?
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(LayoutResponse {
        page_config: config,
        page_count: pages.len(),
        pages,
    }))
}
