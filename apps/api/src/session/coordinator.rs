//! Symptom Image Acquisition Coordinator.
//!
//! Each symptom slot moves through `NotRequested → Pending → Ready | Failed`.
//! `Failed` can go back to `Pending` through a retry; `Ready` is final for the session.
//! The `Pending` mark is taken synchronously under the session lock, so two concurrent
//! requests for the same id produce exactly one illustration call.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::SymptomEntry;
use crate::errors::AppError;
use crate::illustration::prompts::build_symptom_prompt;
use crate::illustration::{Illustration, Illustrator};
use crate::session::Session;

/// Reason recorded when the illustrator answers without an image.
pub const NO_IMAGE_PRODUCED: &str = "no image produced";

/// Generation state of one symptom's image.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SymptomImageState {
    #[default]
    NotRequested,
    Pending,
    Ready(Illustration),
    Failed(String),
}

impl SymptomImageState {
    /// Whether a new generation may start from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            SymptomImageState::NotRequested | SymptomImageState::Failed(_)
        )
    }

    pub fn image(&self) -> Option<&Illustration> {
        match self {
            SymptomImageState::Ready(image) => Some(image),
            _ => None,
        }
    }

    pub fn status(&self) -> SymptomImageStatus {
        match self {
            SymptomImageState::NotRequested => SymptomImageStatus::NotRequested,
            SymptomImageState::Pending => SymptomImageStatus::Pending,
            SymptomImageState::Ready(_) => SymptomImageStatus::Ready,
            SymptomImageState::Failed(reason) => SymptomImageStatus::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// Serializable view of `SymptomImageState` without the image bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymptomImageStatus {
    NotRequested,
    Pending,
    Ready,
    Failed { reason: String },
}

/// Ensures an image exists or is being produced for `entry`.
///
/// The slot is claimed when this is called, not when the future is first polled: on
/// return the slot is already `Pending` unless it was `Pending` or `Ready` before, in
/// which case the future does nothing and resolves to the current state. Otherwise it
/// calls the illustrator and stores the outcome.
pub fn ensure_generated(
    session: Arc<Session>,
    entry: SymptomEntry,
    illustrator: Arc<dyn Illustrator>,
) -> impl Future<Output = SymptomImageState> + Send + 'static {
    let claimed = session.begin_generation(&entry.id);
    async move {
        match claimed {
            Some(epoch) => run_generation(&session, &entry, illustrator.as_ref(), epoch).await,
            None => {
                debug!(symptom = %entry.id, "Image already cached or in flight, nothing to do");
                session.image_state(&entry.id)
            }
        }
    }
}

/// Runs `ensure_generated` on a background task. The slot is `Pending` before this
/// returns, so the caller's response already reflects it.
pub fn spawn_generation(
    session: Arc<Session>,
    entry: SymptomEntry,
    illustrator: Arc<dyn Illustrator>,
) -> JoinHandle<SymptomImageState> {
    tokio::spawn(ensure_generated(session, entry, illustrator))
}

async fn run_generation(
    session: &Session,
    entry: &SymptomEntry,
    illustrator: &dyn Illustrator,
    epoch: u64,
) -> SymptomImageState {
    info!(symptom = %entry.id, session = %session.id(), "Generating symptom illustration");
    let prompt = build_symptom_prompt(&entry.label, &entry.libras_description);

    let outcome = match illustrator.illustrate(&prompt).await {
        Ok(Some(image)) => {
            info!(symptom = %entry.id, bytes = image.data.len(), "Symptom illustration ready");
            SymptomImageState::Ready(image)
        }
        Ok(None) => {
            warn!(symptom = %entry.id, "Illustrator produced no image");
            SymptomImageState::Failed(NO_IMAGE_PRODUCED.to_string())
        }
        Err(e) => {
            if matches!(e, AppError::Configuration(_)) {
                warn!(symptom = %entry.id, "Symptom illustration unavailable: {e}");
            } else {
                warn!(symptom = %entry.id, "Symptom illustration failed: {e}");
            }
            SymptomImageState::Failed(e.to_string())
        }
    };

    session.complete_generation(&entry.id, epoch, outcome.clone());
    outcome
}
