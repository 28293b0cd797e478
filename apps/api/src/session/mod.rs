//! Per-session state: the current translation, the symptom selection and the symptom
//! image cache, plus the in-memory store that owns every live session.
//!
//! Session fields sit behind a `std::sync::Mutex` that is never held across an `.await`.
//! Every reset bumps an epoch; work started before the reset carries the old epoch and
//! its result is dropped on completion, unless the symptom was selected again meanwhile.
//! Sessions not touched for the configured idle TTL are evicted by a background sweep.

pub mod coordinator;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::errors::AppError;
use crate::illustration::Illustration;
use crate::layout::{DocumentModel, DocumentSymptom};
use crate::translation::TranslationResult;

pub use self::coordinator::{spawn_generation, SymptomImageState, SymptomImageStatus};

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    epoch: u64,
    translation: Option<TranslationResult>,
    translation_pending: bool,
    selected: HashSet<String>,
    images: HashMap<String, SymptomImageState>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_seen: Mutex<Instant>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_seen: Mutex::new(Instant::now()),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // Every update is a single assignment; a poisoned lock still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flips the selection of `symptom_id`; returns whether it is now selected.
    /// Deselecting never touches the image cache.
    pub fn toggle(&self, symptom_id: &str) -> bool {
        let mut state = self.state();
        if state.selected.remove(symptom_id) {
            false
        } else {
            state.selected.insert(symptom_id.to_string());
            true
        }
    }

    pub fn is_selected(&self, symptom_id: &str) -> bool {
        self.state().selected.contains(symptom_id)
    }

    #[cfg(test)]
    pub fn translation(&self) -> Option<TranslationResult> {
        self.state().translation.clone()
    }

    pub fn image_state(&self, symptom_id: &str) -> SymptomImageState {
        self.state()
            .images
            .get(symptom_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn cached_image(&self, symptom_id: &str) -> Option<Illustration> {
        self.state()
            .images
            .get(symptom_id)
            .and_then(|s| s.image().cloned())
    }

    /// Clears translation, selection and image cache.
    ///
    /// `Pending` slots survive so a re-selection does not start a second call for an id
    /// that is still in flight.
    pub fn reset(&self) {
        let mut state = self.state();
        let epoch = state.epoch + 1;
        let images = std::mem::take(&mut state.images)
            .into_iter()
            .filter(|(_, slot)| *slot == SymptomImageState::Pending)
            .collect();
        *state = SessionState {
            epoch,
            images,
            ..SessionState::default()
        };
        info!(session = %self.id, "Session reset");
    }

    // ── symptom image slots (driven by the coordinator) ─────────────────────

    /// Marks the slot `Pending` if a generation may start; returns the current epoch.
    pub(crate) fn begin_generation(&self, symptom_id: &str) -> Option<u64> {
        let mut state = self.state();
        let slot = state.images.entry(symptom_id.to_string()).or_default();
        if !slot.can_start() {
            return None;
        }
        *slot = SymptomImageState::Pending;
        Some(state.epoch)
    }

    pub(crate) fn complete_generation(
        &self,
        symptom_id: &str,
        epoch: u64,
        outcome: SymptomImageState,
    ) {
        let mut state = self.state();
        if state.epoch != epoch && !state.selected.contains(symptom_id) {
            debug!(symptom = symptom_id, "Discarding illustration finished after a reset");
            state.images.remove(symptom_id);
            return;
        }
        state.images.insert(symptom_id.to_string(), outcome);
    }

    // ── translation ─────────────────────────────────────────────────────────

    /// Claims the single translation slot of this session.
    ///
    /// Fails with `Conflict` while another translation is running. The returned guard
    /// releases the slot when dropped, including when the request is cancelled.
    pub fn begin_translation(&self) -> Result<TranslationGuard<'_>, AppError> {
        let mut state = self.state();
        if state.translation_pending {
            return Err(AppError::Conflict(
                "a translation is already in progress for this session".to_string(),
            ));
        }
        state.translation_pending = true;
        Ok(TranslationGuard {
            session: self,
            epoch: state.epoch,
        })
    }

    // ── projections ─────────────────────────────────────────────────────────

    /// Resolves the selection against the catalog, in catalog order, with cached images.
    pub fn document_model(&self, catalog: &Catalog, issued_on: NaiveDate) -> DocumentModel {
        let state = self.state();
        let symptoms = catalog
            .entries()
            .iter()
            .filter(|entry| state.selected.contains(&entry.id))
            .map(|entry| DocumentSymptom {
                entry: entry.clone(),
                image: state
                    .images
                    .get(&entry.id)
                    .and_then(|s| s.image().cloned()),
            })
            .collect();

        DocumentModel {
            translation: state.translation.clone(),
            symptoms,
            issued_on,
        }
    }

    /// The JSON view the UI renders: translation plus every catalog entry's checklist state.
    pub fn snapshot(&self, catalog: &Catalog) -> SessionSnapshot {
        let state = self.state();
        let symptoms = catalog
            .entries()
            .iter()
            .map(|entry| {
                let image = state.images.get(&entry.id).cloned().unwrap_or_default();
                SymptomView {
                    id: entry.id.clone(),
                    label: entry.label.clone(),
                    selected: state.selected.contains(&entry.id),
                    image_url: image.image().map(|_| {
                        format!("/api/v1/sessions/{}/symptoms/{}/image", self.id, entry.id)
                    }),
                    placeholder_image: entry.placeholder_image.clone(),
                    image: image.status(),
                }
            })
            .collect();

        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            translation_pending: state.translation_pending,
            translation: state.translation.as_ref().map(TranslationView::from),
            symptoms,
        }
    }
}

/// Holds a session's translation slot. Dropping it without `complete` just frees the slot.
pub struct TranslationGuard<'a> {
    session: &'a Session,
    epoch: u64,
}

impl TranslationGuard<'_> {
    /// Stores the result, replacing any previous translation. A result for a session that
    /// was reset meanwhile is dropped.
    pub fn complete(self, result: TranslationResult) {
        let mut state = self.session.state();
        if state.epoch == self.epoch {
            state.translation = Some(result);
        } else {
            debug!(session = %self.session.id, "Discarding translation finished after a reset");
        }
    }
}

impl Drop for TranslationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state();
        if state.epoch == self.epoch {
            state.translation_pending = false;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot views
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub translation_pending: bool,
    pub translation: Option<TranslationView>,
    pub symptoms: Vec<SymptomView>,
}

#[derive(Debug, Serialize)]
pub struct TranslationView {
    pub original_text: String,
    pub libras_gloss: String,
    pub explanation: String,
    /// `data:` URL of the primary illustration, if one was produced.
    pub illustration: Option<String>,
}

impl From<&TranslationResult> for TranslationView {
    fn from(result: &TranslationResult) -> Self {
        Self {
            original_text: result.original_text.clone(),
            libras_gloss: result.libras_gloss.clone(),
            explanation: result.explanation.clone(),
            illustration: result.illustration.as_ref().map(Illustration::to_data_url),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SymptomView {
    pub id: String,
    pub label: String,
    pub selected: bool,
    pub image: SymptomImageStatus,
    pub image_url: Option<String>,
    pub placeholder_image: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// All live sessions, keyed by id. A session idle for longer than `idle_ttl` is gone.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub async fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(Uuid::new_v4()));
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        info!(session = %session.id(), "Session created");
        session
    }

    /// Looks a session up and marks it as seen. An expired session the sweep has not
    /// reached yet is removed here.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>, AppError> {
        let not_found = || AppError::NotFound(format!("Session {id} not found"));
        let session = self.sessions.read().await.get(&id).cloned().ok_or_else(not_found)?;

        if session.idle_for(Instant::now()) > self.idle_ttl {
            self.sessions.write().await.remove(&id);
            info!(session = %id, "Session expired");
            return Err(not_found());
        }
        session.touch();
        Ok(session)
    }

    /// Drops the session. In-flight generations finish against their own `Arc` and are discarded.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(session = %id, "Session closed");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Session {id} not found"))),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for longer than the TTL; returns how many went.
    pub async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for(now) <= self.idle_ttl);
        before - sessions.len()
    }

    /// Runs `purge_idle` periodically for the life of the process.
    pub fn spawn_idle_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let me = Arc::clone(self);
        let every = me.idle_ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = me.purge_idle().await;
                if purged > 0 {
                    let remaining = me.len().await;
                    info!(purged, remaining, "Idle sessions evicted");
                }
            }
        })
    }
}
