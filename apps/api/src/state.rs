use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::illustration::Illustrator;
use crate::layout::PageConfig;
use crate::session::SessionStore;
use crate::translation::Translator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable translation service. Default: GenAiTranslator.
    pub translator: Arc<dyn Translator>,
    /// Pluggable illustration service, shared by the translation pipeline and the
    /// symptom coordinator. Default: GenAiIllustrator.
    pub illustrator: Arc<dyn Illustrator>,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionStore>,
    /// Page geometry for every exported document (A4, 15mm margins).
    pub page_config: PageConfig,
}
