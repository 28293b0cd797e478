mod catalog;
mod config;
mod errors;
mod genai_client;
mod illustration;
mod layout;
mod render;
mod routes;
mod session;
mod state;
mod translation;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::genai_client::GenAiClient;
use crate::illustration::GenAiIllustrator;
use crate::layout::default_page_config;
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::translation::GenAiTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LibrasMed API v{}", env!("CARGO_PKG_VERSION"));

    // Load the symptom checklist (built-in unless SYMPTOM_CATALOG_PATH is set)
    let catalog = Catalog::load(config.symptom_catalog_path.as_deref())?;

    // Initialize the generative client shared by translation and illustration
    let genai = GenAiClient::new(config.gemini_api_key.clone())?;
    if genai.has_api_key() {
        info!(
            "Generative client initialized (text: {}, image: {})",
            genai_client::TEXT_MODEL,
            genai_client::IMAGE_MODEL
        );
    } else {
        warn!("GEMINI_API_KEY is not set; translation and illustration requests will fail");
    }

    let page_config = default_page_config();
    info!(
        "Document page: {}x{}mm, margin {}mm",
        page_config.width_mm, page_config.height_mm, page_config.margin_mm
    );

    // Session store with idle eviction
    let sessions = Arc::new(SessionStore::new(config.session_idle_ttl));
    sessions.spawn_idle_sweep();
    info!("Sessions expire after {}s idle", config.session_idle_ttl.as_secs());

    // Build app state
    let state = AppState {
        config: config.clone(),
        translator: Arc::new(GenAiTranslator::new(genai.clone())),
        illustrator: Arc::new(GenAiIllustrator::new(genai)),
        catalog: Arc::new(catalog),
        sessions,
        page_config,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
