pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use crate::config::{Settings, StorageConfig};
use crate::services::conversation::{CompletionProvider, ConversationManager, SessionRegistry};
use crate::services::{DisabledLexicon, LexicalReference, LlmService, WiktionaryService};
use crate::state::AppState;

/// Route the static directory is served under.
pub const STATIC_ROUTE: &str = "/static";

/// Create `file/`, `index/`, `temp/`, `db/` under the static root, plus the log directory.
pub fn prepare_storage(storage: &StorageConfig) -> Result<()> {
    for dir in [
        storage.file_dir(),
        storage.index_dir(),
        storage.temp_dir(),
        storage.db_dir(),
        storage.log_dir.clone().into(),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

/// Wire the configured lexicon and completion clients into the dialog core.
pub fn build_state(settings: Settings) -> Result<AppState> {
    let lexicon: Arc<dyn LexicalReference> = if settings.lexicon.enabled {
        Arc::new(WiktionaryService::new(&settings.lexicon)?)
    } else {
        info!("Lexical lookup disabled, explain uses the few-shot template");
        Arc::new(DisabledLexicon)
    };

    let completion: Arc<dyn CompletionProvider> = Arc::new(LlmService::new(settings.llm.clone())?);
    Ok(build_state_with(settings, lexicon, completion))
}

/// Same as [`build_state`] with caller-supplied collaborators.
pub fn build_state_with(
    settings: Settings,
    lexicon: Arc<dyn LexicalReference>,
    completion: Arc<dyn CompletionProvider>,
) -> AppState {
    let registry = Arc::new(SessionRegistry::new(settings.storage.db_dir(), &settings.dialog));
    let conversation_manager = Arc::new(ConversationManager::new(registry, lexicon, completion));

    AppState {
        settings: Arc::new(settings),
        conversation_manager,
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.settings.storage.static_path);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/api/query", get(handlers::query::query_handler))
        .route("/api/index-list", get(handlers::files::index_list_handler))
        .route("/api/file-list", get(handlers::files::file_list_handler))
        .nest_service(STATIC_ROUTE, static_files)
        .with_state(state)
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
}
