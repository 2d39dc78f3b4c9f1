use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::conversation::ConversationManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub conversation_manager: Arc<ConversationManager>,
}

impl FromRef<AppState> for Arc<ConversationManager> {
    fn from_ref(state: &AppState) -> Self {
        state.conversation_manager.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
