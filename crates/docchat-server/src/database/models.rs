use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use crate::models::chat::{ChatMessage, Role};
use crate::utils::error::{DialogError, DialogResult};

/// One row of the `history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

impl StoredMessage {
    pub fn to_chat_message(&self) -> DialogResult<ChatMessage> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| DialogError::Storage(format!("row {}: {}", self.id, e)))?;
        Ok(ChatMessage::new(role, self.content.clone()))
    }
}

/// Budget-bounded tail of a conversation, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RecentHistory {
    pub messages: Vec<ChatMessage>,
    /// Word count over `messages`
    pub token_count: usize,
}
