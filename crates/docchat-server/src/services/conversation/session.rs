use std::collections::VecDeque;
use tracing::debug;

use crate::database::HistoryStore;
use crate::models::chat::{ChatMessage, Role, SessionKey};
use crate::utils::error::DialogResult;
use crate::utils::token_estimator::estimate_tokens;

use super::context_builder::ContextBuilder;

/// One document-scoped conversation: fixed system message, budgeted in-memory
/// window, and the durable log behind it.
///
/// `token_count` always equals the word count of the messages in `window`.
/// The system message is held apart from the window and never evicted.
pub struct Conversation {
    key: SessionKey,
    system: ChatMessage,
    window: VecDeque<ChatMessage>,
    token_count: usize,
    threshold: usize,
    store: HistoryStore,
}

impl Conversation {
    /// Build the system prompt for `major` and rehydrate the window from `store`.
    pub async fn open(
        key: impl Into<SessionKey>,
        major: &str,
        store: HistoryStore,
        threshold: usize,
        history_limit: i64,
    ) -> DialogResult<Self> {
        let key = key.into();
        let recent = store.load_recent(history_limit, threshold).await?;

        debug!(
            "Conversation '{}' rehydrated with {} messages ({} words)",
            key,
            recent.messages.len(),
            recent.token_count
        );

        Ok(Self {
            key,
            system: ChatMessage::system(ContextBuilder::system_prompt(major)),
            window: recent.messages.into(),
            token_count: recent.token_count,
            threshold,
            store,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn system_message(&self) -> &ChatMessage {
        &self.system
    }

    pub fn window(&self) -> &VecDeque<ChatMessage> {
        &self.window
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Persist first, then extend the window. A failed write leaves memory untouched.
    pub async fn add_message(&mut self, role: Role, content: impl Into<String>) -> DialogResult<()> {
        let content = content.into();
        self.store.append(role, &content).await?;

        self.token_count += estimate_tokens(&content);
        self.window.push_back(ChatMessage::new(role, content));
        Ok(())
    }

    /// Drop oldest window messages until the budget holds. Returns how many went.
    ///
    /// Durable history is not touched. One oversized message can empty the window.
    pub fn evict_if_over_budget(&mut self) -> usize {
        let mut evicted = 0;
        while self.token_count > self.threshold {
            let Some(oldest) = self.window.pop_front() else {
                break;
            };
            self.token_count -= estimate_tokens(&oldest.content);
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                "Conversation '{}': evicted {} messages, {} words remain",
                self.key, evicted, self.token_count
            );
        }
        evicted
    }

    /// `[system] + window`, after enforcing the budget.
    pub fn messages_for_api(&mut self) -> Vec<ChatMessage> {
        self.evict_if_over_budget();

        let mut messages = Vec::with_capacity(self.window.len() + 1);
        messages.push(self.system.clone());
        messages.extend(self.window.iter().cloned());
        messages
    }

    /// `[system, user(prompt)]`, bypassing history.
    pub fn isolated_messages(&self, prompt: &str) -> Vec<ChatMessage> {
        vec![self.system.clone(), ChatMessage::user(prompt)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::token_estimator::estimate_messages_tokens;
    use tempfile::TempDir;

    async fn open_with(threshold: usize) -> (Conversation, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path().join("doc.db")).await.unwrap();
        let conversation = Conversation::open("doc", "Linguistics", store, threshold, 500)
            .await
            .unwrap();
        (conversation, dir)
    }

    fn assert_counter_matches(conversation: &Conversation) {
        assert_eq!(
            conversation.token_count(),
            estimate_messages_tokens(conversation.window())
        );
    }

    #[tokio::test]
    async fn test_new_conversation_is_empty() {
        let (conversation, _dir) = open_with(7000).await;
        assert_eq!(conversation.token_count(), 0);
        assert!(conversation.window().is_empty());
        assert_eq!(conversation.system_message().role, Role::System);
        assert!(conversation.system_message().content.contains("Linguistics"));
    }

    #[tokio::test]
    async fn test_add_message_tracks_words_and_persists() {
        let (mut conversation, _dir) = open_with(7000).await;
        conversation.add_message(Role::User, "what is a morpheme").await.unwrap();
        conversation.add_message(Role::Assistant, "the smallest unit").await.unwrap();
        conversation.add_message(Role::User, "").await.unwrap();

        assert_eq!(conversation.token_count(), 7);
        assert_eq!(conversation.window().len(), 3);
        assert_counter_matches(&conversation);
        assert_eq!(conversation.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_eviction_restores_budget() {
        let (mut conversation, _dir) = open_with(10).await;
        for text in ["one two three four", "five six seven", "eight nine", "ten eleven twelve"] {
            conversation.add_message(Role::User, text).await.unwrap();
        }
        assert_eq!(conversation.token_count(), 12);

        let evicted = conversation.evict_if_over_budget();
        assert_eq!(evicted, 1);
        assert_eq!(conversation.token_count(), 8);
        assert_eq!(conversation.window().front().unwrap().content, "five six seven");
        assert_counter_matches(&conversation);
    }

    #[tokio::test]
    async fn test_oversized_message_drains_window() {
        let (mut conversation, _dir) = open_with(3).await;
        conversation.add_message(Role::User, "short").await.unwrap();
        conversation.add_message(Role::Assistant, "far too many words here").await.unwrap();

        conversation.evict_if_over_budget();
        assert!(conversation.window().is_empty());
        assert_eq!(conversation.token_count(), 0);

        let messages = conversation.messages_for_api();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_messages_for_api_prepends_system() {
        let (mut conversation, _dir) = open_with(7000).await;
        conversation.add_message(Role::User, "hello").await.unwrap();
        let messages = conversation.messages_for_api();
        assert_eq!(messages[0], *conversation.system_message());
        assert_eq!(messages[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn test_isolated_messages_skip_history() {
        let (mut conversation, _dir) = open_with(7000).await;
        conversation.add_message(Role::User, "earlier turn").await.unwrap();
        let messages = conversation.isolated_messages("PROMPT");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], ChatMessage::user("PROMPT"));
    }

    #[tokio::test]
    async fn test_evicted_messages_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.db");
        {
            let store = HistoryStore::open(&path).await.unwrap();
            let mut conversation = Conversation::open("doc", "Linguistics", store, 4, 500).await.unwrap();
            conversation.add_message(Role::User, "alpha beta gamma").await.unwrap();
            conversation.add_message(Role::Assistant, "delta epsilon").await.unwrap();
            conversation.evict_if_over_budget();
            assert_eq!(conversation.window().len(), 1);
            conversation.store().close().await;
        }

        let store = HistoryStore::open(&path).await.unwrap();
        let recent = store.load_recent(500, 7000).await.unwrap();
        assert_eq!(
            recent.messages,
            vec![ChatMessage::user("alpha beta gamma"), ChatMessage::assistant("delta epsilon")]
        );

        // Rehydration under the small budget only takes what fits
        let conversation = Conversation::open("doc", "Linguistics", store, 4, 500).await.unwrap();
        assert_eq!(conversation.window().len(), 1);
        assert_eq!(conversation.token_count(), 2);
        assert_counter_matches(&conversation);
    }

    #[tokio::test]
    async fn test_failed_append_leaves_counter_untouched() {
        let (mut conversation, _dir) = open_with(7000).await;
        conversation.add_message(Role::User, "kept").await.unwrap();
        conversation.store().close().await;

        let result = conversation.add_message(Role::User, "lost words here").await;
        assert!(result.is_err());
        assert_eq!(conversation.token_count(), 1);
        assert_eq!(conversation.window().len(), 1);
    }
}
