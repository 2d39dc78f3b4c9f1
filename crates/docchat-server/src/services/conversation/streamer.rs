use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::models::chat::Role;
use crate::services::query_analyzer::RewrittenQuery;
use crate::utils::error::DialogResult;

use super::manager::{CompletionProvider, CompletionStream};
use super::session::Conversation;

/// Drives one turn against the completion provider.
pub struct ResponseStreamer;

impl ResponseStreamer {
    /// Record the help text, stream the reply, and record the full reply once
    /// the provider finishes cleanly.
    ///
    /// The conversation guard moves into the returned stream and is released
    /// when the stream ends or is dropped. A reply that is cut short (client
    /// gone, upstream error, timeout) is never persisted.
    pub async fn respond(
        mut conversation: OwnedMutexGuard<Conversation>,
        rewritten: RewrittenQuery,
        provider: Arc<dyn CompletionProvider>,
        api_key: Option<String>,
    ) -> DialogResult<CompletionStream> {
        conversation.add_message(Role::User, &rewritten.help_text).await?;

        let messages = if rewritten.intent.uses_history() {
            conversation.messages_for_api()
        } else {
            conversation.isolated_messages(&rewritten.prompt)
        };

        debug!(
            "Conversation '{}': {} intent, sending {} messages ({} words in window)",
            conversation.key(),
            rewritten.intent,
            messages.len(),
            conversation.token_count()
        );

        let mut upstream = provider.stream_chat(&messages, api_key.as_deref()).await?;
        let started = Instant::now();

        let stream = async_stream::stream! {
            let mut full_response = String::new();

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(delta) => {
                        full_response.push_str(&delta);
                        yield Ok(delta);
                    }
                    Err(e) => {
                        warn!(
                            "Conversation '{}': stream aborted after {} chars: {}",
                            conversation.key(),
                            full_response.len(),
                            e
                        );
                        yield Err(e);
                        return;
                    }
                }
            }

            match conversation.add_message(Role::Assistant, full_response).await {
                Ok(()) => info!(
                    "Conversation '{}': reply completed in {:?} ({} words in window)",
                    conversation.key(),
                    started.elapsed(),
                    conversation.token_count()
                ),
                Err(e) => {
                    error!("Conversation '{}': failed to persist reply: {}", conversation.key(), e);
                    yield Err(e);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
