use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::chat::{ChatMessage, QueryPreamble, PREAMBLE_DELIMITER};
use crate::services::lexicon_service::LexicalReference;
use crate::services::query_analyzer::QueryAnalyzer;
use crate::utils::error::DialogResult;

use super::cache::SessionRegistry;
use super::streamer::ResponseStreamer;
use super::types::RegistryStats;

/// Text deltas of a reply. Ends after the last delta or after the first error.
pub type CompletionStream = Pin<Box<dyn Stream<Item = DialogResult<String>> + Send>>;

/// Trait for the chat-completion backend
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Fail fast when no usable key exists, before any history is touched.
    fn ensure_credentials(&self, api_key: Option<&str>) -> DialogResult<()>;

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        api_key: Option<&str>,
    ) -> DialogResult<CompletionStream>;
}

/// Entry point of the dialog core: query in, reply stream out.
pub struct ConversationManager {
    registry: Arc<SessionRegistry>,
    lexicon: Arc<dyn LexicalReference>,
    completion: Arc<dyn CompletionProvider>,
}

impl ConversationManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        lexicon: Arc<dyn LexicalReference>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            registry,
            lexicon,
            completion,
        }
    }

    /// Answer `raw_query` within the conversation for `key`.
    ///
    /// Errors returned here happen before anything is streamed. Errors after
    /// that arrive as the final stream item.
    pub async fn answer(
        &self,
        key: &str,
        raw_query: &str,
        major: &str,
        api_key: Option<String>,
    ) -> DialogResult<CompletionStream> {
        self.completion.ensure_credentials(api_key.as_deref())?;

        let handle = self.registry.get_or_create(key, major).await?;
        let rewritten = QueryAnalyzer::rewrite(raw_query, major, self.lexicon.as_ref()).await;
        info!("Query for '{}' classified as {}", key, rewritten.intent);

        let conversation = handle.lock().await;
        debug!("Acquired conversation '{}'", key);

        ResponseStreamer::respond(conversation, rewritten, self.completion.clone(), api_key).await
    }

    /// Same as [`answer`](Self::answer), prefixed with the metadata preamble
    /// and delimiter the chat UI expects.
    pub async fn query(
        &self,
        key: &str,
        raw_query: &str,
        major: &str,
        api_key: Option<String>,
    ) -> DialogResult<CompletionStream> {
        let reply = self.answer(key, raw_query, major, api_key).await?;

        let preamble = serde_json::to_string(&QueryPreamble::default())
            .unwrap_or_else(|_| r#"{"cost":0,"sources":[]}"#.to_string());
        let head = stream::iter([Ok(preamble), Ok(PREAMBLE_DELIMITER.to_string())]);

        Ok(Box::pin(head.chain(reply)))
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn cleanup_idle_sessions(&self, ttl: Duration) -> usize {
        self.registry.cleanup_idle(ttl)
    }
}

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Periodically drop idle conversations. Durable history stays on disk.
///
/// `interval` is raised to at least `MIN_SWEEP_INTERVAL`.
pub fn spawn_idle_sweeper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    ttl: Duration,
) -> JoinHandle<()> {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_idle(ttl);
            debug!(
                "Idle sweep removed {} conversations, {} active",
                removed,
                registry.len()
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialogConfig;
    use crate::models::chat::Role;
    use crate::services::conversation::test_support::ScriptedCompletion;
    use crate::services::lexicon_service::DisabledLexicon;
    use crate::utils::error::DialogError;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, completion: Arc<ScriptedCompletion>) -> ConversationManager {
        let registry = Arc::new(SessionRegistry::new(dir.path(), &DialogConfig::default()));
        ConversationManager::new(registry, Arc::new(DisabledLexicon), completion)
    }

    async fn drain(stream: CompletionStream) -> Vec<String> {
        stream.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_query_prefixes_preamble() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(ScriptedCompletion::replying(&["Hi"])));

        let stream = manager.query("doc", "hello", "Linguistics", None).await.unwrap();
        let body = drain(stream).await.concat();

        assert_eq!(body, "{\"cost\":0,\"sources\":[]}\n ###endjson### \n\nHi");
    }

    #[tokio::test]
    async fn test_missing_key_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let completion = Arc::new(ScriptedCompletion::replying(&["x"]).requiring_key());
        let manager = manager(&dir, completion.clone());

        let err = manager.answer("doc", "hello", "Linguistics", None).await.err().unwrap();
        assert!(matches!(err, DialogError::Configuration(_)));
        assert!(manager.registry().is_empty());
        assert_eq!(completion.request_count(), 0);
        assert!(!dir.path().join("doc.db").exists());
    }

    #[tokio::test]
    async fn test_turns_accumulate_in_order() {
        let dir = TempDir::new().unwrap();
        let completion = Arc::new(ScriptedCompletion::replying(&["answer"]));
        let manager = manager(&dir, completion.clone());

        drain(manager.answer("doc", "first", "Linguistics", None).await.unwrap()).await;
        drain(manager.answer("doc", "second", "Linguistics", None).await.unwrap()).await;

        let sent = completion.last_request();
        let roles: Vec<Role> = sent.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(sent[3].content, "second");
    }

    #[tokio::test]
    async fn test_turns_on_one_key_are_serialized() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&dir, Arc::new(ScriptedCompletion::replying(&["a"]))));

        let first = manager.answer("doc", "one", "Linguistics", None).await.unwrap();

        // Second turn waits while the first stream is alive
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let stream = manager.answer("doc", "two", "Linguistics", None).await.unwrap();
                drain(stream).await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished());

        drain(first).await;
        assert_eq!(second.await.unwrap(), vec!["a"]);

        let handle = manager.registry().get_or_create("doc", "Linguistics").await.unwrap();
        let conversation = handle.lock().await;
        let contents: Vec<&str> = conversation.window().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "a", "two", "a"]);
    }

    #[tokio::test]
    async fn test_other_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(ScriptedCompletion::replying(&["a"])));

        let _held = manager.answer("doc-a", "one", "Linguistics", None).await.unwrap();
        let other = tokio::time::timeout(
            Duration::from_secs(2),
            manager.answer("doc-b", "two", "Linguistics", None),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_sweeper_removes_idle_conversations() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(ScriptedCompletion::replying(&["a"])));
        drain(manager.answer("doc", "hi", "Linguistics", None).await.unwrap()).await;
        assert_eq!(manager.registry().len(), 1);

        let sweeper = spawn_idle_sweeper(
            manager.registry().clone(),
            Duration::from_millis(20),
            Duration::ZERO,
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_accepts_zero_interval() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, Arc::new(ScriptedCompletion::replying(&["a"])));
        drain(manager.answer("doc", "hi", "Linguistics", None).await.unwrap()).await;

        let sweeper = spawn_idle_sweeper(manager.registry().clone(), Duration::ZERO, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!sweeper.is_finished(), "sweeper task must not panic");
        sweeper.abort();
        assert!(manager.registry().is_empty());
    }
}
