use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::session::Conversation;

/// Shared handle to a live conversation.
///
/// The async mutex serializes turns on one conversation; the guard is held for
/// the whole turn, across the upstream stream.
#[derive(Clone)]
pub struct ConversationHandle {
    conversation: Arc<AsyncMutex<Conversation>>,
    last_activity: Arc<Mutex<Instant>>,
}

impl ConversationHandle {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation: Arc::new(AsyncMutex::new(conversation)),
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Wait for exclusive access. The guard may outlive the handle.
    pub async fn lock(&self) -> OwnedMutexGuard<Conversation> {
        self.touch();
        let guard = self.conversation.clone().lock_owned().await;
        self.touch();
        guard
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// A turn is in flight (or someone is inspecting the conversation).
    pub fn is_busy(&self) -> bool {
        self.conversation.try_lock().is_err()
    }
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub memory_usage_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f64,
}
