use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::DialogConfig;
use crate::database::HistoryStore;
use crate::models::chat::SessionKey;
use crate::utils::error::{DialogError, DialogResult};

use super::session::Conversation;
use super::types::{ConversationHandle, RegistryStats};

/// Process-wide map from conversation key to live conversation.
///
/// Each key owns a `OnceCell` so concurrent first requests for the same
/// document open exactly one history store.
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<OnceCell<ConversationHandle>>>,
    db_dir: PathBuf,
    token_threshold: usize,
    history_limit: i64,
    system: Mutex<System>,
}

impl SessionRegistry {
    pub fn new(db_dir: impl Into<PathBuf>, dialog: &DialogConfig) -> Self {
        let db_dir = db_dir.into();
        info!("Initializing session registry at {}", db_dir.display());
        Self {
            sessions: DashMap::new(),
            db_dir,
            token_threshold: dialog.token_threshold,
            history_limit: dialog.history_limit,
            system: Mutex::new(System::new()),
        }
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Return the live conversation for `key`, opening `{db_dir}/{key}.db` and
    /// rehydrating on first use. `major` only matters at creation.
    pub async fn get_or_create(&self, key: &str, major: &str) -> DialogResult<ConversationHandle> {
        let path = self.history_path(key)?;
        let key = key.trim();

        let cell = self
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let opened = cell
            .get_or_try_init(|| async {
                let store = HistoryStore::open(&path).await?;
                let conversation =
                    Conversation::open(key, major, store, self.token_threshold, self.history_limit)
                        .await?;
                info!("Opened conversation '{}' ({})", key, path.display());
                Ok::<_, DialogError>(ConversationHandle::new(conversation))
            })
            .await
            .cloned();

        match opened {
            Ok(handle) => {
                handle.touch();
                Ok(handle)
            }
            Err(e) => {
                drop(cell);
                self.forget_unopened(key);
                Err(e)
            }
        }
    }

    /// Remove `key` if its cell never opened and no request is waiting on it.
    fn forget_unopened(&self, key: &str) {
        let removed = self
            .sessions
            .remove_if(key, |_, cell| Self::is_orphaned(cell))
            .is_some();
        if removed {
            debug!("Discarded unopened conversation '{}'", key);
        }
    }

    fn is_orphaned(cell: &Arc<OnceCell<ConversationHandle>>) -> bool {
        cell.get().is_none() && Arc::strong_count(cell) == 1
    }

    /// History file for `key`. Keys are document names and must stay inside `db_dir`.
    pub fn history_path(&self, key: &str) -> DialogResult<PathBuf> {
        let trimmed = key.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('.')
            || trimmed.contains(['/', '\\', '\0'])
            || trimmed.contains("..")
        {
            return Err(DialogError::InvalidKey(key.to_string()));
        }
        Ok(self.db_dir.join(format!("{}.db", trimmed)))
    }

    /// Drop conversations idle for at least `ttl`. Busy ones are kept.
    /// Also drops entries whose open failed and that nobody holds.
    /// Returns number of conversations removed.
    pub fn cleanup_idle(&self, ttl: Duration) -> usize {
        let start_len = self.sessions.len();
        self.sessions.retain(|key, cell| match cell.get() {
            Some(handle) => {
                let keep = handle.is_busy() || handle.idle_for() < ttl;
                if !keep {
                    debug!("Conversation '{}' idle for {:?}, dropping", key, handle.idle_for());
                }
                keep
            }
            // Failed opens nobody waits on go; in-flight opens stay
            None => !Self::is_orphaned(cell),
        });
        let count = start_len.saturating_sub(self.sessions.len());

        if count > 0 {
            info!("Cleaned up {} idle conversations", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        let used = sys.used_memory();
        RegistryStats {
            active_sessions: self.len(),
            memory_usage_mb: used / 1024 / 1024,
            memory_total_mb: total / 1024 / 1024,
            memory_usage_percent: if total == 0 {
                0.0
            } else {
                (used as f64 / total as f64) * 100.0
            },
        }
    }
}
