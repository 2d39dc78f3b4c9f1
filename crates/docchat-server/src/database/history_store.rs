use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::models::{RecentHistory, StoredMessage};
use super::DbPool;
use crate::models::chat::Role;
use crate::utils::error::{DialogError, DialogResult};
use crate::utils::token_estimator::estimate_tokens;

pub const DEFAULT_HISTORY_LIMIT: i64 = 500;
pub const DEFAULT_TOKEN_THRESHOLD: usize = 7000;

const CREATE_HISTORY_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Append-only message log for a single conversation.
#[derive(Clone)]
pub struct HistoryStore {
    pool: DbPool,
    path: PathBuf,
}

impl HistoryStore {
    pub async fn open(path: impl AsRef<Path>) -> DialogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let pool = DbPool::open(&path).await.map_err(|e| {
            DialogError::Storage(format!("cannot open {}: {}", path.display(), e))
        })?;

        sqlx::query(CREATE_HISTORY_TABLE)
            .execute(pool.get_pool())
            .await?;

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Newest rows up to `limit`, kept while their word sum stays within `thresh`.
    ///
    /// Walks newest to oldest and stops before the first message that would push
    /// the sum over `thresh`. Result is in chronological order.
    pub async fn load_recent(&self, limit: i64, thresh: usize) -> DialogResult<RecentHistory> {
        let rows = sqlx::query_as::<_, StoredMessage>(
            r#"SELECT id, role, content, timestamp
               FROM history
               ORDER BY id DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(self.pool.get_pool())
        .await?;

        let mut recent = RecentHistory::default();
        for row in &rows {
            let words = estimate_tokens(&row.content);
            if recent.token_count + words > thresh {
                break;
            }
            recent.token_count += words;
            recent.messages.push(row.to_chat_message()?);
        }
        recent.messages.reverse();

        debug!(
            "Loaded {}/{} history rows ({} words) from {}",
            recent.messages.len(),
            rows.len(),
            recent.token_count,
            self.path.display()
        );

        Ok(recent)
    }

    /// Insert one message. Single statement, so it lands entirely or not at all.
    pub async fn append(&self, role: Role, content: &str) -> DialogResult<i64> {
        let result = sqlx::query("INSERT INTO history (role, content) VALUES (?, ?)")
            .bind(role.as_str())
            .bind(content)
            .execute(self.pool.get_pool())
            .await
            .map_err(|e| {
                warn!("History append failed for {}: {}", self.path.display(), e);
                DialogError::from(e)
            })?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count(&self) -> DialogResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history")
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatMessage;
    use tempfile::TempDir;

    async fn open_temp() -> (HistoryStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let store = HistoryStore::open(dir.path().join("db").join("paper.db"))
            .await
            .expect("open store");
        (store, dir)
    }

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let (store, _dir) = open_temp().await;
        assert!(store.path().exists());
        assert_eq!(store.count().await.unwrap(), 0);
        let recent = store.load_recent(DEFAULT_HISTORY_LIMIT, DEFAULT_TOKEN_THRESHOLD).await.unwrap();
        assert!(recent.messages.is_empty());
        assert_eq!(recent.token_count, 0);
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let (store, _dir) = open_temp().await;
        let a = store.append(Role::User, "first").await.unwrap();
        let b = store.append(Role::Assistant, "second").await.unwrap();
        assert!(b > a);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_recent_is_chronological() {
        let (store, _dir) = open_temp().await;
        store.append(Role::User, "one").await.unwrap();
        store.append(Role::Assistant, "two").await.unwrap();
        store.append(Role::User, "three").await.unwrap();

        let recent = store.load_recent(500, 7000).await.unwrap();
        assert_eq!(
            recent.messages,
            vec![
                ChatMessage::user("one"),
                ChatMessage::assistant("two"),
                ChatMessage::user("three"),
            ]
        );
        assert_eq!(recent.token_count, 3);
    }

    #[tokio::test]
    async fn test_load_recent_stops_before_crossing_threshold() {
        let (store, _dir) = open_temp().await;
        store.append(Role::User, "a b c d e").await.unwrap(); // 5
        store.append(Role::Assistant, "f g h").await.unwrap(); // 3
        store.append(Role::User, "i j").await.unwrap(); // 2

        // 2 + 3 = 5 fits, + 5 would be 10 > 6
        let recent = store.load_recent(500, 6).await.unwrap();
        assert_eq!(
            recent.messages,
            vec![ChatMessage::assistant("f g h"), ChatMessage::user("i j")]
        );
        assert_eq!(recent.token_count, 5);
    }

    #[tokio::test]
    async fn test_load_recent_respects_row_limit() {
        let (store, _dir) = open_temp().await;
        for i in 0..10 {
            store.append(Role::User, &format!("msg {}", i)).await.unwrap();
        }
        let recent = store.load_recent(3, 7000).await.unwrap();
        let contents: Vec<_> = recent.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 7", "msg 8", "msg 9"]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let store = HistoryStore::open(&path).await.unwrap();
            store.append(Role::User, "persist me").await.unwrap();
            store.close().await;
        }
        let store = HistoryStore::open(&path).await.unwrap();
        let recent = store.load_recent(500, 7000).await.unwrap();
        assert_eq!(recent.messages, vec![ChatMessage::user("persist me")]);
    }

    #[tokio::test]
    async fn test_open_inaccessible_path_fails() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is expected
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let result = HistoryStore::open(blocker.join("sub").join("x.db")).await;
        assert!(matches!(result, Err(DialogError::Storage(_))));
    }
}
