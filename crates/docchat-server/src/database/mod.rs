pub mod history_store;
pub mod models;
pub mod pool;

pub use history_store::HistoryStore;
pub use models::{RecentHistory, StoredMessage};
pub use pool::DbPool;
