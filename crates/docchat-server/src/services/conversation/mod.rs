//! Conversation memory management module
//!
//! Per-document dialog state with:
//! - Durable history per conversation (SQLite)
//! - Word-budgeted in-memory window
//! - Registry of live conversations (DashMap)
//! - Serialized turns with streamed replies

mod cache;
mod context_builder;
pub mod manager;
mod session;
mod streamer;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::SessionRegistry;
pub use context_builder::ContextBuilder;
pub use manager::{spawn_idle_sweeper, CompletionProvider, CompletionStream, ConversationManager};
pub use session::Conversation;
pub use streamer::ResponseStreamer;
pub use types::{ConversationHandle, RegistryStats};
