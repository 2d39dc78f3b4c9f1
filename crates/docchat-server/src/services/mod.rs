pub mod conversation;
pub mod lexicon_service;
pub mod llm_service;
pub mod query_analyzer;

pub use conversation::ConversationManager;
pub use lexicon_service::{DisabledLexicon, LexicalReference, WiktionaryService};
pub use llm_service::LlmService;
pub use query_analyzer::QueryAnalyzer;
