pub mod settings;

pub use settings::{DialogConfig, LexiconConfig, LlmConfig, ServerConfig, Settings, StorageConfig};
