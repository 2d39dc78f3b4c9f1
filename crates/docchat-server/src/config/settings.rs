use anyhow::Result;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::database::history_store::{DEFAULT_HISTORY_LIMIT, DEFAULT_TOKEN_THRESHOLD};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub lexicon: LexiconConfig,
    pub dialog: DialogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root of `file/`, `index/`, `temp/` and `db/`
    pub static_path: String,
    pub log_dir: String,
}

impl StorageConfig {
    pub fn file_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_path).join("file")
    }

    pub fn index_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_path).join("index")
    }

    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_path).join("temp")
    }

    pub fn db_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_path).join("db")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    /// Empty means "must be supplied per request"
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub frequency_penalty: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LexiconConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DialogConfig {
    /// Student major used in the system prompt and exemplify template
    pub major: String,
    /// Word budget for the in-memory window (approximate tokens)
    pub token_threshold: usize,
    /// Rows read from durable history when a conversation is rehydrated
    pub history_limit: i64,
    pub idle_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            major: "Linguistics".to_string(),
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
            history_limit: DEFAULT_HISTORY_LIMIT,
            idle_ttl_seconds: 6 * 60 * 60,
            sweep_interval_seconds: 300,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let dialog = DialogConfig::default();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000_i64)?
            .set_default("storage.static_path", "static")?
            .set_default("storage.log_dir", "logs")?
            .set_default("llm.base_url", "https://api.openai.com/v1")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "gpt-4")?
            .set_default("llm.temperature", 0.4)?
            .set_default("llm.max_tokens", 1000_i64)?
            .set_default("llm.frequency_penalty", 0.0)?
            .set_default("llm.timeout_seconds", 60_i64)?
            .set_default("lexicon.enabled", true)?
            .set_default("lexicon.base_url", "https://en.wiktionary.org/api/rest_v1")?
            .set_default("lexicon.timeout_seconds", 5_i64)?
            .set_default("dialog.major", dialog.major)?
            .set_default("dialog.token_threshold", dialog.token_threshold as i64)?
            .set_default("dialog.history_limit", dialog.history_limit)?
            .set_default("dialog.idle_ttl_seconds", dialog.idle_ttl_seconds as i64)?
            .set_default("dialog.sweep_interval_seconds", dialog.sweep_interval_seconds as i64)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
