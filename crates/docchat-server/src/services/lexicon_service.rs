use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::LexiconConfig;
use crate::utils::error::{DialogError, DialogResult};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// One sense group for a looked-up term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalEntry {
    pub part_of_speech: Option<String>,
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definition {
    /// Text lines of a single definition
    pub text: Vec<String>,
}

impl Definition {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: vec![text.into()] }
    }
}

/// External dictionary. An empty list is a normal "not found".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LexicalReference: Send + Sync {
    async fn lookup(&self, term: &str) -> DialogResult<Vec<LexicalEntry>>;
}

/// Used when the lexicon is switched off in config.
pub struct DisabledLexicon;

#[async_trait]
impl LexicalReference for DisabledLexicon {
    async fn lookup(&self, _term: &str) -> DialogResult<Vec<LexicalEntry>> {
        Ok(Vec::new())
    }
}

// Wiktionary REST `page/definition` payload
#[derive(Debug, Deserialize)]
struct WiktionaryUsage {
    #[serde(rename = "partOfSpeech")]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<WiktionaryDefinition>,
}

#[derive(Debug, Deserialize)]
struct WiktionaryDefinition {
    #[serde(default)]
    definition: String,
}

/// Wiktionary REST client (English senses only).
#[derive(Clone)]
pub struct WiktionaryService {
    client: Client,
    base_url: String,
}

impl WiktionaryService {
    pub fn new(config: &LexiconConfig) -> DialogResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("docchat-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DialogError::Configuration(format!("lexicon client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn definition_url(&self, term: &str) -> DialogResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DialogError::Configuration(format!("lexicon base_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DialogError::Configuration("lexicon base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("page")
            .push("definition")
            .push(&term.trim().replace(' ', "_"));
        Ok(url)
    }
}

#[async_trait]
impl LexicalReference for WiktionaryService {
    async fn lookup(&self, term: &str) -> DialogResult<Vec<LexicalEntry>> {
        let url = self.definition_url(term)?;
        debug!("Wiktionary lookup: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DialogError::LookupUnavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(DialogError::LookupUnavailable(format!(
                "wiktionary returned {}",
                response.status()
            )));
        }

        let mut by_language: HashMap<String, Vec<WiktionaryUsage>> = response
            .json()
            .await
            .map_err(|e| DialogError::LookupUnavailable(format!("bad payload: {}", e)))?;

        let entries = by_language
            .remove("en")
            .unwrap_or_default()
            .into_iter()
            .map(|usage| LexicalEntry {
                part_of_speech: usage.part_of_speech,
                definitions: usage
                    .definitions
                    .into_iter()
                    .map(|d| Definition::new(strip_markup(&d.definition)))
                    .collect(),
            })
            .collect();

        Ok(entries)
    }
}

/// Drop HTML tags and common entities, collapse whitespace.
fn strip_markup(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
