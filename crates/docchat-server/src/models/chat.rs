use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conversation key: the document / index name a chat is scoped to.
pub type SessionKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Role-tagged message, the unit sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ===== HTTP MODELS =====

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: String,
    pub index: String,
    #[serde(default, rename = "openAiKey")]
    pub open_ai_key: Option<String>,
}

/// First unit of every streamed answer, followed by [`PREAMBLE_DELIMITER`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryPreamble {
    pub cost: u64,
    pub sources: Vec<String>,
}

pub const PREAMBLE_DELIMITER: &str = "\n ###endjson### \n\n";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    pub ext: String,
    pub full_name: String,
}
