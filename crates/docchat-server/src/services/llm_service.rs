use crate::config::LlmConfig;
use crate::utils::error::{DialogError, DialogResult};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::models::chat::ChatMessage;
use crate::services::conversation::manager::{CompletionProvider, CompletionStream};

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: usize,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChoiceChunk>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceChunk {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

/// Interpret one SSE line of an OpenAI-style completion stream.
fn parse_sse_line(line: &str) -> DialogResult<SseLine> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();

    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| DialogError::Upstream(format!("malformed stream chunk: {}", e)))?;

    if let Some(err) = chunk.error {
        return Err(DialogError::Upstream(format!("completion error: {}", err)));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    Ok(SseLine::Delta(content))
}

/// Streaming chat-completion client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> DialogResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DialogError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn resolve_api_key<'a>(&'a self, api_key: Option<&'a str>) -> DialogResult<&'a str> {
        api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| Some(self.config.api_key.trim()).filter(|k| !k.is_empty()))
            .ok_or_else(|| DialogError::Configuration("missing completion API key".to_string()))
    }

    /// Generate completion with streaming
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        api_key: Option<&str>,
    ) -> DialogResult<CompletionStream> {
        let key = self.resolve_api_key(api_key)?;
        let timeout_secs = self.config.timeout_seconds;
        let idle = Duration::from_secs(timeout_secs);

        debug!("Starting chat stream with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            frequency_penalty: self.config.frequency_penalty,
            stream: true,
        };

        let send = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(key)
            .json(&request)
            .send();

        let response = tokio::time::timeout(idle, send)
            .await
            .map_err(|_| DialogError::UpstreamTimeout(timeout_secs))?
            .map_err(|e| DialogError::Upstream(format!("Failed to call LLM API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DialogError::Upstream(format!(
                "LLM API error: {} - {}",
                status, body
            )));
        }

        let stream = async_stream::stream! {
            let mut bytes = Box::pin(response.bytes_stream());
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let next = match tokio::time::timeout(idle, bytes.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(DialogError::UpstreamTimeout(timeout_secs));
                        return;
                    }
                };

                match next {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);

                        // Events may be split across network chunks
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let raw: Vec<u8> = buffer.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&raw);

                            match parse_sse_line(line.trim()) {
                                Ok(SseLine::Delta(text)) => {
                                    if !text.is_empty() {
                                        yield Ok(text);
                                    }
                                }
                                Ok(SseLine::Done) => return,
                                Ok(SseLine::Skip) => {}
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(DialogError::Upstream(format!("Stream error: {}", e)));
                        return;
                    }
                    None => {
                        let tail = String::from_utf8_lossy(&buffer).trim().to_string();
                        match parse_sse_line(&tail) {
                            Ok(SseLine::Done) => {}
                            _ => {
                                yield Err(DialogError::Upstream(
                                    "stream closed before [DONE]".to_string(),
                                ));
                            }
                        }
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for LlmService {
    fn ensure_credentials(&self, api_key: Option<&str>) -> DialogResult<()> {
        self.resolve_api_key(api_key).map(|_| ())
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        api_key: Option<&str>,
    ) -> DialogResult<CompletionStream> {
        self.chat_stream(messages, api_key).await
    }
}
