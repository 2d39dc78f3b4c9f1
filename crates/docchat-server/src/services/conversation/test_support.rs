use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::models::chat::ChatMessage;
use crate::utils::error::{DialogError, DialogResult};

use super::manager::{CompletionProvider, CompletionStream};

/// Completion provider that replays fixed deltas and records every request.
pub struct ScriptedCompletion {
    deltas: Vec<String>,
    failure: Mutex<Option<DialogError>>,
    requests: Mutex<VecDeque<Vec<ChatMessage>>>,
    require_key: bool,
}

impl ScriptedCompletion {
    pub fn replying(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            failure: Mutex::new(None),
            requests: Mutex::new(VecDeque::new()),
            require_key: false,
        }
    }

    pub fn failing_after(deltas: &[&str], error: DialogError) -> Self {
        let scripted = Self::replying(deltas);
        *scripted.failure.lock() = Some(error);
        scripted
    }

    pub fn requiring_key(mut self) -> Self {
        self.require_key = true;
        self
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().back().cloned().unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn ensure_credentials(&self, api_key: Option<&str>) -> DialogResult<()> {
        if self.require_key && api_key.is_none() {
            return Err(DialogError::Configuration("missing completion API key".into()));
        }
        Ok(())
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        _api_key: Option<&str>,
    ) -> DialogResult<CompletionStream> {
        self.requests.lock().push_back(messages.to_vec());

        let mut items: Vec<DialogResult<String>> = self.deltas.iter().cloned().map(Ok).collect();
        if let Some(error) = self.failure.lock().take() {
            items.push(Err(error));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Completion endpoint that answers 200, sends one SSE delta, then goes silent.
///
/// Returns the base URL and the server task; abort the task when done.
pub async fn stalling_completion_server(delta: &str) -> (String, tokio::task::JoinHandle<()>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let event = format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": delta}}]})
    );

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut request).await;

        let head = "HTTP/1.1 200 OK\r\n\
                    content-type: text/event-stream\r\n\
                    transfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        let chunk = format!("{:x}\r\n{}\r\n", event.len(), event);
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        // Hold the connection open without sending anything else
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        drop(socket);
    });

    (format!("http://{}", addr), task)
}
