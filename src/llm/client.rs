//! Chat client for a locally hosted Ollama server.
//!
//! One reused `reqwest::Client`; retries on transport failures and 5xx with
//! a short fixed backoff; streaming responses are decoded one JSON object
//! per line and forwarded over a channel the producer closes.

#![allow(dead_code)]

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

const MAX_RETRIES: u32 = 3;
const GENERATE_NUM_CTX: u32 = 4096;
const STREAM_NUM_CTX: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Error kinds of the LLM surface. These map onto the transport / http /
/// stream / api distinctions the UI reports.
#[derive(Debug, Clone)]
pub enum LlmError {
    Transport(String),
    Http(u16, String),
    Stream(String),
    Api(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(m) => write!(f, "connection failed: {}", m),
            Self::Http(code, m) => write!(f, "server returned {}: {}", code, m),
            Self::Stream(m) => write!(f, "stream interrupted: {}", m),
            Self::Api(m) => write!(f, "model error: {}", m),
        }
    }
}

impl std::error::Error for LlmError {}

/// One streamed delta. The channel closes after `done` or an error.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
}

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    endpoint: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint.trim_end_matches('/').to_string()
        };
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET `/`. Anything but a 2xx means the AI feature stays gated off.
    pub async fn check_health(&self) -> Result<(), LlmError> {
        let resp = self
            .send_with_retry(|| self.http.get(&self.endpoint).timeout(Duration::from_secs(5)))
            .await?;
        if !resp.status().is_success() {
            return Err(LlmError::Http(resp.status().as_u16(), "health check".into()));
        }
        Ok(())
    }

    /// GET `/api/tags`: available model names, order unspecified.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.endpoint);
        let resp = self
            .send_with_retry(|| self.http.get(&url).timeout(Duration::from_secs(10)))
            .await?;
        if !resp.status().is_success() {
            return Err(LlmError::Http(resp.status().as_u16(), "listing models".into()));
        }
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Stream(e.to_string()))?;

        // De-duplicate while preserving listing order.
        let mut models = Vec::new();
        for m in tags.models {
            if !models.contains(&m.name) {
                models.push(m.name);
            }
        }
        Ok(models)
    }

    /// Non-streaming chat completion.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<String, LlmError> {
        let body = chat_body(messages, model, false, GENERATE_NUM_CTX);
        let url = format!("{}/api/chat", self.endpoint);
        let resp = self
            .send_with_retry(|| self.http.post(&url).json(&body))
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Http(status.as_u16(), text));
        }

        let frame: ChatFrame = resp
            .json()
            .await
            .map_err(|e| LlmError::Stream(e.to_string()))?;
        if let Some(error) = frame.error {
            return Err(LlmError::Api(error));
        }
        Ok(frame.message.map(|m| m.content).unwrap_or_default())
    }

    /// Streaming chat completion. The producer task sends one chunk per
    /// decoded frame and closes the channel on `done`, EOF, or error.
    /// Dropping the receiver (or aborting the consumer task) cancels the
    /// transfer.
    pub async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, LlmError>>, LlmError> {
        let body = chat_body(messages, model, true, STREAM_NUM_CTX);
        let url = format!("{}/api/chat", self.endpoint);
        let resp = self
            .send_with_retry(|| self.http.post(&url).json(&body))
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Http(status.as_u16(), text));
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buffer = String::new();

            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    match decode_line(&line) {
                        None => continue,
                        Some(Err(e)) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                        Some(Ok(chunk)) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // consumer cancelled
                            }
                            if done {
                                return;
                            }
                        }
                    }
                }
            }

            // EOF. Leftover bytes mean the final object was cut mid-frame.
            if !buffer.trim().is_empty() {
                let _ = tx
                    .send(Err(LlmError::Stream("response truncated mid-frame".into())))
                    .await;
            }
        });

        Ok(rx)
    }

    /// Issue a request, retrying transport failures and 5xx responses with
    /// 500/1000/1500 ms waits. The request is rebuilt for every attempt so
    /// the body is always rewound. 4xx responses are returned to the caller
    /// untouched.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LlmError> {
        let mut last_err = LlmError::Transport("no attempt made".into());

        for attempt in 0..=MAX_RETRIES {
            match build().send().await {
                Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
                Ok(resp) => {
                    last_err = LlmError::Http(resp.status().as_u16(), "server error".into());
                }
                Err(e) => {
                    last_err = LlmError::Transport(e.to_string());
                }
            }
            if attempt < MAX_RETRIES {
                tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
            }
        }

        Err(last_err)
    }
}

fn chat_body(
    messages: &[ChatMessage],
    model: &str,
    stream: bool,
    num_ctx: u32,
) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": stream,
        "options": { "temperature": 0.7, "num_ctx": num_ctx },
    })
}

/// Decode one line of the streaming body. `None` skips blank or keep-alive
/// lines; a present `error` field becomes an API error.
fn decode_line(line: &str) -> Option<Result<StreamChunk, LlmError>> {
    if line.is_empty() {
        return None;
    }
    let frame: ChatFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(_) => return None,
    };
    if let Some(error) = frame.error {
        return Some(Err(LlmError::Api(error)));
    }
    Some(Ok(StreamChunk {
        delta: frame.message.map(|m| m.content).unwrap_or_default(),
        done: frame.done,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn decodes_delta_frames() {
        let chunk = decode_line(r#"{"message":{"role":"assistant","content":"Hello "},"done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.delta, "Hello ");
        assert!(!chunk.done);

        let done = decode_line(r#"{"message":{"content":""},"done":true}"#)
            .unwrap()
            .unwrap();
        assert!(done.done);
    }

    #[test]
    fn decode_surfaces_api_errors() {
        let err = decode_line(r#"{"error":"model not found"}"#).unwrap().unwrap_err();
        assert!(matches!(err, LlmError::Api(m) if m.contains("model not found")));
    }

    #[test]
    fn decode_skips_blank_and_garbage_lines() {
        assert!(decode_line("").is_none());
        assert!(decode_line(": keepalive").is_none());
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let body = chat_body(&[ChatMessage::system("sys"), ChatMessage::user("hi")], "m", true, 8192);
        let text = body.to_string();
        assert!(text.contains(r#""role":"system""#));
        assert!(text.contains(r#""role":"user""#));
        assert!(text.contains(r#""num_ctx":8192"#));
        assert!(text.contains(r#""stream":true"#));
    }

    /// Serve one canned HTTP/1.1 response per accepted connection, then EOF.
    async fn one_shot_server(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                // Drain the request head (and small bodies) before replying.
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn http_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n{}",
            body
        )
    }

    #[tokio::test]
    async fn streaming_happy_path_accumulates_frames() {
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hello \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"<cmd>ls</cmd>\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        let endpoint = one_shot_server(vec![http_response(body)]).await;
        let client = OllamaClient::new(endpoint);

        let mut rx = client
            .generate_stream(&[ChatMessage::user("analyze")], "llama3.2")
            .await
            .expect("stream should start");

        let mut accumulated = String::new();
        let mut saw_done = false;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.expect("no stream errors expected");
            accumulated.push_str(&chunk.delta);
            if chunk.done {
                saw_done = true;
            }
        }
        assert_eq!(accumulated, "Hello <cmd>ls</cmd>");
        assert!(saw_done);
    }

    #[tokio::test]
    async fn truncated_stream_becomes_error() {
        // Second frame is cut mid-object and never newline-terminated.
        let body = concat!(
            "{\"message\":{\"content\":\"partial\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"never fini",
        );
        let endpoint = one_shot_server(vec![http_response(body)]).await;
        let client = OllamaClient::new(endpoint);

        let mut rx = client
            .generate_stream(&[ChatMessage::user("x")], "m")
            .await
            .unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.delta, "partial");
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, Err(LlmError::Stream(_))));
        assert!(rx.recv().await.is_none(), "channel closes after the error");
    }

    #[tokio::test]
    async fn health_retries_past_server_errors() {
        let error = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        let ok = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        let endpoint = one_shot_server(vec![error.clone(), error, ok]).await;

        let client = OllamaClient::new(endpoint);
        client
            .check_health()
            .await
            .expect("third attempt should succeed");
    }

    #[tokio::test]
    async fn client_errors_do_not_retry() {
        let not_found =
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        // Only one response queued: a retry would hang on accept, so a fast
        // failure here proves no second attempt was made.
        let endpoint = one_shot_server(vec![not_found]).await;
        let client = OllamaClient::new(endpoint);

        let err = tokio::time::timeout(Duration::from_secs(2), client.check_health())
            .await
            .expect("must not block retrying")
            .expect_err("404 is a failure");
        assert!(matches!(err, LlmError::Http(404, _)));
    }

    #[tokio::test]
    async fn generate_returns_full_text() {
        let body = r#"{"message":{"role":"assistant","content":"all healthy"},"done":true}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let endpoint = one_shot_server(vec![response]).await;
        let client = OllamaClient::new(endpoint);

        let text = client
            .generate(&[ChatMessage::user("status?")], "llama3.2")
            .await
            .unwrap();
        assert_eq!(text, "all healthy");
    }

    #[tokio::test]
    async fn generate_surfaces_api_error_field() {
        let body = r#"{"error":"model 'x' not found"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let endpoint = one_shot_server(vec![response]).await;
        let client = OllamaClient::new(endpoint);

        let err = client
            .generate(&[ChatMessage::user("x")], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api(_)));
    }

    #[tokio::test]
    async fn list_models_dedupes() {
        let body = r#"{"models":[{"name":"llama3.2"},{"name":"mistral"},{"name":"llama3.2"}]}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let endpoint = one_shot_server(vec![response]).await;
        let client = OllamaClient::new(endpoint);

        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["llama3.2".to_string(), "mistral".to_string()]);
    }
}
