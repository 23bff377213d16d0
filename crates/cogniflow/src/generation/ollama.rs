//! Ollama HTTP client for embeddings and chat, with retry logic

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::FragmentStream;
use crate::types::Message;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// One NDJSON line of a streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    ///
    /// `timeout_secs` bounds each blocking request. Streamed replies are only
    /// bounded while connecting, since a long answer is not a stalled one.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Configured chat model
    pub fn chat_model(&self) -> &str {
        &self.config.chat_model
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.config.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::llm("Unknown error")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let url = url.as_str();

        self.retry_request(|| async move {
            let request = EmbedRequest {
                model: &self.config.embed_model,
                prompt: text,
            };

            let response = self
                .client
                .post(url)
                .timeout(self.request_timeout())
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "Embedding failed: HTTP {}",
                    response.status()
                )));
            }

            let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                Error::embedding(format!("Failed to parse embedding response: {}", e))
            })?;

            if embed_response.embedding.is_empty() {
                return Err(Error::embedding("Ollama returned an empty embedding"));
            }

            Ok(embed_response.embedding)
        })
        .await
    }

    /// Generate a complete chat reply with retry
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url);
        let url = url.as_str();

        tracing::info!("Generating reply with model: {}", self.config.chat_model);

        self.retry_request(|| async move {
            let request = self.chat_request(messages, false);

            let response = self
                .client
                .post(url)
                .timeout(self.request_timeout())
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::llm(format!("Chat request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::llm(format!("Chat failed: HTTP {} - {}", status, body)));
            }

            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

            Ok(chat_response.message.content)
        })
        .await
    }

    /// Start a streamed chat reply
    ///
    /// The returned stream owns the HTTP response body; dropping it closes the connection.
    pub async fn chat_stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.config.base_url);
        let request = self.chat_request(messages, true);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::llm(format!(
                "Stream failed: HTTP {}",
                response.status()
            )));
        }

        Ok(decode_chat_stream(response.bytes_stream().boxed()))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn chat_request<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.chat_model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

/// Line-buffered NDJSON decoder; lines may be split across network chunks
#[derive(Default)]
struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed raw bytes, returning every complete line decoded so far
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk>> {
        self.buffer.extend_from_slice(bytes);

        let mut decoded = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(chunk) = Self::decode_line(&line) {
                decoded.push(chunk);
            }
        }
        decoded
    }

    /// Decode whatever is left once the body ends without a trailing newline
    fn finish(&mut self) -> Option<Result<StreamChunk>> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    fn decode_line(line: &[u8]) -> Option<Result<StreamChunk>> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str::<StreamChunk>(text)
                .map_err(|e| Error::llm(format!("Malformed stream line: {}", e))),
        )
    }
}

struct DecodeState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl DecodeState {
    /// Queue decoded lines; returns true once the model reported `done`
    fn enqueue(&mut self, chunks: impl IntoIterator<Item = Result<StreamChunk>>) -> bool {
        for chunk in chunks {
            match chunk {
                Ok(StreamChunk { error: Some(error), .. }) => {
                    self.pending.push_back(Err(Error::llm(error)));
                    return true;
                }
                Ok(chunk) => {
                    if let Some(message) = chunk.message {
                        if !message.content.is_empty() {
                            self.pending.push_back(Ok(message.content));
                        }
                    }
                    if chunk.done {
                        return true;
                    }
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    return true;
                }
            }
        }
        false
    }
}

fn decode_chat_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> FragmentStream {
    let state = DecodeState {
        body,
        decoder: NdjsonDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let chunks = state.decoder.push(&bytes);
                    state.finished = state.enqueue(chunks);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(Error::llm(format!("Stream error: {}", e))));
                }
                None => {
                    let rest = state.decoder.finish();
                    state.enqueue(rest);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
