//! Streaming chat-completions collaborator.
//!
//! [`ChatCompletionsClient`] speaks the OpenAI-compatible
//! `/chat/completions` protocol with `stream: true` and turns the server-sent
//! events into a stream of text fragments. Dropping the stream drops the
//! underlying response, which releases the connection.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Lazy, finite, non-restartable sequence of answer text.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Raw synthesis output; an `Err` item ends the stream.
pub type SynthesisStream = Pin<Box<dyn Stream<Item = Result<String, PipelineError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Start one streaming completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SynthesisFailure`] if the call cannot be
    /// started. Failures after the first fragment arrive as `Err` items.
    async fn stream(&self, request: SynthesisRequest) -> Result<SynthesisStream, PipelineError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// OpenAI-compatible streaming client (Fireworks, OpenAI, vLLM, ...).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        connect_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        // No total timeout: a long answer legitimately streams for a while.
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("LLM client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Synthesizer for ChatCompletionsClient {
    async fn stream(&self, request: SynthesisRequest) -> Result<SynthesisStream, PipelineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        };

        tracing::debug!(model = %self.model, messages = request.messages.len(), "chat completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::SynthesisFailure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::SynthesisFailure(format!(
                "LLM API error ({status}): {}",
                error_text.trim()
            )));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            let mut finished = false;
            while !lines.is_closed() {
                let pending = match bytes.next().await {
                    Some(Ok(chunk)) => lines.push(&chunk),
                    Some(Err(e)) => {
                        yield Err(PipelineError::SynthesisFailure(format!("stream read failed: {e}")));
                        return;
                    }
                    None => lines.finish().into_iter().collect(),
                };
                for line in pending {
                    match parse_event(&line) {
                        Ok(SseEvent::Delta { content, finish }) => {
                            finished |= finish;
                            if let Some(text) = content {
                                yield Ok(text);
                            }
                        }
                        Ok(SseEvent::Done) => return,
                        Ok(SseEvent::Ignored) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            if !finished {
                yield Err(PipelineError::SynthesisFailure(
                    "stream closed before completion".to_string(),
                ));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Splits a byte stream into complete lines. Lines are only decoded once
/// complete, so multi-byte characters split across chunks survive.
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    pending: Vec<u8>,
    closed: bool,
}

impl SseLineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }
        lines
    }

    /// Mark the input as ended and return any unterminated last line.
    pub(crate) fn finish(&mut self) -> Option<String> {
        self.closed = true;
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Delta { content: Option<String>, finish: bool },
    Done,
    Ignored,
}

/// Interpret one SSE line from a chat-completions stream.
pub(crate) fn parse_event(line: &str) -> Result<SseEvent, PipelineError> {
    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments (`:`), `event:`/`id:`/`retry:` fields.
        return Ok(SseEvent::Ignored);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseEvent::Ignored);
    }
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| PipelineError::SynthesisFailure(format!("malformed stream event: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(PipelineError::SynthesisFailure(format!(
            "provider error: {error}"
        )));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(SseEvent::Ignored);
    };
    Ok(SseEvent::Delta {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        finish: choice.finish_reason.is_some(),
    })
}

#[cfg(test)]
#[path = "synthesis_test.rs"]
mod tests;
