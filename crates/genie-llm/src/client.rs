// Gemini API client.
//
// One-shot generation goes through `generateContent` and is wrapped in the
// retry policy. Chat replies stream from `streamGenerateContent?alt=sse` and
// are forwarded as `LlmEvent`s over an mpsc channel.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use genie_core::config::{Config, LlmConfig};

use crate::error::LlmError;
use crate::retry::{with_retry, RetryPolicy};

const API_VERSION: &str = "v1beta";
const CHAT_TEMPERATURE: f32 = 0.7;

// ---------------------------------------------------------------------------
// Request / event types
// ---------------------------------------------------------------------------

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the model for `application/json` output.
    pub json_output: bool,
}

impl GenerationRequest {
    pub fn json(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature,
            json_output: true,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Events emitted while a chat reply streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmEvent {
    Token { text: String },
    Complete { full_text: String },
    Error { message: String },
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{API_VERSION}/models/{}:{method}",
            self.base_url, self.model
        )
    }

    async fn generate_once(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let body = request_body(request, &[]);
        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        extract_text(&value)
            .ok_or_else(|| LlmError::Parse("response carried no candidate text".to_string()))
    }

    /// Stream a chat reply over `tx`. Returns when the stream completes,
    /// fails, or the receiver is dropped; failures arrive as
    /// `LlmEvent::Error`.
    pub async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            let _ = tx
                .send(LlmEvent::Error {
                    message: "API key not configured".to_string(),
                })
                .await;
            return Ok(());
        }

        let request = GenerationRequest {
            system: Some(system.to_string()),
            prompt: message.to_string(),
            temperature: CHAT_TEMPERATURE,
            json_output: false,
        };
        let body = request_body(&request, history);

        let builder = self
            .http
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let mut es = match builder.eventsource() {
            Ok(es) => es,
            Err(e) => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: format!("Failed to create event source: {e}"),
                    })
                    .await;
                return Ok(());
            }
        };

        let mut full_text = String::new();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    let Some(text) = parse_chunk_text(&msg.data) else {
                        debug!("chunk without text");
                        continue;
                    };
                    if text.is_empty() {
                        continue;
                    }
                    full_text.push_str(&text);
                    if tx.send(LlmEvent::Token { text }).await.is_err() {
                        es.close();
                        return Ok(());
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    let _ = tx
                        .send(LlmEvent::Error {
                            message: extract_error_message(&err),
                        })
                        .await;
                    es.close();
                    return Ok(());
                }
            }
        }
        es.close();

        let event = if full_text.is_empty() {
            LlmEvent::Error {
                message: "Stream ended without any content".to_string(),
            }
        } else {
            LlmEvent::Complete { full_text }
        };
        let _ = tx.send(event).await;
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        with_retry(&self.retry, "generateContent", || self.generate_once(request)).await
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured Gemini client or a stand-in that refuses every call.
pub enum LlmClient {
    Active(GeminiClient),
    /// No API key configured.
    Disabled,
}

impl LlmClient {
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.gemini_api_key {
            Some(key) if !key.trim().is_empty() => {
                LlmClient::Active(GeminiClient::new(key.clone(), &config.llm))
            }
            _ => LlmClient::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        match self {
            LlmClient::Active(client) => client.stream_chat(system, history, message, tx).await,
            LlmClient::Disabled => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: "LLM not configured".to_string(),
                    })
                    .await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        match self {
            LlmClient::Active(client) => client.generate(request).await,
            LlmClient::Disabled => Err(LlmError::NotConfigured),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn content(role: &str, text: &str) -> Value {
    json!({ "role": role, "parts": [{ "text": text }] })
}

/// Build a `generateContent` body: prior turns, then the prompt as the
/// final user turn.
pub(crate) fn request_body(request: &GenerationRequest, history: &[ChatMessage]) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            content(role, &m.text)
        })
        .collect();
    contents.push(content("user", &request.prompt));

    let mut generation_config = json!({ "temperature": request.temperature });
    if request.json_output {
        generation_config["responseMimeType"] = json!("application/json");
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });
    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

/// Concatenate the text parts of the first candidate.
///
/// Expected shape: `{ "candidates": [{ "content": { "parts": [{ "text": "..." }] } }] }`
pub(crate) fn extract_text(value: &Value) -> Option<String> {
    let parts = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Text carried by one streamed chunk.
pub(crate) fn parse_chunk_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    extract_text(&v)
}

fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("Network error: {e}"),
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
