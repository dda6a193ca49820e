//! Language model seam.
//!
//! Everything the agent asks of a model goes through [`LlmClient`]: one-shot
//! completions (intent classification), streamed completions (responder), and
//! tool-calling turns. [`OpenAiCompatClient`] speaks the OpenAI chat-completions
//! protocol, which Ollama also serves; [`ScriptedLlm`] replays canned output.

mod openai;
mod scripted;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;

pub use openai::OpenAiCompatClient;
pub use scripted::ScriptedLlm;
pub use sse::{SseDecoder, SseEvent};

/// Text deltas in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Sent as the system message.
    pub instructions: String,
    pub messages: Vec<PromptMessage>,
    /// Ask the provider for a JSON object response.
    pub json_response: bool,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(instructions: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            instructions: instructions.into(),
            messages,
            json_response: false,
            temperature: None,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PromptMessage {
    User(String),
    Assistant(String),
    AssistantToolCalls(Vec<ToolCall>),
    ToolResult { call_id: String, content: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssistantTurn {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request timed out")]
    Timeout,
    #[error("model provider rate limited the request")]
    RateLimited,
    #[error("model provider rejected credentials: {0}")]
    Unauthorized(String),
    #[error("model provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("could not decode model response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Rate limits, timeouts, and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Unauthorized(_) | Self::Transport(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError>;

    async fn complete_with_tools(
        &self,
        request: &CompletionRequest,
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError>;
}
