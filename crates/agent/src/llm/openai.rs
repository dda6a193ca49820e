use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use pharmai_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    AssistantTurn, CompletionRequest, LlmClient, LlmError, PromptMessage, SseDecoder, SseEvent,
    TextStream, ToolCall, ToolSpec,
};

const BASE_BACKOFF_MS: u64 = 250;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    request_timeout: Duration,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let base_url = config.effective_base_url().trim_end_matches('/');
        Ok(Self {
            http,
            endpoint: format!("{base_url}/chat/completions"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, request: &CompletionRequest, tools: &[ToolSpec], stream: bool) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.instructions })];
        messages.extend(request.messages.iter().map(prompt_message_json));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect::<Vec<_>>()
                .into();
        }
        body
    }

    /// Posts `body`, retrying transient failures with exponential backoff.
    ///
    /// Streaming requests carry no total timeout; the body may legitimately
    /// take longer than a one-shot completion.
    async fn send(&self, body: &Value, stream: bool) -> Result<reqwest::Response, LlmError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(body, stream).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS << attempt.min(6));
                    warn!(
                        event_name = "llm.request.retry",
                        model = %self.model,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "retrying model request"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn send_once(&self, body: &Value, stream: bool) -> Result<reqwest::Response, LlmError> {
        let mut builder = self.http.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }
        if !stream {
            builder = builder.timeout(self.request_timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(body),
            429 => LlmError::RateLimited,
            code => LlmError::Http { status: code, body },
        })
    }

    async fn send_json(&self, body: &Value) -> Result<Value, LlmError> {
        let response = self.send(body, false).await?;
        response.json::<Value>().await.map_err(|error| LlmError::Decode(error.to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.request_body(request, &[], false);
        let response = self.send_json(&body).await?;
        debug!(
            event_name = "llm.complete.finished",
            model = %self.model,
            "model completion received"
        );

        match parse_assistant_turn(&response)? {
            AssistantTurn::Text(text) => Ok(text),
            AssistantTurn::ToolCalls(_) => {
                Err(LlmError::Decode("unexpected tool calls in plain completion".to_string()))
            }
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let body = self.request_body(request, &[], true);
        let response = self.send(&body, true).await?;
        let mut bytes = response.bytes_stream();

        let deltas = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            loop {
                let (events, finished) = match bytes.next().await {
                    Some(Ok(chunk)) => (decoder.push(&chunk), false),
                    Some(Err(error)) => {
                        yield Err(LlmError::from(error));
                        return;
                    }
                    None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for event in events {
                    match event {
                        SseEvent::Done => return,
                        SseEvent::Data(data) => match parse_stream_delta(&data) {
                            Ok(Some(delta)) => yield Ok(delta),
                            Ok(None) => {}
                            Err(error) => {
                                yield Err(error);
                                return;
                            }
                        },
                    }
                }

                if finished {
                    return;
                }
            }
        };

        Ok(Box::pin(deltas))
    }

    async fn complete_with_tools(
        &self,
        request: &CompletionRequest,
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError> {
        let body = self.request_body(request, tools, false);
        let response = self.send_json(&body).await?;
        parse_assistant_turn(&response)
    }
}

fn prompt_message_json(message: &PromptMessage) -> Value {
    match message {
        PromptMessage::User(content) => json!({ "role": "user", "content": content }),
        PromptMessage::Assistant(content) => json!({ "role": "assistant", "content": content }),
        PromptMessage::AssistantToolCalls(calls) => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": calls.iter().map(|call| json!({
                "id": call.id,
                "type": "function",
                "function": { "name": call.name, "arguments": call.arguments },
            })).collect::<Vec<_>>(),
        }),
        PromptMessage::ToolResult { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

fn parse_assistant_turn(response: &Value) -> Result<AssistantTurn, LlmError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::Decode("response has no choices[0].message".to_string()))?;

    let calls =
        message.get("tool_calls").and_then(Value::as_array).filter(|calls| !calls.is_empty());
    if let Some(calls) = calls {
        return calls
            .iter()
            .map(parse_tool_call)
            .collect::<Result<Vec<_>, _>>()
            .map(AssistantTurn::ToolCalls);
    }

    let content = message.get("content").and_then(Value::as_str).unwrap_or_default();
    Ok(AssistantTurn::Text(content.to_string()))
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, LlmError> {
    let field = |pointer: &str| {
        call.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::Decode(format!("tool call missing `{pointer}`")))
    };

    Ok(ToolCall {
        id: field("/id")?,
        name: field("/function/name")?,
        arguments: call
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or("{}")
            .to_string(),
    })
}

fn parse_stream_delta(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: Value =
        serde_json::from_str(data).map_err(|error| LlmError::Decode(error.to_string()))?;
    Ok(chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|delta| !delta.is_empty())
        .map(str::to_string))
}
