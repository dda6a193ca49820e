//! Chat transport.
//!
//! - `POST /chat` with `{conversation, user_id?, stream?}`
//!
//! Replies are JSON `{assistant, intent, workflow_result}` unless the client
//! sets `stream` or accepts `text/event-stream`, in which case the turn is sent
//! as SSE events `start`, `delta`, `done` and `error`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::ACCEPT, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures::{Stream, StreamExt};
use pharmai_agent::{AgentRuntime, ChatEvent, ChatMessage, ChatRequest};
use pharmai_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub conversation: Vec<ChatMessage>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(payload): Json<ChatPayload>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let streaming = payload.stream || accepts_event_stream(&headers);
    info!(
        event_name = "server.chat.accepted",
        correlation_id = %correlation_id,
        messages = payload.conversation.len(),
        user_id = payload.user_id.as_deref().unwrap_or("none"),
        streaming,
        "chat request accepted"
    );

    let request = ChatRequest::new(payload.conversation, payload.user_id);
    if streaming {
        return Sse::new(sse_events(state.runtime, request, correlation_id))
            .keep_alive(KeepAlive::default())
            .into_response();
    }

    match state.runtime.reply(&request, &correlation_id).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(agent_error) => {
            error!(
                event_name = "server.chat.failed",
                correlation_id = %correlation_id,
                error = %agent_error,
                "chat turn failed"
            );
            error_response(agent_error.into_application().into_interface(correlation_id))
                .into_response()
        }
    }
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/event-stream"))
}

fn sse_events(
    runtime: Arc<AgentRuntime>,
    request: ChatRequest,
    correlation_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    runtime
        .stream_reply(request, correlation_id)
        .map(|event| Ok::<_, Infallible>(sse_event(&event)))
}

fn sse_event(event: &ChatEvent) -> Event {
    Event::default().event(event.name()).data(event.data().to_string())
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ChatError>) {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ChatError {
        error: error.user_message().to_string(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::ACCEPT, header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
        Router,
    };
    use pharmai_agent::{
        AgentRuntime, KeywordIntentClassifier, LlmIntentClassifier, RuntimeSettings, ScriptedLlm,
        TemplateResponder,
    };
    use pharmai_core::config::AgentMode;
    use pharmai_core::dataset::Dataset;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    const BODY_LIMIT: usize = 1_048_576;

    fn offline_router(settings: RuntimeSettings) -> Router {
        let dataset = Arc::new(Dataset::demo());
        let runtime = AgentRuntime::new(
            dataset.clone(),
            Arc::new(KeywordIntentClassifier::new(dataset)),
            Arc::new(TemplateResponder::new().expect("templates")),
            settings,
        );
        router(Arc::new(runtime))
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn json_reply_carries_intent_and_workflow_result() {
        let app = offline_router(RuntimeSettings::default());

        let response = app
            .oneshot(post_chat(json!({
                "conversation": [{ "role": "user", "content": "Is Advil in stock?" }]
            })))
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::OK);

        let json: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(json["intent"]["intent"], "STOCK_CHECK");
        assert_eq!(json["workflow_result"]["ok"], true);
        assert_eq!(json["workflow_result"]["type"], "stock_check");
        assert!(json["assistant"].as_str().expect("assistant text").contains("**Advil"));
    }

    #[tokio::test]
    async fn stream_flag_switches_to_server_sent_events() {
        let app = offline_router(RuntimeSettings::default());

        let response = app
            .oneshot(post_chat(json!({
                "conversation": [{ "role": "user", "content": "list my prescriptions" }],
                "user_id": "u002",
                "stream": true
            })))
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"), "{content_type}");

        let body = body_text(response).await;
        let start = body.find("event: start").expect("start event");
        let delta = body.find("event: delta").expect("delta event");
        let done = body.find("event: done").expect("done event");
        assert!(start < delta && delta < done, "{body}");
        assert!(body.contains("Bob"), "{body}");
        assert!(!body.contains("event: error"));
    }

    #[tokio::test]
    async fn accept_header_also_selects_event_stream() {
        let app = offline_router(RuntimeSettings::default());
        let mut request = post_chat(json!({
            "conversation": [{ "role": "user", "content": "what are the warnings for tylenol?" }]
        }));
        request.headers_mut().insert(ACCEPT, "text/event-stream".parse().expect("header value"));

        let response = app.oneshot(request).await.expect("router call");
        let body = body_text(response).await;
        assert!(body.contains("event: start"));
        assert!(body.contains("\"ok\":true"));
    }

    #[tokio::test]
    async fn malformed_classifier_output_is_a_service_error_with_reference() {
        let dataset = Arc::new(Dataset::demo());
        let llm = Arc::new(ScriptedLlm::new().with_completion("not json at all"));
        let runtime = AgentRuntime::new(
            dataset,
            Arc::new(LlmIntentClassifier::new(llm, 12)),
            Arc::new(TemplateResponder::new().expect("templates")),
            RuntimeSettings::default(),
        );
        let app = router(Arc::new(runtime));

        let response = app
            .oneshot(post_chat(json!({
                "conversation": [{ "role": "user", "content": "tell me about zyrtec" }]
            })))
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json: Value = serde_json::from_str(&body_text(response).await).expect("json body");
        assert!(json["error"].as_str().expect("error message").contains("temporarily unavailable"));
        assert!(!json["correlation_id"].as_str().expect("correlation id").is_empty());
    }

    #[tokio::test]
    async fn failing_stream_emits_error_then_done_not_ok() {
        let app = offline_router(RuntimeSettings {
            mode: AgentMode::ToolCalling,
            ..RuntimeSettings::default()
        });

        let response = app
            .oneshot(post_chat(json!({
                "conversation": [{ "role": "user", "content": "is advil in stock?" }],
                "stream": true
            })))
            .await
            .expect("router call");

        let body = body_text(response).await;
        let error = body.find("event: error").expect("error event");
        let done = body.find("event: done").expect("done event");
        assert!(error < done, "{body}");
        assert!(body.contains("\"ok\":false"), "{body}");
    }
}
