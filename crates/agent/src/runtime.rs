use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use pharmai_core::config::{AgentConfig, AgentMode};
use pharmai_core::dataset::Dataset;
use pharmai_core::errors::ErrorCode;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::conversation::{ChatRequest, Role};
use crate::error::AgentError;
use crate::guardrails::GuardrailPolicy;
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{AssistantTurn, CompletionRequest, LlmClient, PromptMessage};
use crate::prompts;
use crate::responder::{ReplyStream, Responder, ResponderContext};
use crate::tools::ToolRegistry;
use crate::workflows::{route, WorkflowContext, WorkflowKind, WorkflowResult};

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub mode: AgentMode,
    pub min_confidence: f64,
    pub max_tool_rounds: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { mode: AgentMode::Pipeline, min_confidence: 0.7, max_tool_rounds: 4 }
    }
}

impl From<&AgentConfig> for RuntimeSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            mode: config.mode,
            min_confidence: config.min_confidence,
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Classification, gate decision, and workflow outcome for one turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnPlan {
    pub last_user_message: String,
    pub intent: Intent,
    pub workflow_result: WorkflowResult,
}

impl TurnPlan {
    pub fn responder_context(&self) -> ResponderContext {
        ResponderContext::new(
            self.last_user_message.clone(),
            self.intent.clone(),
            self.workflow_result.clone(),
        )
    }
}

/// Non-streaming reply body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatReply {
    pub assistant: String,
    pub intent: Option<Intent>,
    pub workflow_result: Option<WorkflowResult>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    Start,
    Delta(String),
    Done { ok: bool, text: Option<String> },
    Error { message: String },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Delta(_) => "delta",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            Self::Start => json!({ "ok": true }),
            Self::Delta(text) => json!({ "text": text }),
            Self::Done { ok, text: Some(text) } => json!({ "ok": ok, "text": text }),
            Self::Done { ok, text: None } => json!({ "ok": ok }),
            Self::Error { message } => json!({ "message": message }),
        }
    }
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Orchestrates a chat turn: classify, gate, dispatch, respond. In tool-calling
/// mode the model drives dataset lookups itself once the gate allows the turn.
pub struct AgentRuntime {
    dataset: Arc<Dataset>,
    classifier: Arc<dyn IntentClassifier>,
    responder: Arc<dyn Responder>,
    guardrails: GuardrailPolicy,
    tools: ToolRegistry,
    tool_llm: Option<Arc<dyn LlmClient>>,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        dataset: Arc<Dataset>,
        classifier: Arc<dyn IntentClassifier>,
        responder: Arc<dyn Responder>,
        settings: RuntimeSettings,
    ) -> Self {
        let tools = ToolRegistry::pharmacy(dataset.clone());
        Self {
            dataset,
            classifier,
            responder,
            guardrails: GuardrailPolicy::default(),
            tools,
            tool_llm: None,
            settings,
        }
    }

    pub fn with_tool_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.tool_llm = Some(llm);
        self
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn mode(&self) -> AgentMode {
        self.settings.mode
    }

    pub async fn plan(&self, request: &ChatRequest) -> Result<TurnPlan, AgentError> {
        let last_user_message = request.last_user_message().trim().to_string();
        if last_user_message.is_empty() {
            return Ok(unknown_turn(last_user_message));
        }

        let intent = self.classifier.classify(&request.conversation).await?;
        Ok(self.route_intent(request, last_user_message, intent))
    }

    /// Tool-calling turns pass the same gate as pipeline turns. Returns a plan
    /// when the turn must be answered without the model's tools: an empty
    /// message or a clinician redirect.
    pub async fn screen(&self, request: &ChatRequest) -> Result<Option<TurnPlan>, AgentError> {
        let last_user_message = request.last_user_message().trim().to_string();
        if last_user_message.is_empty() {
            return Ok(Some(unknown_turn(last_user_message)));
        }

        let intent = self.classifier.classify(&request.conversation).await?;
        if self.guardrails.evaluate(&intent).is_allowed() {
            return Ok(None);
        }
        Ok(Some(self.route_intent(request, last_user_message, intent)))
    }

    fn route_intent(
        &self,
        request: &ChatRequest,
        last_user_message: String,
        intent: Intent,
    ) -> TurnPlan {
        let context = WorkflowContext {
            dataset: &self.dataset,
            conversation: &request.conversation,
            last_user: &last_user_message,
            user_id: request.user_id.as_deref(),
            min_confidence: self.settings.min_confidence,
        };
        let workflow_result = route(&self.guardrails, &intent, &context);

        TurnPlan { last_user_message, intent, workflow_result }
    }

    /// Full reply for JSON clients.
    pub async fn reply(
        &self,
        request: &ChatRequest,
        correlation_id: &str,
    ) -> Result<ChatReply, AgentError> {
        info!(
            event_name = "agent.turn.started",
            correlation_id,
            mode = ?self.settings.mode,
            messages = request.conversation.len(),
            "chat turn started"
        );

        let plan = match self.settings.mode {
            AgentMode::Pipeline => self.plan(request).await?,
            AgentMode::ToolCalling => match self.screen(request).await? {
                Some(plan) => plan,
                None => {
                    let assistant = self.run_tool_loop(request, correlation_id).await?;
                    return Ok(ChatReply { assistant, intent: None, workflow_result: None });
                }
            },
        };

        let mut deltas = self.respond(&plan, correlation_id).await?;
        let mut assistant = String::new();
        while let Some(delta) = deltas.next().await {
            assistant.push_str(&delta?);
        }
        info!(
            event_name = "agent.responder.finished",
            correlation_id,
            chars = assistant.len(),
            "responder finished"
        );
        Ok(ChatReply {
            assistant,
            intent: Some(plan.intent),
            workflow_result: Some(plan.workflow_result),
        })
    }

    /// Event stream for SSE clients: `start`, `delta`*, then `done`, with an
    /// `error` event before `done{ok:false}` when the turn fails.
    pub fn stream_reply(
        self: Arc<Self>,
        request: ChatRequest,
        correlation_id: String,
    ) -> ChatEventStream {
        let events = async_stream::stream! {
            yield ChatEvent::Start;
            info!(
                event_name = "agent.turn.started",
                correlation_id = %correlation_id,
                mode = ?self.settings.mode,
                messages = request.conversation.len(),
                streaming = true,
                "chat turn started"
            );

            let deltas = match self.settings.mode {
                AgentMode::Pipeline => match self.plan(&request).await {
                    Ok(plan) => self.respond(&plan, &correlation_id).await,
                    Err(error) => Err(error),
                },
                AgentMode::ToolCalling => match self.screen(&request).await {
                    Ok(Some(plan)) => self.respond(&plan, &correlation_id).await,
                    Ok(None) => self
                        .run_tool_loop(&request, &correlation_id)
                        .await
                        .map(|text| -> ReplyStream {
                            let reply = async move { Ok::<_, AgentError>(text) };
                            Box::pin(futures::stream::once(reply))
                        }),
                    Err(error) => Err(error),
                },
            };

            let mut deltas = match deltas {
                Ok(deltas) => deltas,
                Err(error) => {
                    yield failure_event(error, &correlation_id);
                    yield ChatEvent::Done { ok: false, text: None };
                    return;
                }
            };

            let mut text = String::new();
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(delta) if delta.is_empty() => {}
                    Ok(delta) => {
                        text.push_str(&delta);
                        yield ChatEvent::Delta(delta);
                    }
                    Err(error) => {
                        yield failure_event(error, &correlation_id);
                        yield ChatEvent::Done { ok: false, text: None };
                        return;
                    }
                }
            }

            info!(
                event_name = "agent.responder.finished",
                correlation_id = %correlation_id,
                chars = text.len(),
                "responder finished"
            );
            yield ChatEvent::Done { ok: true, text: Some(text) };
        };

        Box::pin(events)
    }

    async fn respond(
        &self,
        plan: &TurnPlan,
        correlation_id: &str,
    ) -> Result<ReplyStream, AgentError> {
        let error_code = plan.workflow_result.error_code.map(|code| code.as_str()).unwrap_or("");
        info!(
            event_name = "agent.responder.started",
            correlation_id,
            responder = self.responder.name(),
            intent = plan.intent.kind.as_str(),
            workflow = plan.workflow_result.workflow.as_str(),
            ok = plan.workflow_result.ok,
            error_code,
            "responder started"
        );
        self.responder.respond(&plan.responder_context()).await
    }

    async fn run_tool_loop(
        &self,
        request: &ChatRequest,
        correlation_id: &str,
    ) -> Result<String, AgentError> {
        let llm = self.tool_llm.as_ref().ok_or(AgentError::ToolModeUnavailable)?;
        let user_id = request.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let user_name = user_id
            .and_then(|id| self.dataset.user(id))
            .map(|user| user.full_name.as_str())
            .unwrap_or("there");

        let mut messages = request
            .conversation
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .filter_map(|message| match message.role {
                Role::User => Some(PromptMessage::User(message.content.clone())),
                Role::Assistant => Some(PromptMessage::Assistant(message.content.clone())),
                Role::System | Role::Other => None,
            })
            .collect::<Vec<_>>();
        let instructions = prompts::tool_system_prompt(user_name, user_id);
        let specs = self.tools.specs();

        for round in 1..=self.settings.max_tool_rounds {
            let request = CompletionRequest::new(instructions.clone(), messages.clone());
            match llm.complete_with_tools(&request, &specs).await? {
                AssistantTurn::Text(text) => {
                    info!(
                        event_name = "agent.tool_loop.finished",
                        correlation_id,
                        rounds = round,
                        "tool loop finished"
                    );
                    return Ok(text);
                }
                AssistantTurn::ToolCalls(calls) => {
                    messages.push(PromptMessage::AssistantToolCalls(calls.clone()));
                    for call in calls {
                        let output = self.tools.execute(&call).await.map_err(|tool_error| {
                            warn!(
                                event_name = "agent.tool.failed",
                                correlation_id,
                                tool = %call.name,
                                error = %tool_error,
                                "tool call rejected"
                            );
                            tool_error
                        })?;
                        let error_code =
                            output.get("error_code").and_then(Value::as_str).unwrap_or("");
                        info!(
                            event_name = "agent.tool.executed",
                            correlation_id,
                            round,
                            tool = %call.name,
                            error_code,
                            "tool executed"
                        );
                        messages.push(PromptMessage::ToolResult {
                            call_id: call.id,
                            content: output.to_string(),
                        });
                    }
                }
            }
        }

        Err(AgentError::ToolLoopExhausted(self.settings.max_tool_rounds))
    }
}

fn unknown_turn(last_user_message: String) -> TurnPlan {
    TurnPlan {
        last_user_message,
        intent: Intent::unknown(),
        workflow_result: WorkflowResult::failure(WorkflowKind::Router, ErrorCode::UnknownIntent),
    }
}

fn failure_event(agent_error: AgentError, correlation_id: &str) -> ChatEvent {
    error!(
        event_name = "agent.turn.failed",
        correlation_id,
        error = %agent_error,
        "chat turn failed"
    );
    let interface = agent_error.into_application().into_interface(correlation_id);
    ChatEvent::Error {
        message: format!("{} (ref: {})", interface.user_message(), interface.correlation_id()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use pharmai_core::config::AgentMode;
    use pharmai_core::dataset::Dataset;
    use pharmai_core::errors::ErrorCode;
    use serde_json::json;

    use super::{AgentRuntime, ChatEvent, RuntimeSettings};
    use crate::conversation::{ChatMessage, ChatRequest};
    use crate::error::AgentError;
    use crate::intent::{KeywordIntentClassifier, LlmIntentClassifier};
    use crate::llm::{AssistantTurn, ScriptedLlm, ToolCall};
    use crate::responder::{
        LlmResponder, ReplyStream, Responder, ResponderContext, TemplateResponder,
    };
    use crate::workflows::WorkflowKind;

    /// Emits one delta and then fails, like a model stream cut off mid-reply.
    struct BrokenResponder;

    #[async_trait]
    impl Responder for BrokenResponder {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn respond(
            &self,
            _context: &ResponderContext,
        ) -> Result<ReplyStream, AgentError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("a".to_string()),
                Err(AgentError::Template("render failed".to_string())),
            ])))
        }
    }

    fn offline_runtime() -> AgentRuntime {
        offline_runtime_with(RuntimeSettings::default())
    }

    fn tool_runtime(llm: Arc<ScriptedLlm>, max_tool_rounds: u32) -> AgentRuntime {
        let settings = RuntimeSettings {
            mode: AgentMode::ToolCalling,
            max_tool_rounds,
            ..RuntimeSettings::default()
        };
        offline_runtime_with(settings).with_tool_llm(llm)
    }

    fn offline_runtime_with(settings: RuntimeSettings) -> AgentRuntime {
        let dataset = Arc::new(Dataset::demo());
        AgentRuntime::new(
            dataset.clone(),
            Arc::new(KeywordIntentClassifier::new(dataset)),
            Arc::new(TemplateResponder::new().expect("templates")),
            settings,
        )
    }

    /// A model that would answer personal advice questions if it were asked.
    fn unsafe_advice_llm() -> ScriptedLlm {
        ScriptedLlm::new().with_turn(AssistantTurn::Text("Sure, take 400 mg.".to_string()))
    }

    fn request(message: &str, user_id: Option<&str>) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(message)], user_id.map(str::to_string))
    }

    #[tokio::test]
    async fn pipeline_reply_carries_intent_and_workflow_result() {
        let reply = offline_runtime()
            .reply(&request("is zyrtec in stock today?", None), "req-1")
            .await
            .expect("reply");

        assert_eq!(reply.assistant, "Sorry, **Zyrtec (Cetirizine) 10mg** is out of stock today.");
        let result = reply.workflow_result.expect("workflow result");
        assert_eq!(result.workflow, WorkflowKind::StockCheck);
        assert!(result.ok);
    }

    #[tokio::test]
    async fn empty_conversation_is_an_unknown_intent() {
        let plan = offline_runtime().plan(&ChatRequest::default()).await.expect("plan");
        assert_eq!(plan.workflow_result.error_code, Some(ErrorCode::UnknownIntent));
        assert_eq!(plan.intent.confidence, 0.0);
    }

    #[tokio::test]
    async fn llm_pipeline_streams_start_deltas_and_done() {
        let dataset = Arc::new(Dataset::demo());
        let llm = Arc::new(
            ScriptedLlm::new()
                .with_completion(r#"{"intent":"MED_LOOKUP","medication_query":"advil","med_info_type":"DOSAGE","confidence":0.93}"#)
                .with_stream(["Take ", "1 tablet."]),
        );
        let runtime = Arc::new(AgentRuntime::new(
            dataset,
            Arc::new(LlmIntentClassifier::new(llm.clone(), 12)),
            Arc::new(LlmResponder::new(llm.clone())),
            RuntimeSettings::default(),
        ));

        let events = runtime
            .stream_reply(request("how do I take advil?", None), "req-2".to_string())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Start,
                ChatEvent::Delta("Take ".to_string()),
                ChatEvent::Delta("1 tablet.".to_string()),
                ChatEvent::Done { ok: true, text: Some("Take 1 tablet.".to_string()) },
            ]
        );
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn malformed_classifier_output_ends_stream_with_error_then_done() {
        let dataset = Arc::new(Dataset::demo());
        let llm = Arc::new(ScriptedLlm::new().with_completion("I think they want advil"));
        let runtime = Arc::new(AgentRuntime::new(
            dataset,
            Arc::new(LlmIntentClassifier::new(llm.clone(), 12)),
            Arc::new(LlmResponder::new(llm)),
            RuntimeSettings::default(),
        ));

        let events = runtime
            .stream_reply(request("advil?", None), "req-3".to_string())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ChatEvent::Start);
        let ChatEvent::Error { message } = &events[1] else {
            panic!("expected error event, got {:?}", events[1]);
        };
        assert!(message.contains("req-3"));
        assert_eq!(events[2], ChatEvent::Done { ok: false, text: None });
    }

    #[tokio::test]
    async fn responder_failure_mid_stream_ends_with_error_then_done() {
        let dataset = Arc::new(Dataset::demo());
        let runtime = Arc::new(AgentRuntime::new(
            dataset.clone(),
            Arc::new(KeywordIntentClassifier::new(dataset)),
            Arc::new(BrokenResponder),
            RuntimeSettings::default(),
        ));

        let events = runtime
            .stream_reply(request("is advil in stock?", None), "req-8".to_string())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(events.len(), 4, "{events:?}");
        assert_eq!(events[0], ChatEvent::Start);
        assert_eq!(events[1], ChatEvent::Delta("a".to_string()));
        assert!(matches!(&events[2], ChatEvent::Error { message } if message.contains("req-8")));
        assert_eq!(events[3], ChatEvent::Done { ok: false, text: None });
    }

    #[tokio::test]
    async fn tool_mode_redirects_personal_advice_before_the_model_runs() {
        let llm = Arc::new(unsafe_advice_llm());
        let runtime = tool_runtime(llm.clone(), 4);

        let reply = runtime
            .reply(&request("I'm pregnant, should I take ibuprofen?", None), "req-9")
            .await
            .expect("reply");

        let result = reply.workflow_result.expect("gate result");
        assert_eq!(result.workflow, WorkflowKind::ClinicianGate);
        assert_eq!(result.error_code, Some(ErrorCode::NeedsClinician));
        assert!(reply.intent.is_some_and(|intent| intent.needs_clinician));
        assert!(reply.assistant.contains("healthcare professional"), "{}", reply.assistant);
        assert!(!reply.assistant.contains("400 mg"));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn tool_mode_stream_is_gated_too() {
        let llm = Arc::new(unsafe_advice_llm());
        let runtime = Arc::new(tool_runtime(llm.clone(), 4));

        let events = runtime
            .stream_reply(request("Can I take Advil while pregnant?", None), "req-10".to_string())
            .collect::<Vec<_>>()
            .await;

        let Some(ChatEvent::Done { ok: true, text: Some(text) }) = events.last() else {
            panic!("expected successful done event, got {events:?}");
        };
        assert!(text.contains("healthcare professional"), "{text}");
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_message_gets_a_generic_prompt_in_both_modes() {
        let pipeline =
            offline_runtime().reply(&request("   ", None), "req-11").await.expect("reply");
        let text = &pipeline.assistant;
        assert!(text.starts_with("What can I help you with?"), "{text}");

        let llm = Arc::new(ScriptedLlm::new());
        let tools =
            tool_runtime(llm.clone(), 4).reply(&request("", None), "req-12").await.expect("reply");
        assert_eq!(tools.assistant, pipeline.assistant);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn tool_loop_executes_calls_and_returns_final_text() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .with_turn(AssistantTurn::ToolCalls(vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "get_user_prescriptions".to_string(),
                    arguments: r#"{"user_id":"u002"}"#.to_string(),
                }]))
                .with_turn(AssistantTurn::Text("Bob, you have Augmentin on file.".to_string())),
        );
        let runtime = tool_runtime(llm.clone(), 4);

        let reply = runtime
            .reply(&request("what are my prescriptions?", Some("u002")), "req-4")
            .await
            .expect("reply");
        assert_eq!(reply.assistant, "Bob, you have Augmentin on file.");
        assert!(reply.intent.is_none());

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].instructions.contains("The user's name is: Bob Smith"));
        let crate::llm::PromptMessage::ToolResult { content, .. } = &requests[1].messages[2] else {
            panic!("expected tool result in second round");
        };
        let output: serde_json::Value = serde_json::from_str(content).expect("tool output json");
        assert_eq!(output["prescriptions"][0]["brand_name"], json!("Augmentin"));
    }

    #[tokio::test]
    async fn tool_loop_is_capped() {
        let call = || {
            AssistantTurn::ToolCalls(vec![ToolCall {
                id: "call_n".to_string(),
                name: "get_medication".to_string(),
                arguments: r#"{"query":"advil"}"#.to_string(),
            }])
        };
        let llm =
            Arc::new(ScriptedLlm::new().with_turn(call()).with_turn(call()).with_turn(call()));
        let runtime = tool_runtime(llm, 2);

        let error = runtime.reply(&request("advil?", None), "req-5").await.expect_err("capped");
        assert!(matches!(error, AgentError::ToolLoopExhausted(2)));
    }

    #[tokio::test]
    async fn tool_call_missing_required_field_is_fatal() {
        let llm = Arc::new(ScriptedLlm::new().with_turn(AssistantTurn::ToolCalls(vec![ToolCall {
            id: "call_1".to_string(),
            name: "get_medication".to_string(),
            arguments: "{}".to_string(),
        }])));
        let runtime = tool_runtime(llm, 4);

        let error = runtime.reply(&request("advil?", None), "req-6").await.expect_err("fatal");
        assert!(matches!(error, AgentError::Tool(_)));
    }

    #[tokio::test]
    async fn tool_mode_without_model_is_a_configuration_error() {
        let runtime = offline_runtime_with(RuntimeSettings {
            mode: AgentMode::ToolCalling,
            ..RuntimeSettings::default()
        });
        let error = runtime.reply(&request("advil?", None), "req-7").await.expect_err("no model");
        assert!(matches!(error, AgentError::ToolModeUnavailable));
    }

    #[test]
    fn event_payloads_match_the_wire_contract() {
        assert_eq!(ChatEvent::Start.data(), json!({ "ok": true }));
        assert_eq!(ChatEvent::Delta("Hi".to_string()).data(), json!({ "text": "Hi" }));
        assert_eq!(ChatEvent::Done { ok: false, text: None }.data(), json!({ "ok": false }));
        assert_eq!(
            ChatEvent::Done { ok: true, text: Some("Hi".to_string()) }.data(),
            json!({ "ok": true, "text": "Hi" })
        );
        assert_eq!(ChatEvent::Error { message: "boom".to_string() }.name(), "error");
    }
}
