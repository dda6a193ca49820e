use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use pharmai_core::errors::hint_for;
use serde::Serialize;

use crate::error::AgentError;
use crate::intent::Intent;
use crate::llm::{CompletionRequest, LlmClient, PromptMessage};
use crate::prompts::RESPONDER_INSTRUCTIONS;
use crate::templates::ResponseTemplates;
use crate::workflows::WorkflowResult;

/// Reply text in arrival order.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Everything a responder may draw facts from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponderContext {
    pub last_user_message: String,
    pub intent: Intent,
    pub workflow_result: WorkflowResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_hint: Option<&'static str>,
}

impl ResponderContext {
    pub fn new(
        last_user_message: impl Into<String>,
        intent: Intent,
        workflow_result: WorkflowResult,
    ) -> Self {
        let error_hint = (!workflow_result.ok).then(|| hint_for(workflow_result.error_code));
        Self { last_user_message: last_user_message.into(), intent, workflow_result, error_hint }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &'static str;
    async fn respond(&self, context: &ResponderContext) -> Result<ReplyStream, AgentError>;
}

/// Streams a natural-language reply from the model.
pub struct LlmResponder {
    llm: Arc<dyn LlmClient>,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn request(context: &ResponderContext) -> Result<CompletionRequest, AgentError> {
        let context_json = serde_json::to_string(context)
            .map_err(|error| AgentError::Template(format!("responder context: {error}")))?;
        Ok(CompletionRequest::new(
            RESPONDER_INSTRUCTIONS,
            vec![PromptMessage::User(format!("CONTEXT_JSON:\n{context_json}"))],
        ))
    }
}

#[async_trait]
impl Responder for LlmResponder {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn respond(&self, context: &ResponderContext) -> Result<ReplyStream, AgentError> {
        let request = Self::request(context)?;
        let deltas = self.llm.stream(&request).await?;
        Ok(Box::pin(deltas.map(|delta| delta.map_err(AgentError::from))))
    }
}

/// Deterministic replies from the bundled templates.
pub struct TemplateResponder {
    templates: ResponseTemplates,
}

impl TemplateResponder {
    pub fn new() -> Result<Self, AgentError> {
        Ok(Self { templates: ResponseTemplates::new()? })
    }

    pub fn render(&self, context: &ResponderContext) -> Result<String, AgentError> {
        self.templates.render(context)
    }
}

#[async_trait]
impl Responder for TemplateResponder {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn respond(&self, context: &ResponderContext) -> Result<ReplyStream, AgentError> {
        let text = self.render(context)?;
        Ok(Box::pin(futures::stream::once(async move { Ok::<_, AgentError>(text) })))
    }
}
