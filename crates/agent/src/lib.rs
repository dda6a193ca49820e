//! Agent runtime for the PharmAI assistant.
//!
//! A turn runs a constrained loop:
//! 1. **Intent classification** (`intent`) - latest message → structured `Intent`
//! 2. **Clinician gate** (`guardrails`) - personal medical advice never reaches a workflow
//! 3. **Workflow dispatch** (`workflows`) - deterministic lookups against the demo dataset
//! 4. **Response generation** (`responder`) - model-streamed or template-rendered text
//!
//! In tool-calling mode (`runtime`) the model calls the dataset tools (`tools`)
//! directly, bounded by a fixed number of rounds.
//!
//! # Safety Principle
//!
//! The model is strictly a translator. Medication facts, stock, and prescription
//! records only ever come from the dataset, and failures surface as `ErrorCode`s
//! the responder turns into a clarifying question.

pub mod conversation;
pub mod error;
pub mod guardrails;
pub mod intent;
pub mod llm;
pub mod prompts;
pub mod responder;
pub mod runtime;
pub mod templates;
pub mod tools;
pub mod workflows;

pub use conversation::{ChatMessage, ChatRequest, Role};
pub use error::AgentError;
pub use intent::{
    Intent, IntentClassifier, IntentKind, KeywordIntentClassifier, LlmIntentClassifier,
};
pub use llm::{LlmClient, LlmError, OpenAiCompatClient, ScriptedLlm};
pub use responder::{LlmResponder, Responder, TemplateResponder};
pub use runtime::{AgentRuntime, ChatEvent, ChatEventStream, ChatReply, RuntimeSettings};
pub use workflows::{WorkflowKind, WorkflowResult};
