use std::sync::Arc;

use anyhow::Context;
use pharmai_agent::{
    AgentRuntime, ChatMessage, ChatReply, ChatRequest, KeywordIntentClassifier, RuntimeSettings,
    TemplateResponder,
};
use pharmai_core::config::{AgentMode, AppConfig, LoadOptions};
use pharmai_core::dataset::Dataset;

use crate::commands::CommandResult;

pub fn run(message: &str, user_id: Option<String>, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions { offline: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let request = ChatRequest::new(vec![ChatMessage::user(message)], user_id);
    match runtime.block_on(answer(&config, &request)) {
        Ok(reply) if json_output => match serde_json::to_string_pretty(&reply) {
            Ok(json) => CommandResult::output(json),
            Err(error) => CommandResult::failure("ask", "serialization", error.to_string(), 5),
        },
        Ok(reply) => CommandResult::output(reply.assistant),
        Err(error) => CommandResult::failure("ask", "turn_failed", format!("{error:#}"), 4),
    }
}

/// One pipeline turn with no network: keyword classifier, clinician gate,
/// workflow, then the template responder.
pub async fn answer(config: &AppConfig, request: &ChatRequest) -> anyhow::Result<ChatReply> {
    let dataset = Arc::new(Dataset::demo());
    let responder = TemplateResponder::new().context("loading response templates")?;
    let settings =
        RuntimeSettings { mode: AgentMode::Pipeline, ..RuntimeSettings::from(&config.agent) };
    let runtime = AgentRuntime::new(
        dataset.clone(),
        Arc::new(KeywordIntentClassifier::new(dataset)),
        Arc::new(responder),
        settings,
    );

    runtime.reply(request, "cli").await.context("offline chat turn failed")
}
