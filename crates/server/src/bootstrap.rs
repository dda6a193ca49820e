use std::sync::Arc;

use axum::Router;
use pharmai_agent::{
    AgentRuntime, LlmClient, LlmError, LlmIntentClassifier, LlmResponder, OpenAiCompatClient,
    RuntimeSettings,
};
use pharmai_core::config::{AgentMode, AppConfig, ConfigError};
use pharmai_core::dataset::Dataset;
use thiserror::Error;
use tracing::info;

use crate::{chat, health};

pub struct Application {
    pub config: AppConfig,
    pub dataset: Arc<Dataset>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("demo dataset failed validation: {0}")]
    Dataset(String),
    #[error("language model client could not be created: {0}")]
    LlmClient(#[source] LlmError),
}

impl Application {
    pub fn router(&self) -> Router {
        chat::router(self.runtime.clone())
            .merge(health::router(self.dataset.clone(), self.runtime.mode()))
    }
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        mode = ?config.agent.mode,
        "starting application bootstrap"
    );

    let dataset = Dataset::demo();
    let issues = dataset.validate();
    if !issues.is_empty() {
        let joined = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        return Err(BootstrapError::Dataset(joined));
    }
    let dataset = Arc::new(dataset);
    info!(
        event_name = "system.bootstrap.dataset_loaded",
        correlation_id = "bootstrap",
        medications = dataset.medications().len(),
        users = dataset.users().len(),
        "demo dataset loaded"
    );

    let llm: Arc<dyn LlmClient> =
        Arc::new(OpenAiCompatClient::from_config(&config.llm).map_err(BootstrapError::LlmClient)?);
    let classifier = Arc::new(LlmIntentClassifier::new(llm.clone(), config.agent.history_window));
    let responder = Arc::new(LlmResponder::new(llm.clone()));

    let mut runtime = AgentRuntime::new(
        dataset.clone(),
        classifier,
        responder,
        RuntimeSettings::from(&config.agent),
    );
    if config.agent.mode == AgentMode::ToolCalling {
        runtime = runtime.with_tool_llm(llm);
    }
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        mode = ?runtime.mode(),
        "agent runtime initialized"
    );

    Ok(Application { config, dataset, runtime: Arc::new(runtime) })
}
