use pharmai_core::errors::ApplicationError;
use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::ToolError;

/// Failures that end a turn. Recoverable lookup failures are `ErrorCode`s on
/// the workflow result instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("tool loop exceeded {0} rounds without a final answer")]
    ToolLoopExhausted(u32),
    #[error("tool calling mode requires a language model client")]
    ToolModeUnavailable,
    #[error("template rendering failed: {0}")]
    Template(String),
}

impl AgentError {
    pub fn into_application(self) -> ApplicationError {
        let message = self.to_string();
        match self {
            Self::MalformedModelOutput(_) | Self::Tool(_) | Self::ToolLoopExhausted(_) => {
                ApplicationError::MalformedModelOutput(message)
            }
            Self::Llm(_) => ApplicationError::Integration(message),
            Self::ToolModeUnavailable | Self::Template(_) => {
                ApplicationError::Configuration(message)
            }
        }
    }
}
