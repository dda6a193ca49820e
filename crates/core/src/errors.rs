use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::medication::MedicationId;
use crate::domain::user::UserId;

/// Stable, recoverable failure codes shared by tools, workflows and responders.
///
/// These are values, not exceptions: every one of them ends up as a clarifying
/// question or a short safety message for the end user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ToolError,
    MissingUserId,
    UserNotFound,
    MissingMedicationQuery,
    MedNotFound,
    NoHandler,
    UnknownIntent,
    NeedsClinician,
    WorkflowNotImplemented,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        Self::ToolError,
        Self::MissingUserId,
        Self::UserNotFound,
        Self::MissingMedicationQuery,
        Self::MedNotFound,
        Self::NoHandler,
        Self::UnknownIntent,
        Self::NeedsClinician,
        Self::WorkflowNotImplemented,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolError => "TOOL_ERROR",
            Self::MissingUserId => "MISSING_USER_ID",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::MissingMedicationQuery => "MISSING_MEDICATION_QUERY",
            Self::MedNotFound => "MED_NOT_FOUND",
            Self::NoHandler => "NO_HANDLER",
            Self::UnknownIntent => "UNKNOWN_INTENT",
            Self::NeedsClinician => "NEEDS_CLINICIAN",
            Self::WorkflowNotImplemented => "WORKFLOW_NOT_IMPLEMENTED",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code.trim())
    }

    /// Instruction for the responder describing how to verbalize the failure.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::ToolError => {
                "The request failed for an unknown reason. Ask a short clarifying question or suggest retrying."
            }
            Self::MissingUserId => {
                "The user didn't select a demo user. Ask them to choose a user from the dropdown."
            }
            Self::UserNotFound => {
                "The selected demo user wasn't found. Ask them to choose a valid demo user from the dropdown."
            }
            Self::MissingMedicationQuery => {
                "The user didn't specify a medication. Ask which medication they mean."
            }
            Self::MedNotFound => {
                "The medication wasn't found in the demo database. Ask for a brand/generic name and give 1-2 examples."
            }
            Self::NoHandler => {
                "No workflow handler exists for the detected intent. Apologize and ask what they want to do instead."
            }
            Self::UnknownIntent => {
                "The intent is unclear. Ask one short question to clarify what they want."
            }
            Self::NeedsClinician => {
                "The user asked for personalized medical advice. Provide a brief safety response and recommend a clinician."
            }
            Self::WorkflowNotImplemented => {
                "That request type is not supported yet. Say so briefly and offer what you can do instead."
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hint for an optional code; absent codes use the generic tool-error hint.
pub fn hint_for(code: Option<ErrorCode>) -> &'static str {
    code.unwrap_or(ErrorCode::ToolError).hint()
}

/// Hint for a raw code string; unknown strings use the generic tool-error hint.
pub fn hint_for_str(code: Option<&str>) -> &'static str {
    hint_for(code.and_then(ErrorCode::parse))
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("user `{user_id}` references unknown medication `{medication_id}`")]
    DanglingPrescription { user_id: UserId, medication_id: MedicationId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(_) | ApplicationError::InvalidRequest(_) => Self::BadRequest {
                message: "request validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::MalformedModelOutput(message)
            | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
