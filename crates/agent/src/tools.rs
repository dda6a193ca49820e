use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pharmai_core::dataset::Dataset;
use pharmai_core::domain::user::{User, UserSummary};
use pharmai_core::errors::ErrorCode;
use pharmai_core::matcher::MedicationMatcher;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::{ToolCall, ToolSpec};

/// Fatal tool failures. Lookup misses are returned as structured JSON with an
/// `error_code` instead, so the model can ask a clarifying question.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("tool `{tool}` received invalid JSON arguments: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool `{tool}` is missing required string field `{field}`")]
    MissingField { tool: String, field: &'static str },
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the three read-only dataset tools.
    pub fn pharmacy(dataset: Arc<Dataset>) -> Self {
        let mut registry = Self::default();
        registry.register(GetMedication { dataset: dataset.clone() });
        registry.register(GetUserPrescriptions { dataset: dataset.clone() });
        registry.register(CheckUserPrescription { dataset });
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs sorted by name so prompts are stable across runs.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs = self.tools.values().map(|tool| tool.spec()).collect::<Vec<_>>();
        specs.sort_by_key(|spec| spec.name);
        specs
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let tool =
            self.tools.get(&call.name).ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        let arguments =
            if call.arguments.trim().is_empty() { "{}" } else { call.arguments.as_str() };
        let input: Value = serde_json::from_str(arguments).map_err(|error| {
            ToolError::InvalidArguments { tool: call.name.clone(), message: error.to_string() }
        })?;
        tool.execute(input).await
    }
}

fn required_str<'a>(
    tool: &str,
    input: &'a Value,
    field: &'static str,
) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::MissingField { tool: tool.to_string(), field })
}

fn lookup_error(code: ErrorCode, message: String) -> Value {
    json!({ "ok": false, "error_code": code, "message": message })
}

fn find_user<'a>(dataset: &'a Dataset, user_id: &str) -> Result<&'a User, Value> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(lookup_error(ErrorCode::MissingUserId, "No demo user is selected.".to_string()));
    }
    dataset.user(user_id).ok_or_else(|| {
        lookup_error(ErrorCode::UserNotFound, format!("No demo user with id '{user_id}'."))
    })
}

fn medication_not_found(query: &str) -> Value {
    lookup_error(
        ErrorCode::MedNotFound,
        format!(
            "No medication matching '{query}'. Try a brand or generic name (e.g., 'Advil', 'Ibuprofen', 'Tylenol')."
        ),
    )
}

struct GetMedication {
    dataset: Arc<Dataset>,
}

#[async_trait]
impl Tool for GetMedication {
    fn name(&self) -> &'static str {
        "get_medication"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: "Fetch factual medication info (label facts), prescription requirement, and stock from the demo DB.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Medication name, brand, or alias (free text)." }
                },
                "required": ["query"],
                "additionalProperties": false,
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let query = required_str(self.name(), &input, "query")?.trim();
        if query.is_empty() {
            return Ok(lookup_error(
                ErrorCode::MissingMedicationQuery,
                "No medication name was provided.".to_string(),
            ));
        }

        Ok(match MedicationMatcher::new(self.dataset.medications()).resolve(query) {
            Some(medication) => json!({ "ok": true, "med": medication.summary() }),
            None => medication_not_found(query),
        })
    }
}

struct GetUserPrescriptions {
    dataset: Arc<Dataset>,
}

#[async_trait]
impl Tool for GetUserPrescriptions {
    fn name(&self) -> &'static str {
        "get_user_prescriptions"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: "List a demo user's prescriptions (resolved to medication summaries) from the demo DB.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string", "description": "Demo user id like 'u001'." }
                },
                "required": ["user_id"],
                "additionalProperties": false,
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let user_id = required_str(self.name(), &input, "user_id")?;
        let user = match find_user(&self.dataset, user_id) {
            Ok(user) => user,
            Err(error) => return Ok(error),
        };

        let prescriptions = self
            .dataset
            .prescriptions_for(user)
            .into_iter()
            .map(|medication| medication.summary())
            .collect::<Vec<_>>();
        Ok(json!({ "ok": true, "user": UserSummary::from(user), "prescriptions": prescriptions }))
    }
}

struct CheckUserPrescription {
    dataset: Arc<Dataset>,
}

#[async_trait]
impl Tool for CheckUserPrescription {
    fn name(&self) -> &'static str {
        "check_user_prescription"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: "Check if a demo user has a prescription for a medication in the demo DB.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string", "description": "Demo user id like 'u001'." },
                    "medication_query": { "type": "string", "description": "Medication name, brand, or alias (free text)." }
                },
                "required": ["user_id", "medication_query"],
                "additionalProperties": false,
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let user_id = required_str(self.name(), &input, "user_id")?;
        let query = required_str(self.name(), &input, "medication_query")?.trim();

        let user = match find_user(&self.dataset, user_id) {
            Ok(user) => user,
            Err(error) => return Ok(error),
        };
        if query.is_empty() {
            return Ok(lookup_error(
                ErrorCode::MissingMedicationQuery,
                "No medication name was provided.".to_string(),
            ));
        }
        let matcher = MedicationMatcher::new(self.dataset.medications());
        let Some(medication) = matcher.resolve(query) else {
            return Ok(medication_not_found(query));
        };

        Ok(json!({
            "ok": true,
            "user": UserSummary::from(user),
            "med": medication.summary(),
            "has_prescription": user.has_prescription_for(&medication.id),
            "over_the_counter": medication.is_over_the_counter(),
        }))
    }
}
