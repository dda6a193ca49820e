//! Deterministic workflow handlers.
//!
//! [`route`] runs the clinician gate, then dispatches on the intent kind. Every
//! handler returns a [`WorkflowResult`]; lookup failures are carried as
//! `ErrorCode`s so the responder can turn them into a clarifying question.

pub mod med_lookup;
pub mod stock_check;
pub mod user_prescriptions;

use pharmai_core::dataset::Dataset;
use pharmai_core::domain::medication::{Medication, MedicationSummary};
use pharmai_core::domain::user::UserSummary;
use pharmai_core::errors::ErrorCode;
use pharmai_core::matcher::MedicationMatcher;
use serde::Serialize;
use tracing::info;

use crate::conversation::{infer_medication_from_history, ChatMessage};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::intent::{Intent, IntentKind, MedInfoSection, PrescriptionsAction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    MedLookup,
    StockCheck,
    UserPrescriptions,
    PrescriptionCheck,
    ClinicianGate,
    Router,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedLookup => "med_lookup",
            Self::StockCheck => "stock_check",
            Self::UserPrescriptions => "user_prescriptions",
            Self::PrescriptionCheck => "prescription_check",
            Self::ClinicianGate => "clinician_gate",
            Self::Router => "router",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MedicationInfo {
    pub med: MedicationSummary,
    pub section: MedInfoSection,
    pub inferred_from_history: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockStatus {
    pub med: MedicationSummary,
    pub in_stock: bool,
    pub asked_today: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrescriptionList {
    pub user: UserSummary,
    pub prescriptions: Vec<MedicationSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrescriptionStatus {
    pub user: UserSummary,
    pub med: MedicationSummary,
    pub has_prescription: bool,
    pub over_the_counter: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowPayload {
    Medication(MedicationInfo),
    Stock(StockStatus),
    Prescriptions(PrescriptionList),
    PrescriptionStatus(PrescriptionStatus),
}

/// Structured outcome handed to the responder and returned to JSON clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub ok: bool,
    #[serde(rename = "type")]
    pub workflow: WorkflowKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<PrescriptionsAction>,
    /// User-facing sentence for clinician redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Intent kind that no handler accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentKind>,
    #[serde(flatten)]
    pub payload: Option<WorkflowPayload>,
}

impl WorkflowResult {
    pub fn success(workflow: WorkflowKind, payload: WorkflowPayload) -> Self {
        Self {
            ok: true,
            workflow,
            error_code: None,
            action: None,
            reason: None,
            intent: None,
            payload: Some(payload),
        }
    }

    pub fn failure(workflow: WorkflowKind, code: ErrorCode) -> Self {
        Self {
            ok: false,
            workflow,
            error_code: Some(code),
            action: None,
            reason: None,
            intent: None,
            payload: None,
        }
    }

    pub fn clinician_gate(reason: String) -> Self {
        Self {
            reason: Some(reason),
            ..Self::failure(WorkflowKind::ClinicianGate, ErrorCode::NeedsClinician)
        }
    }

    pub fn no_handler(kind: IntentKind) -> Self {
        Self { intent: Some(kind), ..Self::failure(WorkflowKind::Router, ErrorCode::NoHandler) }
    }

    pub fn with_action(mut self, action: PrescriptionsAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Inputs shared by every workflow handler for one turn.
#[derive(Clone, Copy, Debug)]
pub struct WorkflowContext<'a> {
    pub dataset: &'a Dataset,
    pub conversation: &'a [ChatMessage],
    pub last_user: &'a str,
    pub user_id: Option<&'a str>,
    pub min_confidence: f64,
}

impl<'a> WorkflowContext<'a> {
    pub fn matcher(&self) -> MedicationMatcher<'a> {
        MedicationMatcher::new(self.dataset.medications())
    }
}

/// Gate first, then dispatch. A clinician flag skips dispatch for every kind.
pub fn route(
    policy: &GuardrailPolicy,
    intent: &Intent,
    context: &WorkflowContext<'_>,
) -> WorkflowResult {
    match policy.evaluate(intent) {
        GuardrailDecision::Allow => dispatch(intent, context),
        GuardrailDecision::Redirect { reason_code, user_message, fallback_path } => {
            info!(
                event_name = "agent.guardrail.redirect",
                intent = intent.kind.as_str(),
                reason_code = %reason_code,
                fallback_path,
                "clinician gate redirected the turn"
            );
            WorkflowResult::clinician_gate(user_message)
        }
    }
}

pub fn dispatch(intent: &Intent, context: &WorkflowContext<'_>) -> WorkflowResult {
    let result = match intent.kind {
        IntentKind::MedLookup => med_lookup::handle(intent, context),
        IntentKind::StockCheck => stock_check::handle(intent, context),
        IntentKind::UserPrescriptions => user_prescriptions::handle(intent, context),
        IntentKind::PrescriptionCheck => WorkflowResult::failure(
            WorkflowKind::PrescriptionCheck,
            ErrorCode::WorkflowNotImplemented,
        ),
        IntentKind::Unknown => WorkflowResult::no_handler(intent.kind),
    };

    info!(
        event_name = "agent.workflow.completed",
        intent = intent.kind.as_str(),
        workflow = result.workflow.as_str(),
        ok = result.ok,
        error_code = result.error_code.map(|code| code.as_str()).unwrap_or(""),
        "workflow completed"
    );
    result
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedMedication<'a> {
    pub medication: &'a Medication,
    pub inferred_from_history: bool,
}

/// Shared medication resolution.
///
/// An explicit query from the classifier always wins and is never replaced by
/// history. Without one, the last user message is tried, then the most recent
/// medication mentioned in the conversation.
pub(crate) fn resolve_medication<'a>(
    intent: &Intent,
    context: &WorkflowContext<'a>,
) -> Result<ResolvedMedication<'a>, ErrorCode> {
    let matcher = context.matcher();

    if let Some(query) = intent.explicit_medication_query() {
        return match matcher.resolve(query) {
            Some(medication) => Ok(ResolvedMedication { medication, inferred_from_history: false }),
            None if intent.confidence < context.min_confidence => {
                Err(ErrorCode::MissingMedicationQuery)
            }
            None => Err(ErrorCode::MedNotFound),
        };
    }

    if let Some(medication) = matcher.resolve(context.last_user) {
        return Ok(ResolvedMedication { medication, inferred_from_history: false });
    }

    infer_medication_from_history(context.conversation, &matcher)
        .map(|medication| ResolvedMedication { medication, inferred_from_history: true })
        .ok_or(ErrorCode::MissingMedicationQuery)
}
