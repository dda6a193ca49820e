use tracing::debug;

use super::{
    resolve_medication, MedicationInfo, WorkflowContext, WorkflowKind, WorkflowPayload,
    WorkflowResult,
};
use crate::intent::Intent;

/// Label-style facts for one medication, limited to the requested section by
/// the responder.
pub fn handle(intent: &Intent, context: &WorkflowContext<'_>) -> WorkflowResult {
    let resolved = match resolve_medication(intent, context) {
        Ok(resolved) => resolved,
        Err(code) => return WorkflowResult::failure(WorkflowKind::MedLookup, code),
    };

    debug!(
        event_name = "agent.workflow.med_lookup.resolved",
        medication_id = resolved.medication.id.as_str(),
        inferred_from_history = resolved.inferred_from_history,
        section = ?intent.med_info_type,
        "medication resolved"
    );

    WorkflowResult::success(
        WorkflowKind::MedLookup,
        WorkflowPayload::Medication(MedicationInfo {
            med: resolved.medication.summary(),
            section: intent.med_info_type,
            inferred_from_history: resolved.inferred_from_history,
        }),
    )
}
