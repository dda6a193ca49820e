use pharmai_core::matcher::normalize_text;

use super::{
    resolve_medication, StockStatus, WorkflowContext, WorkflowKind, WorkflowPayload, WorkflowResult,
};
use crate::intent::Intent;

pub fn handle(intent: &Intent, context: &WorkflowContext<'_>) -> WorkflowResult {
    let resolved = match resolve_medication(intent, context) {
        Ok(resolved) => resolved,
        Err(code) => return WorkflowResult::failure(WorkflowKind::StockCheck, code),
    };

    let medication = resolved.medication;
    WorkflowResult::success(
        WorkflowKind::StockCheck,
        WorkflowPayload::Stock(StockStatus {
            med: medication.summary(),
            in_stock: medication.in_stock,
            asked_today: normalize_text(context.last_user).contains("today"),
        }),
    )
}
