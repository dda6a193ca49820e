use pharmai_core::domain::user::UserSummary;
use pharmai_core::errors::ErrorCode;

use super::{
    resolve_medication, PrescriptionList, PrescriptionStatus, WorkflowContext, WorkflowKind,
    WorkflowPayload, WorkflowResult,
};
use crate::intent::{Intent, PrescriptionsAction};

/// Lists the selected demo user's prescriptions or checks one medication.
///
/// The user is validated before the sub-action so an unknown id is reported
/// even when the action itself is unclear.
pub fn handle(intent: &Intent, context: &WorkflowContext<'_>) -> WorkflowResult {
    let failure = |code| WorkflowResult::failure(WorkflowKind::UserPrescriptions, code);

    let user_id = context.user_id.map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return failure(ErrorCode::MissingUserId);
    }
    let Some(user) = context.dataset.user(user_id) else {
        return failure(ErrorCode::UserNotFound);
    };

    let action = intent.prescriptions_action;
    match action {
        PrescriptionsAction::List => {
            let prescriptions = context
                .dataset
                .prescriptions_for(user)
                .into_iter()
                .map(|medication| medication.summary())
                .collect();
            WorkflowResult::success(
                WorkflowKind::UserPrescriptions,
                WorkflowPayload::Prescriptions(PrescriptionList {
                    user: UserSummary::from(user),
                    prescriptions,
                }),
            )
            .with_action(action)
        }
        PrescriptionsAction::Has => match resolve_medication(intent, context) {
            Ok(resolved) => {
                let medication = resolved.medication;
                WorkflowResult::success(
                    WorkflowKind::UserPrescriptions,
                    WorkflowPayload::PrescriptionStatus(PrescriptionStatus {
                        user: UserSummary::from(user),
                        med: medication.summary(),
                        has_prescription: user.has_prescription_for(&medication.id),
                        over_the_counter: medication.is_over_the_counter(),
                    }),
                )
                .with_action(action)
            }
            Err(code) => failure(code).with_action(action),
        },
        PrescriptionsAction::Unknown => failure(ErrorCode::UnknownIntent),
    }
}

#[cfg(test)]
mod tests {
    use pharmai_core::dataset::Dataset;
    use pharmai_core::errors::ErrorCode;
    use serde_json::json;

    use super::handle;
    use crate::conversation::ChatMessage;
    use crate::intent::{Intent, IntentKind, PrescriptionsAction};
    use crate::workflows::test_support::context;

    fn intent(action: PrescriptionsAction) -> Intent {
        Intent::new(IntentKind::UserPrescriptions, 0.9).with_action(action)
    }

    #[test]
    fn blank_user_id_is_missing() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("list my prescriptions")];

        for user_id in [None, Some(""), Some("   ")] {
            let result =
                handle(&intent(PrescriptionsAction::List), &context(&dataset, &conversation, user_id));
            assert_eq!(result.error_code, Some(ErrorCode::MissingUserId));
        }
    }

    #[test]
    fn unknown_user_is_reported_before_the_action() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("what about my prescriptions")];

        let result = handle(
            &intent(PrescriptionsAction::Unknown),
            &context(&dataset, &conversation, Some("u999")),
        );
        assert_eq!(result.error_code, Some(ErrorCode::UserNotFound));

        let unclear = handle(
            &intent(PrescriptionsAction::Unknown),
            &context(&dataset, &conversation, Some("u001")),
        );
        assert_eq!(unclear.error_code, Some(ErrorCode::UnknownIntent));
    }

    #[test]
    fn lists_prescriptions_for_selected_user() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("list my meds")];

        let value = serde_json::to_value(handle(
            &intent(PrescriptionsAction::List),
            &context(&dataset, &conversation, Some(" u001 ")),
        ))
        .expect("serialize");

        assert_eq!(value["action"], json!("LIST"));
        assert_eq!(value["user"]["full_name"], json!("Alice Johnson"));
        assert_eq!(value["user"]["first_name"], json!("Alice"));
        let names = value["prescriptions"]
            .as_array()
            .expect("prescriptions")
            .iter()
            .map(|med| med["brand_name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Zoloft".to_string(), "Lipitor".to_string()]);
    }

    #[test]
    fn has_check_confirms_prescribed_medication() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("am I prescribed augmentin?")];
        let intent = intent(PrescriptionsAction::Has).with_medication("augmentin");

        let value = serde_json::to_value(handle(&intent, &context(&dataset, &conversation, Some("u002"))))
            .expect("serialize");
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["has_prescription"], json!(true));
        assert_eq!(value["over_the_counter"], json!(false));
    }

    #[test]
    fn otc_medication_is_explained_not_missing() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("do I have a prescription for advil?")];
        let intent = intent(PrescriptionsAction::Has).with_medication("advil");

        let result = handle(&intent, &context(&dataset, &conversation, Some("u001")));
        assert!(result.ok);
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["has_prescription"], json!(false));
        assert_eq!(value["over_the_counter"], json!(true));
    }

    #[test]
    fn has_check_without_medication_asks_which_one() {
        let dataset = Dataset::demo();
        let conversation = vec![ChatMessage::user("do I have a prescription for it?")];

        let result =
            handle(&intent(PrescriptionsAction::Has), &context(&dataset, &conversation, Some("u003")));
        assert_eq!(result.error_code, Some(ErrorCode::MissingMedicationQuery));
        assert_eq!(result.action, Some(PrescriptionsAction::Has));
    }
}
