use pharmai_core::errors::ErrorCode;
use pharmai_core::matcher::normalize_text;

use crate::intent::Intent;

pub const DEFAULT_CLINICIAN_MESSAGE: &str =
    "I can't give personalized medical advice. Please check with a pharmacist or your doctor.";

/// Openings that mark a reason as classifier narration rather than a sentence
/// addressed to the user.
const META_REASON_PREFIXES: &[&str] = &["asks for", "user asks", "the user asks"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Redirect { reason_code: ErrorCode, user_message: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub fallback_message: String,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { fallback_message: DEFAULT_CLINICIAN_MESSAGE.to_string() }
    }
}

impl GuardrailPolicy {
    /// Runs before any workflow. A clinician flag always wins, whatever the
    /// intent kind.
    pub fn evaluate(&self, intent: &Intent) -> GuardrailDecision {
        if !intent.needs_clinician {
            return GuardrailDecision::Allow;
        }

        GuardrailDecision::Redirect {
            reason_code: ErrorCode::NeedsClinician,
            user_message: self.sanitize_reason(intent.clinician_reason.as_deref()),
            fallback_path: "clinician_referral",
        }
    }

    pub fn sanitize_reason(&self, reason: Option<&str>) -> String {
        let Some(reason) = reason.map(str::trim).filter(|reason| !reason.is_empty()) else {
            return self.fallback_message.clone();
        };

        let normalized = normalize_text(reason);
        if META_REASON_PREFIXES.iter().any(|prefix| normalized.starts_with(prefix)) {
            return self.fallback_message.clone();
        }
        reason.to_string()
    }
}

#[cfg(test)]
mod tests {
    use pharmai_core::errors::ErrorCode;

    use super::{GuardrailDecision, GuardrailPolicy, DEFAULT_CLINICIAN_MESSAGE};
    use crate::intent::{Intent, IntentKind};

    #[test]
    fn intents_without_clinician_flag_are_allowed() {
        let decision =
            GuardrailPolicy::default().evaluate(&Intent::new(IntentKind::MedLookup, 0.9));
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn clinician_flag_redirects_with_the_classifier_sentence() {
        let intent = Intent::new(IntentKind::StockCheck, 0.9).needing_clinician(Some(
            "Whether ibuprofen is safe during pregnancy depends on your situation.".to_string(),
        ));

        let (reason_code, user_message, fallback_path) =
            match GuardrailPolicy::default().evaluate(&intent) {
                GuardrailDecision::Redirect { reason_code, user_message, fallback_path } => {
                    (reason_code, user_message, fallback_path)
                }
                GuardrailDecision::Allow => (ErrorCode::ToolError, String::new(), ""),
            };

        assert_eq!(reason_code, ErrorCode::NeedsClinician);
        assert!(user_message.starts_with("Whether ibuprofen is safe"));
        assert_eq!(fallback_path, "clinician_referral");
    }

    #[test]
    fn meta_or_empty_reasons_are_replaced() {
        let policy = GuardrailPolicy::default();
        for reason in [
            None,
            Some(""),
            Some("   "),
            Some("Asks for dosing advice"),
            Some("User asks about pregnancy"),
            Some("the user asks whether to combine meds"),
        ] {
            assert_eq!(policy.sanitize_reason(reason), DEFAULT_CLINICIAN_MESSAGE, "{reason:?}");
        }
    }
}
