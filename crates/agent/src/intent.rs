use std::sync::Arc;

use async_trait::async_trait;
use pharmai_core::dataset::Dataset;
use pharmai_core::matcher::{normalize_text, MedicationMatcher};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conversation::{last_user_message, recent_window, render_transcript, ChatMessage};
use crate::error::AgentError;
use crate::llm::{CompletionRequest, LlmClient, PromptMessage};
use crate::prompts;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    MedLookup,
    UserPrescriptions,
    StockCheck,
    PrescriptionCheck,
    #[serde(other)]
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedLookup => "MED_LOOKUP",
            Self::UserPrescriptions => "USER_PRESCRIPTIONS",
            Self::StockCheck => "STOCK_CHECK",
            Self::PrescriptionCheck => "PRESCRIPTION_CHECK",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Which part of a medication record the user asked about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedInfoSection {
    Warnings,
    Dosage,
    Ingredients,
    Prescription,
    #[default]
    #[serde(other)]
    Full,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionsAction {
    List,
    Has,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Structured classification of the latest user message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "intent")]
    pub kind: IntentKind,
    #[serde(default)]
    pub medication_query: Option<String>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub med_info_type: MedInfoSection,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub needs_clinician: bool,
    #[serde(default)]
    pub clinician_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_action")]
    pub prescriptions_action: PrescriptionsAction,
    pub confidence: f64,
}

impl Intent {
    pub fn new(kind: IntentKind, confidence: f64) -> Self {
        Self {
            kind,
            medication_query: None,
            med_info_type: MedInfoSection::Full,
            needs_clinician: false,
            clinician_reason: None,
            prescriptions_action: PrescriptionsAction::Unknown,
            confidence,
        }
    }

    pub fn unknown() -> Self {
        Self::new(IntentKind::Unknown, 0.0)
    }

    pub fn with_medication(mut self, query: impl Into<String>) -> Self {
        self.medication_query = Some(query.into());
        self
    }

    pub fn with_section(mut self, section: MedInfoSection) -> Self {
        self.med_info_type = section;
        self
    }

    pub fn with_action(mut self, action: PrescriptionsAction) -> Self {
        self.prescriptions_action = action;
        self
    }

    pub fn needing_clinician(mut self, reason: Option<String>) -> Self {
        self.needs_clinician = true;
        self.clinician_reason = reason;
        self
    }

    /// The classifier's medication query, ignoring blank strings.
    pub fn explicit_medication_query(&self) -> Option<&str> {
        self.medication_query.as_deref().map(str::trim).filter(|query| !query.is_empty())
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(AgentError::MalformedModelOutput(format!(
                "intent confidence {} is outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

fn lenient_section<'de, D>(deserializer: D) -> Result<MedInfoSection, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<MedInfoSection>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_action<'de, D>(deserializer: D) -> Result<PrescriptionsAction, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<PrescriptionsAction>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses classifier output, tolerating Markdown code fences and prose around
/// the JSON object.
pub fn parse_intent(raw: &str) -> Result<Intent, AgentError> {
    let trimmed = raw.trim();
    let object = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(AgentError::MalformedModelOutput(format!(
                "classifier returned no JSON object: {trimmed:.120}"
            )))
        }
    };

    let intent: Intent = serde_json::from_str(object).map_err(|error| {
        AgentError::MalformedModelOutput(format!("invalid intent JSON: {error}"))
    })?;
    intent.validate()?;
    Ok(intent)
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, conversation: &[ChatMessage]) -> Result<Intent, AgentError>;
}

/// Classifies with the language model in JSON mode.
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmClient>,
    history_window: usize,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, history_window: usize) -> Self {
        Self { llm, history_window: history_window.max(1) }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, conversation: &[ChatMessage]) -> Result<Intent, AgentError> {
        let today = chrono::Local::now().format("%A, %B %d, %Y").to_string();
        let transcript = render_transcript(recent_window(conversation, self.history_window));
        let request = CompletionRequest::new(
            prompts::classifier_instructions(&today),
            vec![PromptMessage::User(transcript)],
        )
        .json()
        .with_temperature(0.0);

        let raw = self.llm.complete(&request).await?;
        let intent = parse_intent(&raw)?;

        info!(
            event_name = "agent.intent.classified",
            classifier = "llm",
            intent = intent.kind.as_str(),
            confidence = intent.confidence,
            medication_query = intent.medication_query.as_deref().unwrap_or(""),
            needs_clinician = intent.needs_clinician,
            "intent classified"
        );
        Ok(intent)
    }
}

const CLINICIAN_PHRASES: &[&str] = &[
    "should i",
    "is it safe for me",
    "safe for me",
    "can i take",
    "pregnan",
    "breastfeed",
    "nursing",
    "my doctor",
    "interact",
    "together with",
    "diagnos",
    "what should i take",
];

const PRESCRIPTION_LIST_PHRASES: &[&str] = &[
    "my prescriptions",
    "my meds",
    "my medications",
    "my medicines",
    "list my",
    "what am i prescribed",
];

const PRESCRIPTION_HAS_PHRASES: &[&str] = &[
    "do i have a prescription",
    "am i prescribed",
    "have i been prescribed",
    "is there a prescription for me",
];

const PRESCRIPTION_REQUIRED_PHRASES: &[&str] = &[
    "need a prescription",
    "require a prescription",
    "requires a prescription",
    "prescription required",
    "over the counter",
    "otc",
];

const STOCK_PHRASES: &[&str] =
    &["in stock", "out of stock", "available", "do you have", "do you carry", "stock"];

/// Deterministic phrase-matching classifier. Needs no network, so the CLI uses
/// it for offline turns.
pub struct KeywordIntentClassifier {
    dataset: Arc<Dataset>,
}

impl KeywordIntentClassifier {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn classify_text(&self, text: &str) -> Intent {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Intent::unknown();
        }

        let medication = MedicationMatcher::new(self.dataset.medications()).resolve(&normalized);
        let section = extract_section(&normalized);
        let kind = extract_kind(&normalized, medication.is_some(), section.is_some());

        let mut intent = Intent::new(
            kind,
            confidence_score(medication.is_some(), kind != IntentKind::Unknown, section.is_some()),
        );
        if let Some(medication) = medication {
            intent = intent.with_medication(medication.brand_name.clone());
        }
        if kind == IntentKind::MedLookup {
            intent = intent.with_section(section.unwrap_or_default());
        }
        if kind == IntentKind::UserPrescriptions {
            let asks_has = contains_any(&normalized, PRESCRIPTION_HAS_PHRASES);
            let action = if asks_has || medication.is_some() {
                PrescriptionsAction::Has
            } else if contains_any(&normalized, PRESCRIPTION_LIST_PHRASES) {
                PrescriptionsAction::List
            } else {
                PrescriptionsAction::Unknown
            };
            intent = intent.with_action(action);
        }
        if contains_any(&normalized, CLINICIAN_PHRASES) {
            intent = intent.needing_clinician(Some(
                "That depends on your personal medical situation, so please check with a pharmacist or doctor."
                    .to_string(),
            ));
        }
        intent
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, conversation: &[ChatMessage]) -> Result<Intent, AgentError> {
        let intent = self.classify_text(last_user_message(conversation));
        info!(
            event_name = "agent.intent.classified",
            classifier = "keyword",
            intent = intent.kind.as_str(),
            confidence = intent.confidence,
            needs_clinician = intent.needs_clinician,
            "intent classified"
        );
        Ok(intent)
    }
}

fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| normalized.contains(phrase))
}

fn extract_kind(normalized: &str, has_medication: bool, has_section: bool) -> IntentKind {
    if contains_any(normalized, PRESCRIPTION_HAS_PHRASES)
        || contains_any(normalized, PRESCRIPTION_LIST_PHRASES)
    {
        IntentKind::UserPrescriptions
    } else if contains_any(normalized, PRESCRIPTION_REQUIRED_PHRASES) {
        IntentKind::PrescriptionCheck
    } else if contains_any(normalized, STOCK_PHRASES) {
        IntentKind::StockCheck
    } else if has_medication || has_section {
        IntentKind::MedLookup
    } else {
        IntentKind::Unknown
    }
}

fn extract_section(normalized: &str) -> Option<MedInfoSection> {
    if normalized.contains("ingredient") || normalized.contains("what's in") {
        Some(MedInfoSection::Ingredients)
    } else if ["warning", "side effect", "risk", "danger"]
        .iter()
        .any(|word| normalized.contains(word))
    {
        Some(MedInfoSection::Warnings)
    } else if ["dose", "dosage", "how to take", "how much", "how often", "directions"]
        .iter()
        .any(|word| normalized.contains(word))
    {
        Some(MedInfoSection::Dosage)
    } else if normalized.contains("prescription") {
        Some(MedInfoSection::Prescription)
    } else if ["everything", "full info", "tell me about"]
        .iter()
        .any(|word| normalized.contains(word))
    {
        Some(MedInfoSection::Full)
    } else {
        None
    }
}

fn confidence_score(has_medication: bool, has_kind: bool, has_section: bool) -> f64 {
    let mut score = 0.2;
    if has_medication {
        score += 0.5;
    }
    if has_kind {
        score += 0.2;
    }
    if has_section {
        score += 0.1;
    }
    f64::min(score, 1.0)
}
