use pharmai_core::domain::medication::Medication;
use pharmai_core::matcher::MedicationMatcher;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One chat turn. The client sends the full history each time so the server
/// stays stateless.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation: Vec<ChatMessage>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(conversation: Vec<ChatMessage>, user_id: Option<String>) -> Self {
        Self { conversation, user_id }
    }

    pub fn last_user_message(&self) -> &str {
        last_user_message(&self.conversation)
    }
}

pub fn last_user_message(conversation: &[ChatMessage]) -> &str {
    conversation
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .unwrap_or("")
}

/// The newest `window` messages.
pub fn recent_window(conversation: &[ChatMessage], window: usize) -> &[ChatMessage] {
    let start = conversation.len().saturating_sub(window);
    &conversation[start..]
}

/// `role: content` lines, oldest first, skipping empty messages.
pub fn render_transcript(conversation: &[ChatMessage]) -> String {
    conversation
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .map(|message| format!("{}: {}", message.role.as_str(), message.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Most recently mentioned medication, walking the conversation newest first.
/// Resolves follow-ups such as "what about the warnings?".
pub fn infer_medication_from_history<'a>(
    conversation: &[ChatMessage],
    matcher: &MedicationMatcher<'a>,
) -> Option<&'a Medication> {
    conversation.iter().rev().find_map(|message| matcher.resolve(&message.content))
}

#[cfg(test)]
mod tests {
    use pharmai_core::dataset::Dataset;
    use pharmai_core::matcher::MedicationMatcher;

    use super::{
        infer_medication_from_history, last_user_message, recent_window, render_transcript,
        ChatMessage, ChatRequest, Role,
    };

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let conversation = vec![
            ChatMessage::user("tell me about advil"),
            ChatMessage::assistant("Advil is ibuprofen."),
        ];
        assert_eq!(last_user_message(&conversation), "tell me about advil");
        assert_eq!(last_user_message(&[]), "");
    }

    #[test]
    fn unknown_roles_deserialize_as_other() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"conversation":[{"role":"tool","content":"{}"},{"role":"user","content":"hi"}]}"#,
        )
        .expect("request should parse");

        assert_eq!(request.conversation[0].role, Role::Other);
        assert_eq!(request.last_user_message(), "hi");
        assert!(request.user_id.is_none());
    }

    #[test]
    fn history_inference_prefers_most_recent_mention() {
        let dataset = Dataset::demo();
        let matcher = MedicationMatcher::new(dataset.medications());
        let conversation = vec![
            ChatMessage::user("is tylenol in stock?"),
            ChatMessage::assistant("Yes."),
            ChatMessage::user("and what about zyrtec?"),
            ChatMessage::assistant("Zyrtec is out of stock."),
            ChatMessage::user("what are the warnings?"),
        ];

        let inferred = infer_medication_from_history(&conversation, &matcher);
        assert_eq!(inferred.map(|medication| medication.brand_name.as_str()), Some("Zyrtec"));
    }

    #[test]
    fn transcript_and_window_keep_the_newest_messages() {
        let conversation = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("   "),
            ChatMessage::user("two"),
            ChatMessage::assistant("three"),
        ];

        let window = recent_window(&conversation, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(render_transcript(window), "user: two\nassistant: three");
        assert_eq!(recent_window(&conversation, 10).len(), 4);
    }
}
