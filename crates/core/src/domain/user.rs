use serde::{Deserialize, Serialize};

use crate::domain::medication::MedicationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub prescriptions: Vec<MedicationId>,
}

impl User {
    pub fn has_prescription_for(&self, medication_id: &MedicationId) -> bool {
        self.prescriptions.iter().any(|prescribed| prescribed == medication_id)
    }

    pub fn first_name(&self) -> &str {
        self.full_name.split_whitespace().next().unwrap_or(&self.full_name)
    }
}

/// What responders are allowed to see about a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub full_name: String,
    pub first_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            full_name: user.full_name.clone(),
            first_name: user.first_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserId, UserSummary};

    fn user(full_name: &str) -> User {
        User {
            id: UserId("u042".to_string()),
            full_name: full_name.to_string(),
            prescriptions: Vec::new(),
        }
    }

    #[test]
    fn summary_carries_the_first_name() {
        let summary = UserSummary::from(&user("Dana  Lee"));
        assert_eq!(summary.first_name, "Dana");
        assert_eq!(summary.full_name, "Dana  Lee");
    }

    #[test]
    fn single_word_or_blank_names_fall_back_to_the_full_name() {
        assert_eq!(user("Prince").first_name(), "Prince");
        assert_eq!(user("  ").first_name(), "  ");
    }
}
