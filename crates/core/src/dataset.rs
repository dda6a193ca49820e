use std::collections::HashMap;

use crate::domain::medication::{Medication, MedicationId};
use crate::domain::user::{User, UserId};
use crate::errors::DomainError;

/// Canonical demo catalogue. Order matters: the matcher breaks ties by position.
const MEDICATION_SEEDS: &[MedicationSeed] = &[
    MedicationSeed {
        id: "m001",
        brand_name: "Tylenol",
        generic_name: "Paracetamol",
        active_ingredients: &["Paracetamol"],
        form: "tablet",
        strength: "500mg",
        rx_required: false,
        usage_instructions: "Adults: 500-1000 mg every 4-6 hours as needed. Max 4000 mg/day.",
        warnings: "Avoid exceeding the maximum daily dose. Check other products for paracetamol.",
        aliases: &["acetaminophen", "panadol"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m002",
        brand_name: "Advil",
        generic_name: "Ibuprofen",
        active_ingredients: &["Ibuprofen"],
        form: "tablet",
        strength: "200mg",
        rx_required: false,
        usage_instructions:
            "Adults: 200-400 mg every 6-8 hours with food as needed. Max 1200 mg/day OTC.",
        warnings: "May irritate the stomach. Not recommended with other NSAIDs.",
        aliases: &["nurofen", "motrin"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m003",
        brand_name: "Claritin",
        generic_name: "Loratadine",
        active_ingredients: &["Loratadine"],
        form: "tablet",
        strength: "10mg",
        rx_required: false,
        usage_instructions: "Adults and children 12+: 10 mg once daily.",
        warnings: "Do not exceed one tablet in 24 hours.",
        aliases: &["alavert"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m004",
        brand_name: "Zyrtec",
        generic_name: "Cetirizine",
        active_ingredients: &["Cetirizine hydrochloride"],
        form: "tablet",
        strength: "10mg",
        rx_required: false,
        usage_instructions: "Adults and children 6+: 5-10 mg once daily.",
        warnings: "May cause drowsiness. Avoid alcohol.",
        aliases: &["reactine"],
        in_stock: false,
    },
    MedicationSeed {
        id: "m005",
        brand_name: "Pepcid",
        generic_name: "Famotidine",
        active_ingredients: &["Famotidine"],
        form: "tablet",
        strength: "20mg",
        rx_required: false,
        usage_instructions: "Adults: 20 mg up to twice daily. Do not use more than 14 days.",
        warnings: "Stop use if heartburn continues beyond 14 days.",
        aliases: &[],
        in_stock: true,
    },
    MedicationSeed {
        id: "m006",
        brand_name: "Zoloft",
        generic_name: "Sertraline",
        active_ingredients: &["Sertraline hydrochloride"],
        form: "tablet",
        strength: "50mg",
        rx_required: true,
        usage_instructions: "Take once daily as directed by the prescriber.",
        warnings: "Do not stop abruptly. Contact a clinician about mood changes.",
        aliases: &["lustral"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m007",
        brand_name: "Augmentin",
        generic_name: "Amoxicillin-Clavulanate",
        active_ingredients: &["Amoxicillin", "Clavulanic acid"],
        form: "tablet",
        strength: "875mg/125mg",
        rx_required: true,
        usage_instructions: "Take every 12 hours with food for the prescribed course.",
        warnings: "Tell the pharmacist about penicillin allergies. Finish the full course.",
        aliases: &["co-amoxiclav", "amoxiclav"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m008",
        brand_name: "Lipitor",
        generic_name: "Atorvastatin",
        active_ingredients: &["Atorvastatin calcium"],
        form: "tablet",
        strength: "20mg",
        rx_required: true,
        usage_instructions: "Take once daily at the same time each day.",
        warnings: "Report unexplained muscle pain. Avoid large amounts of grapefruit juice.",
        aliases: &[],
        in_stock: true,
    },
    MedicationSeed {
        id: "m009",
        brand_name: "Glucophage",
        generic_name: "Metformin",
        active_ingredients: &["Metformin hydrochloride"],
        form: "tablet",
        strength: "500mg",
        rx_required: true,
        usage_instructions: "Take with meals as directed by the prescriber.",
        warnings: "May cause stomach upset. Limit alcohol.",
        aliases: &[],
        in_stock: false,
    },
    MedicationSeed {
        id: "m010",
        brand_name: "Ventolin",
        generic_name: "Albuterol",
        active_ingredients: &["Albuterol sulfate"],
        form: "inhaler",
        strength: "100mcg/dose",
        rx_required: true,
        usage_instructions: "1-2 puffs every 4-6 hours as needed.",
        warnings: "Seek help if you need it more often than usual.",
        aliases: &["salbutamol", "proair"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m011",
        brand_name: "Synthroid",
        generic_name: "Levothyroxine",
        active_ingredients: &["Levothyroxine sodium"],
        form: "tablet",
        strength: "50mcg",
        rx_required: true,
        usage_instructions: "Take once daily on an empty stomach, 30-60 minutes before breakfast.",
        warnings: "Separate from calcium or iron supplements by 4 hours.",
        aliases: &["levoxyl", "euthyrox"],
        in_stock: true,
    },
    MedicationSeed {
        id: "m012",
        brand_name: "Benadryl",
        generic_name: "Diphenhydramine",
        active_ingredients: &["Diphenhydramine hydrochloride"],
        form: "capsule",
        strength: "25mg",
        rx_required: false,
        usage_instructions: "Adults: 25-50 mg every 4-6 hours. Max 6 doses/day.",
        warnings: "Causes drowsiness. Do not drive after taking.",
        aliases: &[],
        in_stock: true,
    },
];

const USER_SEEDS: &[UserSeed] = &[
    UserSeed { id: "u001", full_name: "Alice Johnson", prescriptions: &["m006", "m008"] },
    UserSeed { id: "u002", full_name: "Bob Smith", prescriptions: &["m007"] },
    UserSeed { id: "u003", full_name: "Carol Diaz", prescriptions: &["m010", "m011", "m009"] },
];

struct MedicationSeed {
    id: &'static str,
    brand_name: &'static str,
    generic_name: &'static str,
    active_ingredients: &'static [&'static str],
    form: &'static str,
    strength: &'static str,
    rx_required: bool,
    usage_instructions: &'static str,
    warnings: &'static str,
    aliases: &'static [&'static str],
    in_stock: bool,
}

struct UserSeed {
    id: &'static str,
    full_name: &'static str,
    prescriptions: &'static [&'static str],
}

impl MedicationSeed {
    fn to_medication(&self) -> Medication {
        Medication {
            id: MedicationId(self.id.to_string()),
            brand_name: self.brand_name.to_string(),
            generic_name: self.generic_name.to_string(),
            active_ingredients: self.active_ingredients.iter().map(ToString::to_string).collect(),
            form: self.form.to_string(),
            strength: self.strength.to_string(),
            rx_required: self.rx_required,
            usage_instructions: self.usage_instructions.to_string(),
            warnings: self.warnings.to_string(),
            aliases: self.aliases.iter().map(ToString::to_string).collect(),
            in_stock: self.in_stock,
        }
    }
}

impl UserSeed {
    fn to_user(&self) -> User {
        User {
            id: UserId(self.id.to_string()),
            full_name: self.full_name.to_string(),
            prescriptions: self
                .prescriptions
                .iter()
                .map(|id| MedicationId((*id).to_string()))
                .collect(),
        }
    }
}

/// Read-only medication and user tables with id-keyed indexes.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    medications: Vec<Medication>,
    users: Vec<User>,
    medication_index: HashMap<MedicationId, usize>,
    user_index: HashMap<UserId, usize>,
}

impl Dataset {
    pub fn new(medications: Vec<Medication>, users: Vec<User>) -> Self {
        let medication_index = medications
            .iter()
            .enumerate()
            .map(|(position, medication)| (medication.id.clone(), position))
            .collect();
        let user_index =
            users.iter().enumerate().map(|(position, user)| (user.id.clone(), position)).collect();

        Self { medications, users, medication_index, user_index }
    }

    pub fn demo() -> Self {
        Self::new(
            MEDICATION_SEEDS.iter().map(MedicationSeed::to_medication).collect(),
            USER_SEEDS.iter().map(UserSeed::to_user).collect(),
        )
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn medication(&self, id: &MedicationId) -> Option<&Medication> {
        self.medication_index.get(id).and_then(|position| self.medications.get(*position))
    }

    /// Lookup by raw id; surrounding whitespace is ignored.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.user_index
            .get(&UserId(id.trim().to_string()))
            .and_then(|position| self.users.get(*position))
    }

    /// Prescribed medications in prescription order. Dangling ids are skipped;
    /// `validate` reports them.
    pub fn prescriptions_for(&self, user: &User) -> Vec<&Medication> {
        user.prescriptions.iter().filter_map(|id| self.medication(id)).collect()
    }

    pub fn validate(&self) -> Vec<DomainError> {
        let mut problems = Vec::new();

        if self.medication_index.len() != self.medications.len() {
            problems.push(DomainError::InvariantViolation(
                "medication ids must be unique".to_string(),
            ));
        }
        if self.user_index.len() != self.users.len() {
            problems.push(DomainError::InvariantViolation("user ids must be unique".to_string()));
        }

        for user in &self.users {
            for medication_id in &user.prescriptions {
                if self.medication(medication_id).is_none() {
                    problems.push(DomainError::DanglingPrescription {
                        user_id: user.id.clone(),
                        medication_id: medication_id.clone(),
                    });
                }
            }
        }

        problems
    }
}
