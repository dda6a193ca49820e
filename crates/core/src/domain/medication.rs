use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MedicationId(pub String);

impl MedicationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MedicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub brand_name: String,
    pub generic_name: String,
    pub active_ingredients: Vec<String>,
    pub form: String,
    pub strength: String,
    pub rx_required: bool,
    pub usage_instructions: String,
    pub warnings: String,
    pub aliases: Vec<String>,
    pub in_stock: bool,
}

impl Medication {
    /// `"Advil (Ibuprofen) 200mg"`
    pub fn display_name(&self) -> String {
        format!("{} ({}) {}", self.brand_name, self.generic_name, self.strength).trim().to_string()
    }

    /// Brand name, generic name, then aliases, in the order the matcher tries them.
    pub fn searchable_names(&self) -> impl Iterator<Item = &str> {
        [self.brand_name.as_str(), self.generic_name.as_str()]
            .into_iter()
            .chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_over_the_counter(&self) -> bool {
        !self.rx_required
    }

    pub fn summary(&self) -> MedicationSummary {
        MedicationSummary {
            medication_id: self.id.clone(),
            name: self.display_name(),
            brand_name: self.brand_name.clone(),
            generic_name: self.generic_name.clone(),
            active_ingredients: self.active_ingredients.clone(),
            form: self.form.clone(),
            strength: self.strength.clone(),
            requires_prescription: self.rx_required,
            dosage_instructions: self.usage_instructions.clone(),
            warnings: self.warnings.clone(),
            in_stock: self.in_stock,
        }
    }
}

/// Label-style projection handed to responders. Aliases stay internal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationSummary {
    pub medication_id: MedicationId,
    pub name: String,
    pub brand_name: String,
    pub generic_name: String,
    pub active_ingredients: Vec<String>,
    pub form: String,
    pub strength: String,
    pub requires_prescription: bool,
    pub dosage_instructions: String,
    pub warnings: String,
    pub in_stock: bool,
}
