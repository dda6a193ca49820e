//! Free-text medication resolution.
//!
//! Matching is a linear scan over the catalogue in dataset order, so the first
//! medication that matches wins.

use crate::domain::medication::Medication;

/// Shortest single-token query that may match a name partially (`"ibupro"`).
const MIN_PARTIAL_QUERY_CHARS: usize = 4;

/// Lowercase, trim, and collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[derive(Clone, Copy, Debug)]
pub struct MedicationMatcher<'a> {
    medications: &'a [Medication],
}

impl<'a> MedicationMatcher<'a> {
    pub fn new(medications: &'a [Medication]) -> Self {
        Self { medications }
    }

    /// First medication whose brand name, generic name, or alias occurs in `text`.
    ///
    /// A lone token that names nothing falls back to partial matching, so
    /// `"ibupro"` still finds Ibuprofen. Empty or unmatched text yields `None`.
    pub fn resolve(&self, text: &str) -> Option<&'a Medication> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return None;
        }

        self.find_mentioned(&normalized).or_else(|| self.find_partial(&normalized))
    }

    fn find_mentioned(&self, normalized: &str) -> Option<&'a Medication> {
        self.medications.iter().find(|medication| {
            medication.searchable_names().any(|name| {
                let name = normalize_text(name);
                !name.is_empty() && normalized.contains(&name)
            })
        })
    }

    fn find_partial(&self, normalized: &str) -> Option<&'a Medication> {
        let single_token = !normalized.contains(' ');
        if !single_token || normalized.chars().count() < MIN_PARTIAL_QUERY_CHARS {
            return None;
        }

        self.medications.iter().find(|medication| {
            medication.searchable_names().any(|name| normalize_text(name).contains(normalized))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_text, MedicationMatcher};
    use crate::dataset::Dataset;

    fn resolved_id(dataset: &Dataset, text: &str) -> Option<String> {
        MedicationMatcher::new(dataset.medications())
            .resolve(text)
            .map(|medication| medication.id.0.clone())
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Ibuprofen\t 200MG \n"), "ibuprofen 200mg");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn ibuprofen_with_strength_resolves_to_advil() {
        let dataset = Dataset::demo();
        assert_eq!(resolved_id(&dataset, "ibuprofen 200mg").as_deref(), Some("m002"));
    }

    #[test]
    fn every_brand_generic_and_alias_resolves_to_its_record() {
        let dataset = Dataset::demo();
        for medication in dataset.medications() {
            for name in medication.searchable_names() {
                let text = format!("Can you tell me about {name} please?");
                assert_eq!(
                    resolved_id(&dataset, &text).as_deref(),
                    Some(medication.id.as_str()),
                    "`{name}` should resolve to {}",
                    medication.id
                );
            }
        }
    }

    #[test]
    fn unknown_text_is_not_found() {
        let dataset = Dataset::demo();
        for text in ["what's the weather like", "adderall", "", "   ", "pill"] {
            assert_eq!(resolved_id(&dataset, text), None, "`{text}` should not resolve");
        }
    }

    #[test]
    fn single_token_partial_names_resolve() {
        let dataset = Dataset::demo();
        assert_eq!(resolved_id(&dataset, "Ibupro").as_deref(), Some("m002"));
        assert_eq!(resolved_id(&dataset, "amoxicillin").as_deref(), Some("m007"));
        assert_eq!(resolved_id(&dataset, "ibu"), None);
    }

    #[test]
    fn ties_are_broken_by_dataset_order() {
        let dataset = Dataset::demo();
        assert_eq!(resolved_id(&dataset, "advil or tylenol?").as_deref(), Some("m001"));
    }
}
