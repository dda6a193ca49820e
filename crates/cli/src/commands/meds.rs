use pharmai_core::dataset::Dataset;
use pharmai_core::domain::medication::MedicationSummary;

pub fn run(json_output: bool) -> String {
    let dataset = Dataset::demo();
    let summaries = dataset.medications().iter().map(|med| med.summary()).collect::<Vec<_>>();

    if json_output {
        return serde_json::to_string_pretty(&summaries).unwrap_or_else(|error| {
            format!("{{\"error\":\"catalogue serialization failed: {error}\"}}")
        });
    }

    let mut lines = vec![format!("demo catalogue ({} medications):", summaries.len())];
    lines.extend(summaries.iter().map(render_line));
    lines.join("\n")
}

fn render_line(summary: &MedicationSummary) -> String {
    let access = if summary.requires_prescription { "Rx" } else { "OTC" };
    let stock = if summary.in_stock { "in stock" } else { "out of stock" };
    format!("- {} {} [{access}, {stock}]", summary.medication_id, summary.name)
}
