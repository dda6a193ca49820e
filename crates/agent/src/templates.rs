use tera::{Context, Tera};

use crate::error::AgentError;
use crate::responder::ResponderContext;
use crate::workflows::WorkflowPayload;

const TEMPLATES: [(&str, &str); 5] = [
    ("med_info.txt", include_str!("../templates/responder/med_info.txt")),
    ("stock.txt", include_str!("../templates/responder/stock.txt")),
    ("prescription_list.txt", include_str!("../templates/responder/prescription_list.txt")),
    ("prescription_check.txt", include_str!("../templates/responder/prescription_check.txt")),
    ("clarify.txt", include_str!("../templates/responder/clarify.txt")),
];

/// Label-style replies rendered from a workflow result without a model.
pub struct ResponseTemplates {
    tera: Tera,
}

impl ResponseTemplates {
    pub fn new() -> Result<Self, AgentError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)
            .map_err(|error| AgentError::Template(format!("failed to load templates: {error}")))?;
        Ok(Self { tera })
    }

    pub fn template_for(context: &ResponderContext) -> &'static str {
        let result = &context.workflow_result;
        if !result.ok {
            return "clarify.txt";
        }
        match result.payload {
            Some(WorkflowPayload::Medication(_)) => "med_info.txt",
            Some(WorkflowPayload::Stock(_)) => "stock.txt",
            Some(WorkflowPayload::Prescriptions(_)) => "prescription_list.txt",
            Some(WorkflowPayload::PrescriptionStatus(_)) => "prescription_check.txt",
            None => "clarify.txt",
        }
    }

    pub fn render(&self, context: &ResponderContext) -> Result<String, AgentError> {
        let name = Self::template_for(context);
        let tera_context = Context::from_serialize(context)
            .map_err(|error| AgentError::Template(error.to_string()))?;
        let rendered = self
            .tera
            .render(name, &tera_context)
            .map_err(|error| AgentError::Template(format!("{name}: {error}")))?;
        Ok(tidy(&rendered))
    }
}

/// Drops the blank lines left by template tags. Each remaining line becomes a
/// paragraph, except that consecutive bullet lines stay together.
pub fn tidy(rendered: &str) -> String {
    let mut output = String::new();
    let mut previous_bullet = false;

    for line in rendered.lines().map(str::trim_end).filter(|line| !line.trim().is_empty()) {
        let bullet = line.starts_with("- ");
        if !output.is_empty() {
            output.push_str(if bullet && previous_bullet { "\n" } else { "\n\n" });
        }
        output.push_str(line);
        previous_bullet = bullet;
    }
    output
}
