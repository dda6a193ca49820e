use pharmai_agent::{ChatMessage, ChatRequest};
use pharmai_core::config::{AppConfig, LlmProvider, LoadOptions};
use pharmai_core::dataset::Dataset;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{ask, CommandResult};

const SAMPLE_MESSAGE: &str = "Is Advil in stock?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions { offline: true, ..LoadOptions::default() }) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_credentials(&config));
            checks.push(check_dataset());
            checks.push(check_offline_turn(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_credentials", "dataset_integrity", "offline_turn"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let has_key = config
        .llm
        .api_key
        .as_ref()
        .is_some_and(|key| !key.expose_secret().trim().is_empty());

    match (config.llm.provider, has_key) {
        (LlmProvider::Ollama, _) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "ollama needs no api key; model `{}` at {}",
                config.llm.model,
                config.llm.effective_base_url()
            ),
        },
        (LlmProvider::OpenAi, true) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("api key configured for model `{}`", config.llm.model),
        },
        (LlmProvider::OpenAi, false) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "no api key; set PHARMAI_LLM_API_KEY or OPENAI_API_KEY".to_string(),
        },
    }
}

fn check_dataset() -> DoctorCheck {
    let dataset = Dataset::demo();
    let issues = dataset.validate();
    if issues.is_empty() {
        return DoctorCheck {
            name: "dataset_integrity",
            status: CheckStatus::Pass,
            details: format!(
                "{} medications and {} users; every prescription resolves",
                dataset.medications().len(),
                dataset.users().len()
            ),
        };
    }

    DoctorCheck {
        name: "dataset_integrity",
        status: CheckStatus::Fail,
        details: issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
    }
}

fn check_offline_turn(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "offline_turn",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let request = ChatRequest::new(vec![ChatMessage::user(SAMPLE_MESSAGE)], None);
    match runtime.block_on(ask::answer(config, &request)) {
        Ok(reply) if reply.workflow_result.as_ref().is_some_and(|result| result.ok) => DoctorCheck {
            name: "offline_turn",
            status: CheckStatus::Pass,
            details: format!("`{SAMPLE_MESSAGE}` answered by the stock workflow"),
        },
        Ok(reply) => DoctorCheck {
            name: "offline_turn",
            status: CheckStatus::Fail,
            details: format!(
                "sample turn did not reach a workflow: {}",
                reply
                    .workflow_result
                    .and_then(|result| result.error_code)
                    .map(|code| code.as_str())
                    .unwrap_or("no result")
            ),
        },
        Err(error) => DoctorCheck {
            name: "offline_turn",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
