use std::env;
use std::sync::{Mutex, OnceLock};

use pharmai_cli::commands::{ask, config, doctor, meds};
use serde_json::Value;

#[test]
fn ask_answers_stock_question_offline() {
    with_env(&[], || {
        let result = ask::run("Is Advil in stock?", None, false);
        assert_eq!(result.exit_code, 0, "expected offline answer: {}", result.output);
        assert!(result.output.starts_with("Yes, **Advil (Ibuprofen) 200mg** is in stock"));
    });
}

#[test]
fn ask_json_includes_intent_and_workflow_result() {
    with_env(&[], || {
        let result = ask::run("what's in tylenol?", None, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"]["intent"], "MED_LOOKUP");
        assert_eq!(payload["intent"]["med_info_type"], "INGREDIENTS");
        assert_eq!(payload["workflow_result"]["type"], "med_lookup");
        assert_eq!(payload["workflow_result"]["ok"], true);
    });
}

#[test]
fn ask_redirects_personal_advice_to_a_clinician() {
    with_env(&[], || {
        let result = ask::run("Can I take Advil with my blood pressure meds?", None, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["workflow_result"]["ok"], false);
        assert_eq!(payload["workflow_result"]["error_code"], "NEEDS_CLINICIAN");
        assert!(payload["assistant"].as_str().unwrap_or_default().contains("healthcare professional"));
    });
}

#[test]
fn ask_lists_prescriptions_for_a_demo_user() {
    with_env(&[], || {
        let result = ask::run("list my prescriptions", Some("u003".to_string()), false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("Carol, here are the prescriptions on file for you:"));
    });
}

#[test]
fn ask_reports_config_failure_as_structured_error() {
    with_env(&[("PHARMAI_AGENT_MIN_CONFIDENCE", "2")], || {
        let result = ask::run("Is Advil in stock?", None, false);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_with_ollama_provider() {
    with_env(&[("PHARMAI_LLM_PROVIDER", "ollama")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| check["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["config_validation", "llm_credentials", "dataset_integrity", "offline_turn"]);
    });
}

#[test]
fn doctor_fails_credentials_check_without_api_key() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "llm_credentials");
        assert_eq!(payload["checks"][1]["status"], "fail");
        assert_eq!(payload["checks"][2]["status"], "pass");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("PHARMAI_AGENT_MODE", "autopilot")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] offline_turn"));
    });
}

#[test]
fn config_redacts_api_key_and_attributes_env_source() {
    with_env(&[("OPENAI_API_KEY", "sk-very-secret-value")], || {
        let output = config::run();
        assert!(output.contains("- llm.api_key = sk-*** (source: env (OPENAI_API_KEY))"), "{output}");
        assert!(!output.contains("very-secret-value"));
        assert!(output.contains("- agent.mode = Pipeline (source: default)"));
    });
}

#[test]
fn meds_lists_the_whole_catalogue() {
    let output = meds::run(false);
    let lines = output.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "demo catalogue (12 medications):");
    assert_eq!(lines.len(), 13);
    assert!(lines.iter().any(|line| line.contains("Glucophage") && line.ends_with("[Rx, out of stock]")));
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PHARMAI_LLM_PROVIDER",
        "PHARMAI_LLM_API_KEY",
        "PHARMAI_LLM_BASE_URL",
        "PHARMAI_LLM_MODEL",
        "PHARMAI_LLM_TIMEOUT_SECS",
        "PHARMAI_LLM_MAX_RETRIES",
        "PHARMAI_SERVER_BIND_ADDRESS",
        "PHARMAI_SERVER_PORT",
        "PHARMAI_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PHARMAI_AGENT_MODE",
        "PHARMAI_AGENT_MIN_CONFIDENCE",
        "PHARMAI_AGENT_MAX_TOOL_ROUNDS",
        "PHARMAI_AGENT_HISTORY_WINDOW",
        "PHARMAI_LOGGING_LEVEL",
        "PHARMAI_LOGGING_FORMAT",
        "PHARMAI_LOG_LEVEL",
        "PHARMAI_LOG_FORMAT",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
