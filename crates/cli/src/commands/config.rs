use std::env;
use std::fs;
use std::path::Path;

use pharmai_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions { offline: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["PHARMAI_LLM_PROVIDER"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["PHARMAI_LLM_MODEL", "OPENAI_MODEL"],
        },
        Field {
            key: "llm.base_url",
            value: config.llm.effective_base_url().to_string(),
            env_keys: &["PHARMAI_LLM_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: api_key,
            env_keys: &["PHARMAI_LLM_API_KEY", "OPENAI_API_KEY"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["PHARMAI_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.max_retries",
            value: config.llm.max_retries.to_string(),
            env_keys: &["PHARMAI_LLM_MAX_RETRIES"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["PHARMAI_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["PHARMAI_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["PHARMAI_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "agent.mode",
            value: format!("{:?}", config.agent.mode),
            env_keys: &["PHARMAI_AGENT_MODE"],
        },
        Field {
            key: "agent.min_confidence",
            value: config.agent.min_confidence.to_string(),
            env_keys: &["PHARMAI_AGENT_MIN_CONFIDENCE"],
        },
        Field {
            key: "agent.max_tool_rounds",
            value: config.agent.max_tool_rounds.to_string(),
            env_keys: &["PHARMAI_AGENT_MAX_TOOL_ROUNDS"],
        },
        Field {
            key: "agent.history_window",
            value: config.agent.history_window.to_string(),
            env_keys: &["PHARMAI_AGENT_HISTORY_WINDOW"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PHARMAI_LOGGING_LEVEL", "PHARMAI_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["PHARMAI_LOGGING_FORMAT", "PHARMAI_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env_key = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = set_env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable prefix (`sk-***`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_key_prefix() {
        assert_eq!(redact_token("sk-proj-abcdef"), "sk-***");
        assert_eq!(redact_token("ollama"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_key_paths_are_found_in_the_file() {
        let doc = "[agent]\nmode = \"pipeline\"\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "agent.mode"));
        assert!(!contains_path(&doc, "agent.min_confidence"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
