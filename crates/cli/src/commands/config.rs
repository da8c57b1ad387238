use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ridehub_core::config::AppConfig;
use toml::Value;

use crate::commands::runtime::{self, GlobalOptions};
use crate::commands::CommandResult;

/// One rendered config key with the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    flag: Option<&'static str>,
}

pub fn run(options: &GlobalOptions) -> CommandResult {
    let config = match runtime::load_config("config", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    for field in fields(&config, options) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig, options: &GlobalOptions) -> Vec<Field> {
    let session_token = if config.session.token.is_some() { "<redacted>" } else { "<unset>" };
    let session_actor =
        config.session.actor.map(|actor| actor.to_string()).unwrap_or_else(|| "<unset>".into());

    vec![
        Field {
            key: "api.base_url",
            value: config.api.base_url.clone(),
            env_keys: &["RIDEHUB_API_BASE_URL"],
            flag: None,
        },
        Field {
            key: "api.timeout_secs",
            value: config.api.timeout_secs.to_string(),
            env_keys: &["RIDEHUB_API_TIMEOUT_SECS"],
            flag: None,
        },
        Field {
            key: "api.read_max_attempts",
            value: config.api.read_max_attempts.to_string(),
            env_keys: &["RIDEHUB_API_READ_MAX_ATTEMPTS"],
            flag: None,
        },
        Field {
            key: "api.read_retry_base_delay_ms",
            value: config.api.read_retry_base_delay_ms.to_string(),
            env_keys: &["RIDEHUB_API_READ_RETRY_BASE_DELAY_MS"],
            flag: None,
        },
        Field {
            key: "session.token",
            value: session_token.to_string(),
            env_keys: &["RIDEHUB_SESSION_TOKEN"],
            flag: None,
        },
        Field {
            key: "session.actor",
            value: session_actor,
            env_keys: &["RIDEHUB_SESSION_ACTOR"],
            flag: options.actor.is_some().then_some("--as"),
        },
        Field {
            key: "finance.commission_rate",
            value: config.finance.commission_rate.value().to_string(),
            env_keys: &["RIDEHUB_FINANCE_COMMISSION_RATE"],
            flag: None,
        },
        Field {
            key: "finance.revenue_bucket",
            value: format!("{:?}", config.finance.revenue_bucket),
            env_keys: &["RIDEHUB_FINANCE_REVENUE_BUCKET"],
            flag: None,
        },
        Field {
            key: "finance.earnings_bucket",
            value: format!("{:?}", config.finance.earnings_bucket),
            env_keys: &["RIDEHUB_FINANCE_EARNINGS_BUCKET"],
            flag: None,
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["RIDEHUB_LOGGING_LEVEL", "RIDEHUB_LOG_LEVEL"],
            flag: None,
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["RIDEHUB_LOGGING_FORMAT", "RIDEHUB_LOG_FORMAT"],
            flag: None,
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("ridehub.toml"), PathBuf::from("config/ridehub.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(flag) = field.flag {
        return format!("flag ({flag})");
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[finance]\ncommission_rate = 0.2\n".parse().expect("toml");
        assert!(contains_path(&doc, "finance.commission_rate"));
        assert!(!contains_path(&doc, "finance.revenue_bucket"));
        assert!(!contains_path(&doc, "api.base_url"));
    }
}
