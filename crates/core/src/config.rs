use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::financials::{BucketField, CommissionRate};
use crate::lifecycle::Actor;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub finance: FinanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub read_max_attempts: u32,
    pub read_retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub token: Option<SecretString>,
    pub actor: Option<Actor>,
}

#[derive(Clone, Debug)]
pub struct FinanceConfig {
    pub commission_rate: CommissionRate,
    pub revenue_bucket: BucketField,
    pub earnings_bucket: BucketField,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub session_token: Option<String>,
    pub session_actor: Option<Actor>,
    pub commission_rate: Option<Decimal>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 15,
                read_max_attempts: 3,
                read_retry_base_delay_ms: 250,
            },
            session: SessionConfig { token: None, actor: None },
            finance: FinanceConfig {
                commission_rate: CommissionRate::STANDARD,
                revenue_bucket: BucketField::StartDate,
                earnings_bucket: BucketField::EndDate,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ridehub.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        if config.finance.commission_rate != CommissionRate::STANDARD {
            tracing::warn!(
                event_name = "system.config.commission_rate_override",
                configured = %config.finance.commission_rate,
                standard = %CommissionRate::STANDARD,
                "commission rate differs from the 15% used by trip and earnings views; \
                 one admin caption advertises 20%, confirm the authoritative rate"
            );
        }

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(api) = patch.api {
            if let Some(base_url) = api.base_url {
                self.api.base_url = base_url;
            }
            if let Some(timeout_secs) = api.timeout_secs {
                self.api.timeout_secs = timeout_secs;
            }
            if let Some(read_max_attempts) = api.read_max_attempts {
                self.api.read_max_attempts = read_max_attempts;
            }
            if let Some(delay) = api.read_retry_base_delay_ms {
                self.api.read_retry_base_delay_ms = delay;
            }
        }

        if let Some(session) = patch.session {
            if let Some(session_token_value) = session.token {
                self.session.token = Some(secret_value(session_token_value));
            }
            if let Some(actor) = session.actor {
                self.session.actor = Some(parse_actor("session.actor", &actor)?);
            }
        }

        if let Some(finance) = patch.finance {
            if let Some(rate) = finance.commission_rate {
                self.finance.commission_rate = commission_rate("finance.commission_rate", rate)?;
            }
            if let Some(bucket) = finance.revenue_bucket {
                self.finance.revenue_bucket = bucket;
            }
            if let Some(bucket) = finance.earnings_bucket {
                self.finance.earnings_bucket = bucket;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RIDEHUB_API_BASE_URL") {
            self.api.base_url = value;
        }
        if let Some(value) = read_env("RIDEHUB_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_u64("RIDEHUB_API_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RIDEHUB_API_READ_MAX_ATTEMPTS") {
            self.api.read_max_attempts = parse_u32("RIDEHUB_API_READ_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("RIDEHUB_API_READ_RETRY_BASE_DELAY_MS") {
            self.api.read_retry_base_delay_ms =
                parse_u64("RIDEHUB_API_READ_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("RIDEHUB_SESSION_TOKEN") {
            self.session.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RIDEHUB_SESSION_ACTOR") {
            self.session.actor = Some(parse_actor("RIDEHUB_SESSION_ACTOR", &value)?);
        }

        if let Some(value) = read_env("RIDEHUB_FINANCE_COMMISSION_RATE") {
            let rate = value.trim().parse::<Decimal>().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "RIDEHUB_FINANCE_COMMISSION_RATE".to_string(),
                    value: value.clone(),
                }
            })?;
            self.finance.commission_rate =
                commission_rate("RIDEHUB_FINANCE_COMMISSION_RATE", rate)?;
        }
        if let Some(value) = read_env("RIDEHUB_FINANCE_REVENUE_BUCKET") {
            self.finance.revenue_bucket = parse_bucket("RIDEHUB_FINANCE_REVENUE_BUCKET", &value)?;
        }
        if let Some(value) = read_env("RIDEHUB_FINANCE_EARNINGS_BUCKET") {
            self.finance.earnings_bucket =
                parse_bucket("RIDEHUB_FINANCE_EARNINGS_BUCKET", &value)?;
        }

        let log_level =
            read_env("RIDEHUB_LOGGING_LEVEL").or_else(|| read_env("RIDEHUB_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RIDEHUB_LOGGING_FORMAT").or_else(|| read_env("RIDEHUB_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(base_url) = overrides.api_base_url {
            self.api.base_url = base_url;
        }
        if let Some(session_token) = overrides.session_token {
            self.session.token = Some(secret_value(session_token));
        }
        if let Some(actor) = overrides.session_actor {
            self.session.actor = Some(actor);
        }
        if let Some(rate) = overrides.commission_rate {
            self.finance.commission_rate = commission_rate("commission_rate", rate)?;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_api(&self.api)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ridehub.toml"), PathBuf::from("config/ridehub.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_api(api: &ApiConfig) -> Result<(), ConfigError> {
    let base_url = api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "api.base_url must start with http:// or https://".to_string(),
        ));
    }

    if api.timeout_secs == 0 || api.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "api.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if api.read_max_attempts == 0 || api.read_max_attempts > 10 {
        return Err(ConfigError::Validation(
            "api.read_max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if api.read_retry_base_delay_ms > 60_000 {
        return Err(ConfigError::Validation(
            "api.read_retry_base_delay_ms must not exceed 60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(token) = &session.token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.token is set but empty; remove it or log in again".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn commission_rate(key: &str, rate: Decimal) -> Result<CommissionRate, ConfigError> {
    CommissionRate::new(rate)
        .map_err(|_| ConfigError::Validation(format!("{key} must be in range 0..=1, got {rate}")))
}

fn parse_actor(key: &str, value: &str) -> Result<Actor, ConfigError> {
    value.parse::<Actor>().map_err(|_| {
        ConfigError::Validation(format!(
            "{key} must be `admin`, `customer:<id>` or `driver:<id>`, got `{value}`"
        ))
    })
}

fn parse_bucket(key: &str, value: &str) -> Result<BucketField, ConfigError> {
    value.parse::<BucketField>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    api: Option<ApiPatch>,
    session: Option<SessionPatch>,
    finance: Option<FinancePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    read_max_attempts: Option<u32>,
    read_retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    token: Option<String>,
    actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FinancePatch {
    commission_rate: Option<Decimal>,
    revenue_bucket: Option<BucketField>,
    earnings_bucket: Option<BucketField>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::booking::DriverId;
    use crate::financials::{BucketField, CommissionRate};
    use crate::lifecycle::Actor;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_use_standard_rate_and_distinct_buckets() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.finance.commission_rate == CommissionRate::STANDARD,
            "default commission rate should be 15%",
        )?;
        ensure(
            config.finance.revenue_bucket == BucketField::StartDate,
            "revenue trend should bucket by start date",
        )?;
        ensure(
            config.finance.earnings_bucket == BucketField::EndDate,
            "earnings trend should bucket by end date",
        )?;
        ensure(config.session.token.is_none(), "no session token by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RIDEHUB_TOKEN", "jwt-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ridehub.toml");
            fs::write(
                &path,
                r#"
[session]
token = "${TEST_RIDEHUB_TOKEN}"
actor = "driver:7"

[finance]
commission_rate = 0.15
earnings_bucket = "start_date"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.session.token.as_ref().map(|token| token.expose_secret())
                    == Some("jwt-from-env"),
                "session token should be loaded from environment",
            )?;
            ensure(
                config.session.actor == Some(Actor::Driver(DriverId(7))),
                "actor should parse from file",
            )?;
            ensure(
                config.finance.earnings_bucket == BucketField::StartDate,
                "file should override earnings bucket",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_RIDEHUB_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RIDEHUB_LOG_LEVEL", "warn");
        env::set_var("RIDEHUB_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["RIDEHUB_LOG_LEVEL", "RIDEHUB_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RIDEHUB_API_BASE_URL", "https://env.example.com");
        env::set_var("RIDEHUB_SESSION_TOKEN", "jwt-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ridehub.toml");
            fs::write(
                &path,
                r#"
[api]
base_url = "https://file.example.com"
timeout_secs = 20

[session]
token = "jwt-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    api_base_url: Some("https://override.example.com".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.api.base_url == "https://override.example.com",
                "override base url should win",
            )?;
            ensure(config.api.timeout_secs == 20, "file timeout should beat the default")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.session.token.as_ref().map(|token| token.expose_secret())
                    == Some("jwt-from-env"),
                "env token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["RIDEHUB_API_BASE_URL", "RIDEHUB_SESSION_TOKEN"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RIDEHUB_API_BASE_URL", "ftp://bookings");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("api.base_url")
            );
            ensure(has_message, "validation failure should mention api.base_url")
        })();

        clear_vars(&["RIDEHUB_API_BASE_URL"]);
        result
    }

    #[test]
    fn out_of_range_commission_rate_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                commission_rate: Some(Decimal::new(120, 2)),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(error, Err(ConfigError::Validation(ref message)) if message.contains("0..=1")),
            "commission rate above 1 should fail validation",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RIDEHUB_SESSION_TOKEN", "jwt-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("jwt-secret-value"), "debug output should not contain token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["RIDEHUB_SESSION_TOKEN"]);
        result
    }
}
