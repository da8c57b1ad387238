use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use ridehub_client::{
    wire, BookingService, HttpBookingBackend, MemoryBookingBackend, SessionContext,
};
use ridehub_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use ridehub_core::{Actor, ApplicationError};
use secrecy::SecretString;
use serde_json::Value;
use uuid::Uuid;

use crate::commands::CommandResult;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_SESSION: u8 = 4;
pub const EXIT_REJECTED: u8 = 5;

const OFFLINE_TOKEN: &str = "offline-session";

/// Flags shared by every subcommand.
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub actor: Option<Actor>,
    pub offline: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides { session_actor: self.actor, ..ConfigOverrides::default() },
        }
    }
}

pub struct CommandContext {
    pub config: AppConfig,
    pub service: BookingService,
    pub correlation_id: String,
}

pub fn load_config(command: &str, options: &GlobalOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.load_options()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

pub fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

/// Loads config, wires a [`BookingService`] and drives `body` to completion
/// on a current-thread runtime.
pub fn with_service<F, Fut>(command: &str, options: &GlobalOptions, body: F) -> CommandResult
where
    F: FnOnce(CommandContext) -> Fut,
    Fut: Future<Output = CommandResult>,
{
    let config = match load_config(command, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    runtime.block_on(async move {
        let service = match connect(&config, options).await {
            Ok(service) => service,
            Err(error) => {
                return CommandResult::failure(
                    command,
                    "runtime",
                    format!("{error:#}"),
                    EXIT_RUNTIME,
                );
            }
        };
        let correlation_id = Uuid::new_v4().to_string();
        tracing::debug!(
            event_name = "cli.command_started",
            command,
            correlation_id = %correlation_id,
            offline = options.offline.is_some(),
            "running command"
        );
        body(CommandContext { config, service, correlation_id }).await
    })
}

/// Builds the service against the REST backend, or against an in-memory
/// backend seeded from `--offline` when one is given.
pub async fn connect(
    config: &AppConfig,
    options: &GlobalOptions,
) -> anyhow::Result<BookingService> {
    let rate = config.finance.commission_rate;
    let sessions = SessionContext::from_config(&config.session);

    match &options.offline {
        Some(path) => {
            let backend = load_fixture(path).await?;
            if !sessions.is_active() {
                if let Some(actor) = config.session.actor {
                    sessions.login(SecretString::from(OFFLINE_TOKEN.to_string()), actor);
                }
            }
            Ok(BookingService::new(Arc::new(backend), sessions, rate))
        }
        None => {
            let backend = HttpBookingBackend::new(&config.api)
                .context("could not prepare the booking API client")?;
            Ok(BookingService::new(Arc::new(backend), sessions, rate))
        }
    }
}

/// Reads an offline fixture: either a JSON array of wire bookings or an
/// object with `bookings` and optional `reviews` arrays.
pub async fn load_fixture(path: &Path) -> anyhow::Result<MemoryBookingBackend> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("could not read offline fixture `{}`", path.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("offline fixture `{}` is not valid JSON", path.display()))?;

    let (bookings, reviews) = match document {
        Value::Array(items) => (Value::Array(items), Value::Null),
        Value::Object(mut fields) if fields.contains_key("bookings") => (
            fields.remove("bookings").unwrap_or(Value::Null),
            fields.remove("reviews").unwrap_or(Value::Null),
        ),
        _ => bail!(
            "offline fixture `{}` must be a bookings array or an object with `bookings`",
            path.display()
        ),
    };

    let bookings =
        wire::bookings_from_value(bookings).context("offline fixture has unreadable bookings")?;
    let reviews =
        wire::reviews_from_value(reviews).context("offline fixture has unreadable reviews")?;

    tracing::info!(
        event_name = "cli.offline_fixture_loaded",
        path = %path.display(),
        bookings = bookings.len(),
        reviews = reviews.len(),
        "serving bookings from offline fixture"
    );

    let backend = MemoryBookingBackend::with_bookings(bookings);
    for review in reviews {
        backend.insert_review(review).await;
    }
    Ok(backend)
}

pub fn error_class(error: &ApplicationError) -> (&'static str, u8) {
    match error {
        ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
        ApplicationError::SessionInvalid(_) => ("session_invalid", EXIT_SESSION),
        ApplicationError::Conflict { .. } => ("conflict", EXIT_REJECTED),
        ApplicationError::Transport(_) | ApplicationError::Decode(_) => {
            ("backend_unavailable", EXIT_REJECTED)
        }
        ApplicationError::Domain(_) | ApplicationError::BookingNotFound { .. } => {
            ("action_rejected", EXIT_REJECTED)
        }
        ApplicationError::AlreadyInFlight { .. } => ("duplicate_submission", EXIT_REJECTED),
        ApplicationError::RefreshFailed { .. } => ("applied_not_refreshed", EXIT_RUNTIME),
    }
}

/// Renders an application failure as the user-facing message plus the
/// underlying detail.
pub fn application_failure(
    command: &str,
    error: ApplicationError,
    correlation_id: &str,
) -> CommandResult {
    let (class, exit_code) = error_class(&error);
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id);
    tracing::warn!(
        event_name = "cli.command_failed",
        command,
        correlation_id,
        error_class = class,
        error = %detail,
        "command failed"
    );
    CommandResult::failure_with_correlation(
        command,
        class,
        format!("{} ({detail})", interface.user_message()),
        exit_code,
        Some(interface.correlation_id().to_string()),
    )
}

pub fn to_data<T: serde::Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(
                event_name = "cli.payload_serialization_failed",
                error = %error,
                "could not serialize command data"
            );
            None
        }
    }
}
