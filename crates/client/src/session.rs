use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use ridehub_core::config::SessionConfig;
use ridehub_core::{Actor, ApplicationError};
use secrecy::{ExposeSecret, SecretString};

/// An authenticated caller: bearer credential plus the identity the backend
/// issued it for.
#[derive(Clone, Debug)]
pub struct Session {
    token: SecretString,
    actor: Actor,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SecretString, actor: Actor) -> Self {
        Self { token, actor, started_at: Utc::now() }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// Shared holder for the current session. Created empty, filled at login,
/// cleared at logout or when the backend rejects the credential.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn from_config(config: &SessionConfig) -> Self {
        let context = Self::default();
        if let (Some(token), Some(actor)) = (&config.token, config.actor) {
            context.login(token.clone(), actor);
        }
        context
    }

    pub fn login(&self, token: SecretString, actor: Actor) -> Session {
        let session = Session::new(token, actor);
        self.replace(Some(session.clone()));
        tracing::info!(event_name = "session.login", actor = %actor, "session started");
        session
    }

    pub fn logout(&self) {
        self.replace(None);
        tracing::info!(event_name = "session.logout", "session cleared");
    }

    /// Drops the session after the backend refused it.
    pub fn invalidate(&self, reason: &str) {
        if self.replace(None).is_some() {
            tracing::warn!(
                event_name = "session.invalidated",
                reason,
                "session invalidated; log in again"
            );
        }
    }

    pub fn current(&self) -> Result<Session, ApplicationError> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .clone()
            .ok_or_else(|| ApplicationError::SessionInvalid("no active session".to_string()))
    }

    pub fn is_active(&self) -> bool {
        self.current().is_ok()
    }

    fn replace(&self, next: Option<Session>) -> Option<Session> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
