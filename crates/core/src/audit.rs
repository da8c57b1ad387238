use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::BookingId;
use crate::lifecycle::BookingAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Session,
    Lifecycle,
    Payment,
    Review,
}

impl AuditCategory {
    pub fn of_action(action: BookingAction) -> Self {
        match action {
            BookingAction::AssignDriver
            | BookingAction::StartTrip
            | BookingAction::CompleteTrip
            | BookingAction::Cancel => Self::Lifecycle,
            BookingAction::PayNow => Self::Payment,
            BookingAction::ReviewDriver => Self::Review,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// Every booking decision point that leaves an audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "action", rename_all = "snake_case")]
pub enum AuditEventKind {
    /// The backend refused the credential and the local session was cleared.
    SessionInvalidated,
    TransitionAuthorized,
    TransitionRejected,
    PaymentRejected,
    /// The backend accepted the mutation.
    ActionApplied(BookingAction),
    /// The mutation reached the backend and was refused or lost.
    ActionFailed(BookingAction),
}

impl AuditEventKind {
    pub fn event_type(&self) -> String {
        match self {
            Self::SessionInvalidated => "session.invalidated".to_string(),
            Self::TransitionAuthorized => "booking.transition_authorized".to_string(),
            Self::TransitionRejected => "booking.transition_rejected".to_string(),
            Self::PaymentRejected => "booking.payment_rejected".to_string(),
            Self::ActionApplied(action) => format!("booking.{}", applied_name(*action)),
            Self::ActionFailed(action) => format!("booking.{}_failed", applied_name(*action)),
        }
    }

    pub fn category(&self) -> AuditCategory {
        match self {
            Self::SessionInvalidated => AuditCategory::Session,
            Self::TransitionAuthorized | Self::TransitionRejected => AuditCategory::Lifecycle,
            Self::PaymentRejected => AuditCategory::Payment,
            Self::ActionApplied(action) | Self::ActionFailed(action) => {
                AuditCategory::of_action(*action)
            }
        }
    }

    pub fn outcome(&self) -> AuditOutcome {
        match self {
            Self::TransitionAuthorized | Self::ActionApplied(_) => AuditOutcome::Success,
            Self::TransitionRejected | Self::PaymentRejected => AuditOutcome::Rejected,
            Self::SessionInvalidated | Self::ActionFailed(_) => AuditOutcome::Failed,
        }
    }
}

fn applied_name(action: BookingAction) -> &'static str {
    match action {
        BookingAction::AssignDriver => "driver_assigned",
        BookingAction::StartTrip => "trip_started",
        BookingAction::CompleteTrip => "trip_completed",
        BookingAction::Cancel => "cancelled",
        BookingAction::PayNow => "payment_confirmed",
        BookingAction::ReviewDriver => "review_submitted",
    }
}

/// Who acted on which booking, shared by every event of one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub booking_id: Option<BookingId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        booking_id: Option<BookingId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { booking_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn event(&self, kind: AuditEventKind) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            booking_id: self.booking_id,
            correlation_id: self.correlation_id.clone(),
            kind,
            event_type: kind.event_type(),
            category: kind.category(),
            actor: self.actor.clone(),
            outcome: kind.outcome(),
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub booking_id: Option<BookingId>,
    pub correlation_id: String,
    pub kind: AuditEventKind,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Forwards audit events to `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            booking_id = ?event.booking_id.map(|id| id.0),
            actor = %event.actor,
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{
        AuditCategory, AuditContext, AuditEventKind, AuditOutcome, AuditSink, InMemoryAuditSink,
    };
    use crate::domain::booking::BookingId;
    use crate::lifecycle::BookingAction;

    #[test]
    fn context_stamps_booking_and_correlation_on_each_event() {
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(Some(BookingId(42)), "req-123", "driver:7");
        sink.emit(
            context
                .event(AuditEventKind::TransitionAuthorized)
                .with_metadata("from", "CONFIRMED")
                .with_metadata("to", "ONGOING"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].booking_id, Some(BookingId(42)));
        assert_eq!(events[0].actor, "driver:7");
        assert_eq!(events[0].event_type, "booking.transition_authorized");
        assert!(events[0].metadata.contains_key("from"));
    }

    #[test]
    fn action_events_are_named_and_filed_by_booking_action() {
        let paid = AuditEventKind::ActionApplied(BookingAction::PayNow);
        assert_eq!(paid.event_type(), "booking.payment_confirmed");
        assert_eq!(paid.category(), AuditCategory::Payment);
        assert_eq!(paid.outcome(), AuditOutcome::Success);

        let lost = AuditEventKind::ActionFailed(BookingAction::ReviewDriver);
        assert_eq!(lost.event_type(), "booking.review_submitted_failed");
        assert_eq!(lost.category(), AuditCategory::Review);
        assert_eq!(lost.outcome(), AuditOutcome::Failed);

        let cancelled = AuditEventKind::ActionApplied(BookingAction::Cancel);
        assert_eq!(cancelled.category(), AuditCategory::Lifecycle);
        assert_eq!(AuditEventKind::SessionInvalidated.category(), AuditCategory::Session);
        assert_eq!(AuditEventKind::PaymentRejected.outcome(), AuditOutcome::Rejected);
    }
}
