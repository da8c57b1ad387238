use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditContext, AuditEventKind, AuditSink};
use crate::domain::booking::{Booking, BookingId, BookingStatus, DriverId, UserId};
use crate::domain::review::DriverReview;
use crate::errors::DomainError;
use crate::payment::check_confirm_payment;
use crate::reviews::{review_eligibility, ReviewEligibility};

/// Who is asking. Drivers and customers carry their identity so ownership and
/// assignment can be checked against the booking record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(UserId),
    Driver(DriverId),
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Driver,
    Admin,
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Self::Customer(_) => ActorRole::Customer,
            Self::Driver(_) => ActorRole::Driver,
            Self::Admin => ActorRole::Admin,
        }
    }

    pub fn owns(&self, booking: &Booking) -> bool {
        matches!(self, Self::Customer(user) if *user == booking.user_id)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer(id) => write!(f, "customer:{id}"),
            Self::Driver(id) => write!(f, "driver:{id}"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for Actor {
    type Err = DomainError;

    /// Accepts `admin`, `customer:<id>` (or `user:<id>`) and `driver:<id>`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().to_ascii_lowercase();
        if trimmed == "admin" {
            return Ok(Self::Admin);
        }
        let invalid = || DomainError::InvariantViolation(format!("invalid actor `{value}`"));
        let (role, id) = trimmed.split_once(':').ok_or_else(invalid)?;
        let id = id.trim().parse::<i64>().map_err(|_| invalid())?;
        match role.trim() {
            "customer" | "user" => Ok(Self::Customer(UserId(id))),
            "driver" => Ok(Self::Driver(DriverId(id))),
            _ => Err(invalid()),
        }
    }
}

/// A status change the backend can be asked to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    AssignDriver,
    StartTrip,
    CompleteTrip,
    Cancel,
}

impl TransitionTrigger {
    pub const ALL: [TransitionTrigger; 4] =
        [Self::AssignDriver, Self::StartTrip, Self::CompleteTrip, Self::Cancel];

    pub fn target(&self) -> BookingStatus {
        match self {
            Self::AssignDriver => BookingStatus::DriverAssigned,
            Self::StartTrip => BookingStatus::Ongoing,
            Self::CompleteTrip => BookingStatus::Completed,
            Self::Cancel => BookingStatus::Cancelled,
        }
    }

    pub fn permits_source(&self, from: BookingStatus) -> bool {
        match self {
            Self::AssignDriver => from == BookingStatus::Pending,
            Self::StartTrip => {
                matches!(from, BookingStatus::DriverAssigned | BookingStatus::Confirmed)
            }
            Self::CompleteTrip => from == BookingStatus::Ongoing,
            Self::Cancel => !from.is_terminal(),
        }
    }

    /// Inverse of [`TransitionTrigger::target`]. `Pending` and `Confirmed` are
    /// never client-requested targets.
    pub fn for_target(to: BookingStatus) -> Option<Self> {
        Self::ALL.into_iter().find(|trigger| trigger.target() == to)
    }

    pub fn action(&self) -> BookingAction {
        match self {
            Self::AssignDriver => BookingAction::AssignDriver,
            Self::StartTrip => BookingAction::StartTrip,
            Self::CompleteTrip => BookingAction::CompleteTrip,
            Self::Cancel => BookingAction::Cancel,
        }
    }
}

/// Affordances a dashboard may render for one booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    AssignDriver,
    StartTrip,
    CompleteTrip,
    Cancel,
    PayNow,
    ReviewDriver,
}

impl BookingAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AssignDriver => "assign driver",
            Self::StartTrip => "start trip",
            Self::CompleteTrip => "complete trip",
            Self::Cancel => "cancel booking",
            Self::PayNow => "confirm payment",
            Self::ReviewDriver => "submit review",
        }
    }

    pub fn failure_message(&self) -> String {
        format!("Could not {}. Refresh and try again.", self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub booking_id: BookingId,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub trigger: TransitionTrigger,
    pub driver_id: Option<DriverId>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: BookingStatus, to: BookingStatus },
    #[error("booking is {status}; no further transitions are permitted")]
    TerminalState { status: BookingStatus },
    #[error("{role:?} may not {trigger:?}")]
    RoleNotPermitted { role: ActorRole, trigger: TransitionTrigger },
    #[error("caller is not the driver assigned to booking {booking_id}")]
    NotAssignedDriver { booking_id: BookingId },
    #[error("caller does not own booking {booking_id}")]
    NotOwner { booking_id: BookingId },
    #[error("assigning a driver requires a driver reference")]
    DriverRequired,
}

/// Client-side mirror of the backend transition table. The backend stays the
/// arbiter; this only decides what may be requested.
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingLifecycle;

impl BookingLifecycle {
    pub fn check(
        &self,
        booking: &Booking,
        actor: &Actor,
        trigger: TransitionTrigger,
    ) -> Result<TransitionPlan, LifecycleError> {
        let from = booking.status;
        let to = trigger.target();

        if !trigger.permits_source(from) {
            if from.is_terminal() {
                return Err(LifecycleError::TerminalState { status: from });
            }
            return Err(LifecycleError::IllegalTransition { from, to });
        }

        match (trigger, actor) {
            (TransitionTrigger::AssignDriver, Actor::Admin) => {}
            (TransitionTrigger::StartTrip | TransitionTrigger::CompleteTrip, Actor::Driver(id)) => {
                if !booking.is_assigned_to(*id) {
                    return Err(LifecycleError::NotAssignedDriver { booking_id: booking.id });
                }
            }
            (TransitionTrigger::Cancel, Actor::Admin) => {}
            (TransitionTrigger::Cancel, Actor::Customer(_)) => {
                if !actor.owns(booking) {
                    return Err(LifecycleError::NotOwner { booking_id: booking.id });
                }
            }
            (trigger, actor) => {
                return Err(LifecycleError::RoleNotPermitted { role: actor.role(), trigger });
            }
        }

        Ok(TransitionPlan {
            booking_id: booking.id,
            from,
            to,
            trigger,
            driver_id: booking.driver_id,
        })
    }

    /// Validates a request for `target` status. `DRIVER_ASSIGNED` must go
    /// through [`BookingLifecycle::assign_driver`] so the driver travels with it.
    pub fn authorize(
        &self,
        booking: &Booking,
        actor: &Actor,
        target: BookingStatus,
    ) -> Result<TransitionPlan, LifecycleError> {
        let Some(trigger) = TransitionTrigger::for_target(target) else {
            if booking.status.is_terminal() {
                return Err(LifecycleError::TerminalState { status: booking.status });
            }
            return Err(LifecycleError::IllegalTransition { from: booking.status, to: target });
        };
        if trigger == TransitionTrigger::AssignDriver {
            return Err(LifecycleError::DriverRequired);
        }
        self.check(booking, actor, trigger)
    }

    pub fn assign_driver(
        &self,
        booking: &Booking,
        actor: &Actor,
        driver: DriverId,
    ) -> Result<TransitionPlan, LifecycleError> {
        let mut plan = self.check(booking, actor, TransitionTrigger::AssignDriver)?;
        plan.driver_id = Some(driver);
        Ok(plan)
    }

    /// [`BookingLifecycle::authorize`] plus an audit event for the outcome.
    /// A `DRIVER_ASSIGNED` target is routed through
    /// [`BookingLifecycle::assign_driver`] with `driver`.
    pub fn authorize_with_audit<S>(
        &self,
        booking: &Booking,
        actor: &Actor,
        target: BookingStatus,
        driver: Option<DriverId>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionPlan, LifecycleError>
    where
        S: AuditSink + ?Sized,
    {
        let result = match (target, driver) {
            (BookingStatus::DriverAssigned, Some(driver)) => {
                self.assign_driver(booking, actor, driver)
            }
            _ => self.authorize(booking, actor, target),
        };
        match &result {
            Ok(plan) => sink.emit(
                audit
                    .event(AuditEventKind::TransitionAuthorized)
                    .with_metadata("from", plan.from.as_wire())
                    .with_metadata("to", plan.to.as_wire()),
            ),
            Err(error) => sink.emit(
                audit
                    .event(AuditEventKind::TransitionRejected)
                    .with_metadata("from", booking.status.as_wire())
                    .with_metadata("to", target.as_wire())
                    .with_metadata("error", error.to_string()),
            ),
        }
        result
    }

    /// Everything `actor` may do with `booking` right now, given the current
    /// authoritative review list.
    pub fn available_actions(
        &self,
        booking: &Booking,
        actor: &Actor,
        reviews: &[DriverReview],
    ) -> Vec<BookingAction> {
        let mut actions: Vec<BookingAction> = TransitionTrigger::ALL
            .into_iter()
            .filter(|trigger| self.check(booking, actor, *trigger).is_ok())
            .map(|trigger| trigger.action())
            .collect();

        if check_confirm_payment(booking, actor).is_ok() {
            actions.push(BookingAction::PayNow);
        }

        if let Actor::Customer(user) = actor {
            if review_eligibility(booking, *user, reviews) == ReviewEligibility::Eligible {
                actions.push(BookingAction::ReviewDriver);
            }
        }

        actions
    }
}
