use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::booking::BookingId;
use crate::lifecycle::{BookingAction, LifecycleError};
use crate::payment::PaymentError;
use crate::reviews::ReviewEligibility;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown booking status `{0}`")]
    UnknownStatus(String),
    #[error("unknown payment status `{0}`")]
    UnknownPaymentStatus(String),
    #[error("unknown review status `{0}`")]
    UnknownReviewStatus(String),
    #[error("rating {0} is outside 1..=5")]
    RatingOutOfRange(i64),
    #[error("commission rate {0} is outside 0..=1")]
    InvalidCommissionRate(Decimal),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error("booking is not eligible for a driver review: {0:?}")]
    ReviewNotEligible(ReviewEligibility),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("session invalid: {0}")]
    SessionInvalid(String),
    #[error("backend rejected the request: {message}")]
    Conflict { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
    #[error("booking {booking_id} not found in the current view")]
    BookingNotFound { booking_id: BookingId },
    #[error("{action:?} already in flight for booking {booking_id}")]
    AlreadyInFlight { booking_id: BookingId, action: BookingAction },
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("{action:?} was applied to booking {booking_id} but the re-fetch failed: {reason}")]
    RefreshFailed { booking_id: BookingId, action: BookingAction, reason: String },
}

impl ApplicationError {
    /// Only transport-level failures are worth an automatic retry, and only
    /// for reads. `RefreshFailed` is never retryable: the mutation already
    /// landed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("session expired: {message}")]
    SessionExpired { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("duplicate submission: {message}")]
    Duplicate { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("applied but not refreshed: {message}")]
    AppliedNotRefreshed { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "That action is not available for this booking. Refresh and try again."
            }
            Self::SessionExpired { .. } => "Your session has expired. Please log in again.",
            Self::Conflict { .. } => {
                "The booking changed before the action completed. Refresh and try again."
            }
            Self::Duplicate { .. } => "This action is already being processed.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please try again."
            }
            Self::AppliedNotRefreshed { .. } => {
                "The action was applied, but the latest bookings could not be loaded. \
                 Refresh before acting again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::SessionExpired { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Duplicate { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::AppliedNotRefreshed { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::SessionExpired { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Duplicate { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::AppliedNotRefreshed { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::BookingNotFound { .. } => {
                Self::BadRequest { message: value.to_string(), correlation_id }
            }
            ApplicationError::SessionInvalid(message) => {
                Self::SessionExpired { message, correlation_id }
            }
            ApplicationError::Conflict { message, .. } => {
                Self::Conflict { message, correlation_id }
            }
            ApplicationError::AlreadyInFlight { .. } => {
                Self::Duplicate { message: value.to_string(), correlation_id }
            }
            ApplicationError::Transport(message) | ApplicationError::Decode(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
            ApplicationError::RefreshFailed { .. } => {
                Self::AppliedNotRefreshed { message: value.to_string(), correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::booking::{BookingId, BookingStatus};
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::lifecycle::{BookingAction, LifecycleError};

    #[test]
    fn lifecycle_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::from(
            LifecycleError::IllegalTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Completed,
            },
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn session_invalid_asks_user_to_log_in_again() {
        let interface =
            ApplicationError::SessionInvalid("401 Unauthorized".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::SessionExpired { .. }));
        assert_eq!(interface.user_message(), "Your session has expired. Please log in again.");
    }

    #[test]
    fn transport_error_is_the_only_retryable_class() {
        assert!(ApplicationError::Transport("connection reset".to_owned()).is_retryable());
        assert!(!ApplicationError::SessionInvalid("403".to_owned()).is_retryable());
        assert!(!ApplicationError::Conflict { status: 409, message: "stale".to_owned() }
            .is_retryable());
        assert!(!ApplicationError::Decode("bad json".to_owned()).is_retryable());
    }

    #[test]
    fn in_flight_duplicate_maps_to_duplicate_submission() {
        let interface = ApplicationError::AlreadyInFlight {
            booking_id: BookingId(4),
            action: BookingAction::PayNow,
        }
        .into_interface("req-3");

        assert_eq!(interface.correlation_id(), "req-3");
        assert_eq!(interface.user_message(), "This action is already being processed.");
    }

    #[test]
    fn conflict_maps_to_refresh_prompt() {
        let interface = ApplicationError::Conflict {
            status: 409,
            message: "booking already started".to_owned(),
        }
        .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(
            interface.user_message(),
            "The booking changed before the action completed. Refresh and try again."
        );
    }

    #[test]
    fn applied_but_unrefreshed_mutation_is_not_retryable() {
        let error = ApplicationError::RefreshFailed {
            booking_id: BookingId(9),
            action: BookingAction::PayNow,
            reason: "transport failure: 503".to_owned(),
        };
        assert!(!error.is_retryable());

        let interface = error.into_interface("req-5");
        assert!(matches!(interface, InterfaceError::AppliedNotRefreshed { .. }));
        assert_eq!(interface.correlation_id(), "req-5");
        assert!(interface.user_message().starts_with("The action was applied"));
    }
}
