pub mod audit;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod errors;
pub mod financials;
pub mod inflight;
pub mod lifecycle;
pub mod payment;
pub mod reviews;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditEventKind, AuditOutcome, AuditSink,
    InMemoryAuditSink, TracingAuditSink,
};
pub use dashboard::{BookingCard, DashboardCounts, DashboardSnapshot};
pub use domain::booking::{
    Booking, BookingId, BookingNumber, BookingStatus, DriverId, PaymentStatus, UserId, VehicleId,
};
pub use domain::review::{DriverReview, Rating, RatingSummary, ReviewId, ReviewStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use financials::{
    compute_financials, driver_earnings, monthly_breakdown, BucketField, CommissionRate,
    Financials, MonthlyFinancials, YearMonth,
};
pub use inflight::{InFlightRegistry, InFlightTicket};
pub use lifecycle::{
    Actor, ActorRole, BookingAction, BookingLifecycle, LifecycleError, TransitionPlan,
    TransitionTrigger,
};
pub use payment::{check_confirm_payment, PaymentAffordance, PaymentError};
pub use reviews::{annotate_reviews, review_eligibility, NewDriverReview, ReviewEligibility};
