use std::sync::{Arc, RwLock};

use ridehub_core::{
    check_confirm_payment, Actor, ApplicationError, AuditContext, AuditEventKind, AuditSink,
    Booking, BookingAction, BookingId, BookingLifecycle, BookingStatus, CommissionRate,
    DashboardSnapshot, DomainError, DriverId, DriverReview, InFlightRegistry, NewDriverReview,
    ReviewEligibility, TracingAuditSink,
};
use uuid::Uuid;

use crate::api::{BookingBackend, BookingScope};
use crate::session::{Session, SessionContext};

/// What a caller asked for, before local guards have run.
#[derive(Clone, Debug)]
enum MutationRequest {
    Transition(BookingStatus),
    AssignDriver(DriverId),
    ConfirmPayment,
    SubmitReview { rating: i64, comment: String },
}

/// A request that passed local guards and may be sent once.
#[derive(Clone, Debug)]
enum Mutation {
    Transition { action: BookingAction, target: BookingStatus },
    AssignDriver(DriverId),
    ConfirmPayment,
    SubmitReview(NewDriverReview),
}

impl Mutation {
    fn action(&self) -> BookingAction {
        match self {
            Self::Transition { action, .. } => *action,
            Self::AssignDriver(_) => BookingAction::AssignDriver,
            Self::ConfirmPayment => BookingAction::PayNow,
            Self::SubmitReview(_) => BookingAction::ReviewDriver,
        }
    }
}

/// Everything fetched in one refresh.
#[derive(Debug)]
struct LoadedView {
    scope: BookingScope,
    actor: Actor,
    reviews: Vec<DriverReview>,
    snapshot: DashboardSnapshot,
}

/// Drives every booking interaction: session check, local guard, in-flight
/// ticket, one backend call, audit, then a full re-fetch. Booking state is
/// never patched locally.
pub struct BookingService {
    backend: Arc<dyn BookingBackend>,
    sessions: SessionContext,
    inflight: InFlightRegistry,
    audit: Arc<dyn AuditSink>,
    commission_rate: CommissionRate,
    lifecycle: BookingLifecycle,
    view: RwLock<Option<Arc<LoadedView>>>,
}

impl BookingService {
    pub fn new(
        backend: Arc<dyn BookingBackend>,
        sessions: SessionContext,
        commission_rate: CommissionRate,
    ) -> Self {
        Self {
            backend,
            sessions,
            inflight: InFlightRegistry::default(),
            audit: Arc::new(TracingAuditSink),
            commission_rate,
            lifecycle: BookingLifecycle,
            view: RwLock::new(None),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn sessions(&self) -> &SessionContext {
        &self.sessions
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.inflight
    }

    /// Re-fetches bookings and reviews for the session's own scope.
    pub async fn refresh(&self) -> Result<DashboardSnapshot, ApplicationError> {
        let session = self.sessions.current()?;
        let scope = BookingScope::for_actor(session.actor());
        Ok(self.load(&session, scope).await?.snapshot.clone())
    }

    pub async fn refresh_scope(
        &self,
        scope: BookingScope,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        let session = self.sessions.current()?;
        Ok(self.load(&session, scope).await?.snapshot.clone())
    }

    pub async fn assign_driver(
        &self,
        booking_id: BookingId,
        driver: DriverId,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        self.run(booking_id, MutationRequest::AssignDriver(driver)).await
    }

    pub async fn start_trip(
        &self,
        booking_id: BookingId,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        self.run(booking_id, MutationRequest::Transition(BookingStatus::Ongoing)).await
    }

    pub async fn complete_trip(
        &self,
        booking_id: BookingId,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        self.run(booking_id, MutationRequest::Transition(BookingStatus::Completed)).await
    }

    pub async fn cancel(
        &self,
        booking_id: BookingId,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        self.run(booking_id, MutationRequest::Transition(BookingStatus::Cancelled)).await
    }

    pub async fn confirm_payment(
        &self,
        booking_id: BookingId,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        self.run(booking_id, MutationRequest::ConfirmPayment).await
    }

    pub async fn submit_review(
        &self,
        booking_id: BookingId,
        rating: i64,
        comment: impl Into<String>,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        let request = MutationRequest::SubmitReview { rating, comment: comment.into() };
        self.run(booking_id, request).await
    }

    async fn run(
        &self,
        booking_id: BookingId,
        request: MutationRequest,
    ) -> Result<DashboardSnapshot, ApplicationError> {
        let session = self.sessions.current()?;
        let correlation_id = Uuid::new_v4().to_string();
        let audit =
            AuditContext::new(Some(booking_id), &correlation_id, session.actor().to_string());

        let view = self.view_for(&session, booking_id).await?;
        let booking = view
            .snapshot
            .find(booking_id)
            .cloned()
            .ok_or(ApplicationError::BookingNotFound { booking_id })?;
        let mutation = self.guard(&booking, &session, &view.reviews, request, &audit)?;
        let action = mutation.action();

        let Some(ticket) = self.inflight.try_begin(booking_id, action) else {
            tracing::info!(
                event_name = "booking.mutation_deduplicated",
                correlation_id = %correlation_id,
                booking_id = booking_id.0,
                action = action.label(),
                "mutation already in flight; not re-sent"
            );
            return Err(ApplicationError::AlreadyInFlight { booking_id, action });
        };

        let outcome = self.send(&session, booking_id, &mutation).await;
        // Once a request has left, the next guard must run on a fresh view.
        self.clear_view();
        let refreshed = match outcome {
            Ok(()) => {
                self.audit.emit(
                    audit
                        .event(AuditEventKind::ActionApplied(action))
                        .with_metadata("action", action.label()),
                );
                tracing::info!(
                    event_name = "booking.mutation_applied",
                    correlation_id = %correlation_id,
                    booking_id = booking_id.0,
                    action = action.label(),
                    "backend accepted mutation"
                );
                self.load(&session, view.scope).await.map_err(|refresh_error| {
                    tracing::warn!(
                        event_name = "booking.refresh_failed",
                        correlation_id = %correlation_id,
                        booking_id = booking_id.0,
                        action = action.label(),
                        error = %refresh_error,
                        "mutation applied but the re-fetch failed"
                    );
                    if refresh_error.is_session_invalid() {
                        refresh_error
                    } else {
                        ApplicationError::RefreshFailed {
                            booking_id,
                            action,
                            reason: refresh_error.to_string(),
                        }
                    }
                })
            }
            Err(error) => {
                self.record_failure(&audit, action, &error);
                if !error.is_session_invalid() {
                    if let Err(refresh_error) = self.load(&session, view.scope).await {
                        tracing::warn!(
                            event_name = "booking.refresh_failed",
                            correlation_id = %correlation_id,
                            error = %refresh_error,
                            "could not re-fetch after failed mutation"
                        );
                    }
                }
                Err(error)
            }
        };
        drop(ticket);
        refreshed.map(|loaded| loaded.snapshot.clone())
    }

    fn record_failure(
        &self,
        audit: &AuditContext,
        action: BookingAction,
        error: &ApplicationError,
    ) {
        if error.is_session_invalid() {
            self.sessions.invalidate(&error.to_string());
            self.audit.emit(
                audit
                    .event(AuditEventKind::SessionInvalidated)
                    .with_metadata("reason", error.to_string()),
            );
        }
        self.audit.emit(
            audit
                .event(AuditEventKind::ActionFailed(action))
                .with_metadata("error", error.to_string()),
        );
        tracing::warn!(
            event_name = "booking.mutation_failed",
            correlation_id = %audit.correlation_id,
            booking_id = ?audit.booking_id.map(|id| id.0),
            action = action.label(),
            error = %error,
            "{}",
            action.failure_message()
        );
    }

    fn guard(
        &self,
        booking: &Booking,
        session: &Session,
        reviews: &[DriverReview],
        request: MutationRequest,
        audit: &AuditContext,
    ) -> Result<Mutation, ApplicationError> {
        let actor = session.actor();
        let sink = self.audit.as_ref();
        match request {
            MutationRequest::Transition(target) => {
                let plan = self
                    .lifecycle
                    .authorize_with_audit(booking, actor, target, None, sink, audit)
                    .map_err(DomainError::from)?;
                Ok(Mutation::Transition { action: plan.trigger.action(), target: plan.to })
            }
            MutationRequest::AssignDriver(driver) => {
                self.lifecycle
                    .authorize_with_audit(
                        booking,
                        actor,
                        BookingStatus::DriverAssigned,
                        Some(driver),
                        sink,
                        audit,
                    )
                    .map_err(DomainError::from)?;
                Ok(Mutation::AssignDriver(driver))
            }
            MutationRequest::ConfirmPayment => match check_confirm_payment(booking, actor) {
                Ok(()) => Ok(Mutation::ConfirmPayment),
                Err(error) => {
                    sink.emit(
                        audit
                            .event(AuditEventKind::PaymentRejected)
                            .with_metadata("error", error.to_string()),
                    );
                    Err(DomainError::from(error).into())
                }
            },
            MutationRequest::SubmitReview { rating, comment } => {
                let Actor::Customer(user) = actor else {
                    return Err(DomainError::ReviewNotEligible(ReviewEligibility::NotOwner).into());
                };
                let review = NewDriverReview::new(booking, *user, rating, comment, reviews)?;
                Ok(Mutation::SubmitReview(review))
            }
        }
    }

    async fn send(
        &self,
        session: &Session,
        booking_id: BookingId,
        mutation: &Mutation,
    ) -> Result<(), ApplicationError> {
        match mutation {
            Mutation::Transition { target, .. } => {
                self.backend.update_status(session, booking_id, *target).await
            }
            Mutation::AssignDriver(driver) => {
                self.backend.assign_driver(session, booking_id, *driver).await
            }
            Mutation::ConfirmPayment => self.backend.confirm_payment(session, booking_id).await,
            Mutation::SubmitReview(review) => {
                self.backend.submit_driver_review(session, review).await
            }
        }
    }

    /// The cached view when it belongs to this actor and lists `booking_id`,
    /// otherwise a fresh load of the actor's own scope.
    async fn view_for(
        &self,
        session: &Session,
        booking_id: BookingId,
    ) -> Result<Arc<LoadedView>, ApplicationError> {
        if let Some(view) = self.cached_view() {
            if view.actor == *session.actor() && view.snapshot.find(booking_id).is_some() {
                return Ok(view);
            }
        }
        self.load(session, BookingScope::for_actor(session.actor())).await
    }

    async fn load(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Arc<LoadedView>, ApplicationError> {
        let fetched = tokio::try_join!(
            self.backend.list_bookings(session, scope),
            self.backend.list_driver_reviews(session, scope),
        );
        let (bookings, reviews) = match fetched {
            Ok(lists) => lists,
            Err(error) => {
                if error.is_session_invalid() {
                    self.sessions.invalidate(&error.to_string());
                }
                return Err(error);
            }
        };

        for booking in &bookings {
            for violation in booking.check_invariants() {
                tracing::warn!(
                    event_name = "booking.invariant_violation",
                    booking_id = booking.id.0,
                    violation = ?violation,
                    "backend returned a booking that breaks a lifecycle invariant"
                );
            }
        }

        let snapshot =
            DashboardSnapshot::build(*session.actor(), &bookings, &reviews, self.commission_rate);
        tracing::info!(
            event_name = "booking.refresh",
            scope = ?scope,
            total = snapshot.counts.total,
            active = snapshot.counts.active,
            completed = snapshot.counts.completed,
            reviews = reviews.len(),
            "booking view refreshed"
        );

        let view = Arc::new(LoadedView { scope, actor: *session.actor(), reviews, snapshot });
        self.store_view(Arc::clone(&view));
        Ok(view)
    }

    fn cached_view(&self) -> Option<Arc<LoadedView>> {
        match self.view.read() {
            Ok(view) => view.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn clear_view(&self) {
        match self.view.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn store_view(&self, view: Arc<LoadedView>) {
        match self.view.write() {
            Ok(mut slot) => *slot = Some(view),
            Err(poisoned) => *poisoned.into_inner() = Some(view),
        }
    }
}
