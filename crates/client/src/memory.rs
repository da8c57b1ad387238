use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ridehub_core::{
    check_confirm_payment, review_eligibility, Actor, ApplicationError, Booking, BookingId,
    BookingLifecycle, BookingStatus, DriverId, DriverReview, NewDriverReview, PaymentStatus,
    ReviewId, ReviewStatus,
};
use tokio::sync::RwLock;

use crate::api::{BookingBackend, BookingScope};
use crate::session::Session;

#[derive(Debug, Default)]
struct MemoryState {
    bookings: BTreeMap<BookingId, Booking>,
    reviews: Vec<DriverReview>,
}

/// In-process backend that enforces the same transition table as the real
/// one. Used by tests and the CLI offline mode.
#[derive(Debug, Default)]
pub struct MemoryBookingBackend {
    state: RwLock<MemoryState>,
    mutations_received: AtomicUsize,
    sessions_revoked: AtomicBool,
}

impl MemoryBookingBackend {
    pub fn with_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let state = MemoryState {
            bookings: bookings.into_iter().map(|booking| (booking.id, booking)).collect(),
            reviews: Vec::new(),
        };
        Self { state: RwLock::new(state), ..Self::default() }
    }

    pub async fn insert_review(&self, review: DriverReview) {
        self.state.write().await.reviews.push(review);
    }

    /// Simulates moderation removing a review upstream.
    pub async fn remove_review(&self, id: ReviewId) -> bool {
        let mut state = self.state.write().await;
        let before = state.reviews.len();
        state.reviews.retain(|review| review.id != id);
        state.reviews.len() != before
    }

    pub async fn booking(&self, id: BookingId) -> Option<Booking> {
        self.state.read().await.bookings.get(&id).cloned()
    }

    /// Every mutation call that reached this backend, accepted or not.
    pub fn mutations_received(&self) -> usize {
        self.mutations_received.load(Ordering::SeqCst)
    }

    /// Makes every later call answer as if the credential had expired.
    pub fn revoke_sessions(&self) {
        self.sessions_revoked.store(true, Ordering::SeqCst);
    }

    fn authenticate(&self) -> Result<(), ApplicationError> {
        if self.sessions_revoked.load(Ordering::SeqCst) {
            return Err(ApplicationError::SessionInvalid("401: token expired".to_string()));
        }
        Ok(())
    }

    fn begin_mutation(&self) -> Result<(), ApplicationError> {
        self.mutations_received.fetch_add(1, Ordering::SeqCst);
        self.authenticate()
    }
}

fn check_scope(actor: &Actor, scope: BookingScope) -> Result<(), ApplicationError> {
    let permitted = match (actor, scope) {
        (Actor::Admin, _) => true,
        (Actor::Customer(user), BookingScope::User(requested)) => *user == requested,
        (Actor::Driver(driver), BookingScope::Driver(requested)) => *driver == requested,
        _ => false,
    };
    if permitted {
        Ok(())
    } else {
        Err(ApplicationError::SessionInvalid(format!("403: {actor} may not list {scope:?}")))
    }
}

fn conflict(error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Conflict { status: 409, message: error.to_string() }
}

fn not_found(booking_id: BookingId) -> ApplicationError {
    ApplicationError::Conflict { status: 404, message: format!("booking {booking_id} not found") }
}

#[async_trait]
impl BookingBackend for MemoryBookingBackend {
    async fn list_bookings(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<Booking>, ApplicationError> {
        self.authenticate()?;
        check_scope(session.actor(), scope)?;
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .filter(|booking| match scope {
                BookingScope::User(user) => booking.user_id == user,
                BookingScope::Driver(driver) => booking.is_assigned_to(driver),
                BookingScope::Admin => true,
            })
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        session: &Session,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ApplicationError> {
        self.begin_mutation()?;
        let mut state = self.state.write().await;
        let booking = state.bookings.get_mut(&booking_id).ok_or_else(|| not_found(booking_id))?;
        let plan = BookingLifecycle.authorize(booking, session.actor(), status).map_err(conflict)?;
        booking.status = plan.to;
        Ok(())
    }

    async fn assign_driver(
        &self,
        session: &Session,
        booking_id: BookingId,
        driver_id: DriverId,
    ) -> Result<(), ApplicationError> {
        self.begin_mutation()?;
        let mut state = self.state.write().await;
        let booking = state.bookings.get_mut(&booking_id).ok_or_else(|| not_found(booking_id))?;
        let plan = BookingLifecycle
            .assign_driver(booking, session.actor(), driver_id)
            .map_err(conflict)?;
        booking.status = plan.to;
        booking.driver_id = plan.driver_id;
        Ok(())
    }

    async fn confirm_payment(
        &self,
        session: &Session,
        booking_id: BookingId,
    ) -> Result<(), ApplicationError> {
        self.begin_mutation()?;
        let mut state = self.state.write().await;
        let booking = state.bookings.get_mut(&booking_id).ok_or_else(|| not_found(booking_id))?;
        check_confirm_payment(booking, session.actor()).map_err(conflict)?;
        booking.payment_status = PaymentStatus::Completed;
        Ok(())
    }

    async fn list_driver_reviews(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<DriverReview>, ApplicationError> {
        self.authenticate()?;
        check_scope(session.actor(), scope)?;
        let state = self.state.read().await;
        Ok(state
            .reviews
            .iter()
            .filter(|review| match scope {
                BookingScope::User(user) => review.user_id == Some(user),
                BookingScope::Driver(driver) => review.driver_id == Some(driver),
                BookingScope::Admin => true,
            })
            .cloned()
            .collect())
    }

    async fn submit_driver_review(
        &self,
        session: &Session,
        review: &NewDriverReview,
    ) -> Result<(), ApplicationError> {
        self.begin_mutation()?;
        let Actor::Customer(user) = *session.actor() else {
            return Err(conflict("only customers may review drivers"));
        };

        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .values()
            .find(|booking| booking.booking_number.0 == review.booking_number)
            .cloned()
            .ok_or_else(|| ApplicationError::Conflict {
                status: 404,
                message: format!("booking {} not found", review.booking_number),
            })?;

        let eligibility = review_eligibility(&booking, user, &state.reviews);
        if !eligibility.is_eligible() {
            return Err(conflict(format!("review not accepted: {eligibility:?}")));
        }

        let next_id = state.reviews.iter().map(|existing| existing.id.0).max().unwrap_or(0) + 1;
        state.reviews.push(DriverReview {
            id: ReviewId(next_id),
            booking_number: booking.booking_number.clone(),
            driver_id: booking.driver_id,
            user_id: Some(user),
            rating: review.rating,
            comment: review.comment.clone(),
            status: ReviewStatus::Pending,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ridehub_core::domain::booking::{
        CUSTOMER_NAME_PLACEHOLDER, DRIVER_NAME_PLACEHOLDER, DRIVER_PHONE_PLACEHOLDER,
    };
    use ridehub_core::{
        Actor, ApplicationError, Booking, BookingId, BookingNumber, BookingStatus, DriverId,
        PaymentStatus, UserId, VehicleId,
    };
    use rust_decimal::Decimal;

    use super::MemoryBookingBackend;
    use crate::api::{BookingBackend, BookingScope};
    use crate::session::Session;

    fn pending(id: i64) -> Booking {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        Booking {
            id: BookingId(id),
            booking_number: BookingNumber(format!("BK-{id:04}")),
            user_id: UserId(1),
            vehicle_id: VehicleId(10),
            driver_id: None,
            start_date: day,
            end_date: day,
            total_price: Decimal::new(100, 0),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            vehicle_name: "Van".to_string(),
            driver_name: DRIVER_NAME_PLACEHOLDER.to_string(),
            driver_phone: DRIVER_PHONE_PLACEHOLDER.to_string(),
            customer_name: CUSTOMER_NAME_PLACEHOLDER.to_string(),
        }
    }

    fn session(actor: Actor) -> Session {
        Session::new("jwt".to_string().into(), actor)
    }

    #[tokio::test]
    async fn backend_enforces_transition_table() {
        let backend = MemoryBookingBackend::with_bookings([pending(1)]);
        let admin = session(Actor::Admin);

        let skipped = backend.update_status(&admin, BookingId(1), BookingStatus::Completed).await;
        assert!(matches!(skipped, Err(ApplicationError::Conflict { status: 409, .. })));

        backend.assign_driver(&admin, BookingId(1), DriverId(7)).await.expect("assign");
        let assigned = backend.booking(BookingId(1)).await.expect("booking");
        assert_eq!(assigned.status, BookingStatus::DriverAssigned);
        assert_eq!(assigned.driver_id, Some(DriverId(7)));

        let driver = session(Actor::Driver(DriverId(7)));
        let trips = backend
            .list_bookings(&driver, BookingScope::Driver(DriverId(7)))
            .await
            .expect("driver list");
        assert_eq!(trips.len(), 1);
        assert_eq!(backend.mutations_received(), 2);
    }

    #[tokio::test]
    async fn scope_must_match_actor() {
        let backend = MemoryBookingBackend::with_bookings([pending(1)]);
        let customer = session(Actor::Customer(UserId(2)));
        let denied = backend.list_bookings(&customer, BookingScope::User(UserId(1))).await;
        assert!(matches!(denied, Err(ApplicationError::SessionInvalid(_))));
    }

    #[tokio::test]
    async fn revoked_sessions_fail_every_call() {
        let backend = MemoryBookingBackend::with_bookings([pending(1)]);
        backend.revoke_sessions();
        let result = backend.list_bookings(&session(Actor::Admin), BookingScope::Admin).await;
        assert!(result.map_err(|error| error.is_session_invalid()).err().unwrap_or(false));
    }
}
