use async_trait::async_trait;
use ridehub_core::{
    Actor, ApplicationError, Booking, BookingId, BookingStatus, DriverId, DriverReview,
    NewDriverReview, UserId,
};
use serde::Serialize;

use crate::session::Session;

/// Which slice of bookings and reviews a list call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum BookingScope {
    User(UserId),
    Driver(DriverId),
    Admin,
}

impl BookingScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor {
            Actor::Customer(user) => Self::User(*user),
            Actor::Driver(driver) => Self::Driver(*driver),
            Actor::Admin => Self::Admin,
        }
    }

    pub fn bookings_path(&self) -> String {
        match self {
            Self::User(user) => format!("/api/bookings/user/{user}"),
            Self::Driver(driver) => format!("/api/bookings/driver/{driver}"),
            Self::Admin => "/api/admin/bookings".to_string(),
        }
    }

    pub fn reviews_path(&self) -> String {
        match self {
            Self::User(user) => format!("/api/driver-reviews/user/{user}"),
            Self::Driver(driver) => format!("/api/driver-reviews/driver/{driver}"),
            Self::Admin => "/api/admin/driver-reviews".to_string(),
        }
    }
}

/// The REST collaborator. Mutations return nothing: callers re-fetch the
/// list to learn the new state.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn list_bookings(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<Booking>, ApplicationError>;

    async fn update_status(
        &self,
        session: &Session,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ApplicationError>;

    async fn assign_driver(
        &self,
        session: &Session,
        booking_id: BookingId,
        driver_id: DriverId,
    ) -> Result<(), ApplicationError>;

    async fn confirm_payment(
        &self,
        session: &Session,
        booking_id: BookingId,
    ) -> Result<(), ApplicationError>;

    async fn list_driver_reviews(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<DriverReview>, ApplicationError>;

    async fn submit_driver_review(
        &self,
        session: &Session,
        review: &NewDriverReview,
    ) -> Result<(), ApplicationError>;
}
