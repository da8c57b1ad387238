use serde::Serialize;

use crate::domain::booking::{Booking, UserId};
use crate::domain::review::{DriverReview, Rating};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEligibility {
    Eligible,
    AlreadyReviewed,
    NotCompleted,
    NoDriver,
    NotOwner,
}

impl ReviewEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// True when the review list already holds a review of `booking` by `user`.
pub fn has_review(booking: &Booking, user: UserId, reviews: &[DriverReview]) -> bool {
    reviews.iter().any(|review| {
        review.booking_number == booking.booking_number
            && review.user_id.map_or(true, |author| author == user)
    })
}

/// Whether `user` may review the driver of `booking`.
///
/// A review without an author on the wire is attributed to the booking's
/// owner. Any review still listed for the booking blocks another one,
/// whatever its moderation status.
pub fn review_eligibility(
    booking: &Booking,
    user: UserId,
    reviews: &[DriverReview],
) -> ReviewEligibility {
    if booking.user_id != user {
        return ReviewEligibility::NotOwner;
    }
    if !booking.status.is_completed() {
        return ReviewEligibility::NotCompleted;
    }
    if !booking.has_driver() {
        return ReviewEligibility::NoDriver;
    }
    if has_review(booking, user, reviews) {
        return ReviewEligibility::AlreadyReviewed;
    }
    ReviewEligibility::Eligible
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewedBooking {
    pub booking: Booking,
    pub has_review: bool,
    pub eligibility: ReviewEligibility,
}

/// Derives review state for each booking from the review list fetched in the
/// same refresh. Nothing here is cached across refreshes.
pub fn annotate_reviews(
    bookings: &[Booking],
    user: UserId,
    reviews: &[DriverReview],
) -> Vec<ReviewedBooking> {
    bookings
        .iter()
        .map(|booking| ReviewedBooking {
            booking: booking.clone(),
            has_review: has_review(booking, user, reviews),
            eligibility: review_eligibility(booking, user, reviews),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewDriverReview {
    pub booking_number: String,
    pub rating: Rating,
    pub comment: String,
}

impl NewDriverReview {
    pub fn new(
        booking: &Booking,
        user: UserId,
        rating: i64,
        comment: impl Into<String>,
        reviews: &[DriverReview],
    ) -> Result<Self, DomainError> {
        let eligibility = review_eligibility(booking, user, reviews);
        if !eligibility.is_eligible() {
            return Err(DomainError::ReviewNotEligible(eligibility));
        }
        Ok(Self {
            booking_number: booking.booking_number.0.clone(),
            rating: Rating::new(rating)?,
            comment: comment.into().trim().to_string(),
        })
    }
}
