use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::booking::{Booking, BookingId, UserId};
use crate::domain::review::{DriverReview, RatingSummary};
use crate::financials::{compute_financials, CommissionRate, Financials};
use crate::lifecycle::{Actor, BookingAction, BookingLifecycle};
use crate::payment::PaymentAffordance;
use crate::reviews::has_review;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookingCard {
    pub booking: Booking,
    pub actions: Vec<BookingAction>,
    pub payment: PaymentAffordance,
    pub has_review: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// One refresh worth of derived state. Built from scratch every time the
/// booking and review lists are re-fetched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub actor: Actor,
    pub active: Vec<BookingCard>,
    pub completed: Vec<BookingCard>,
    pub cancelled: Vec<BookingCard>,
    pub counts: DashboardCounts,
    pub financials: Financials,
    pub commission_rate: CommissionRate,
    pub ratings: RatingSummary,
    pub built_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn build(
        actor: Actor,
        bookings: &[Booking],
        reviews: &[DriverReview],
        rate: CommissionRate,
    ) -> Self {
        let lifecycle = BookingLifecycle;
        let mut active = Vec::new();
        let mut completed = Vec::new();
        let mut cancelled = Vec::new();

        for booking in bookings {
            let has_review = has_review_for(&actor, booking, reviews);
            let card = BookingCard {
                booking: booking.clone(),
                actions: lifecycle.available_actions(booking, &actor, reviews),
                payment: PaymentAffordance::for_booking(booking),
                has_review,
            };
            if booking.status.is_active() {
                active.push(card);
            } else if booking.status.is_completed() {
                completed.push(card);
            } else {
                cancelled.push(card);
            }
        }

        let counts = DashboardCounts {
            total: bookings.len(),
            active: active.len(),
            completed: completed.len(),
            cancelled: cancelled.len(),
        };

        Self {
            actor,
            active,
            completed,
            cancelled,
            counts,
            financials: compute_financials(bookings, rate),
            commission_rate: rate,
            ratings: RatingSummary::from_reviews(reviews),
            built_at: Utc::now(),
        }
    }

    pub fn cards(&self) -> impl Iterator<Item = &BookingCard> {
        self.active.iter().chain(self.completed.iter()).chain(self.cancelled.iter())
    }

    pub fn find(&self, booking_id: BookingId) -> Option<&Booking> {
        self.cards().map(|card| &card.booking).find(|booking| booking.id == booking_id)
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.cards().map(|card| card.booking.clone()).collect()
    }
}

fn has_review_for(actor: &Actor, booking: &Booking, reviews: &[DriverReview]) -> bool {
    let user: UserId = match actor {
        Actor::Customer(user) => *user,
        _ => booking.user_id,
    };
    has_review(booking, user, reviews)
}
