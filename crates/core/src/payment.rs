use serde::Serialize;
use thiserror::Error;

use crate::domain::booking::{Booking, BookingId, BookingStatus};
use crate::lifecycle::Actor;

/// What the customer surface shows next to a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAffordance {
    PayNow,
    Paid,
    Hidden,
}

impl PaymentAffordance {
    pub fn for_booking(booking: &Booking) -> Self {
        if booking.is_paid() {
            Self::Paid
        } else if booking.status.is_completed() {
            Self::PayNow
        } else {
            Self::Hidden
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::PayNow => Some("Pay Now"),
            Self::Paid => Some("Paid ✓"),
            Self::Hidden => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("booking {booking_id} is already paid")]
    AlreadyPaid { booking_id: BookingId },
    #[error("booking {booking_id} is {status}; payment opens once the trip is completed")]
    TripNotCompleted { booking_id: BookingId, status: BookingStatus },
    #[error("only the booking owner may confirm payment for booking {booking_id}")]
    NotPayer { booking_id: BookingId },
}

/// Guard for `confirm-payment`. An already-paid booking is rejected rather
/// than re-submitted.
pub fn check_confirm_payment(booking: &Booking, actor: &Actor) -> Result<(), PaymentError> {
    if booking.is_paid() {
        return Err(PaymentError::AlreadyPaid { booking_id: booking.id });
    }
    if !booking.status.is_completed() {
        return Err(PaymentError::TripNotCompleted {
            booking_id: booking.id,
            status: booking.status,
        });
    }
    match actor {
        Actor::Admin => Ok(()),
        Actor::Customer(_) if actor.owns(booking) => Ok(()),
        _ => Err(PaymentError::NotPayer { booking_id: booking.id }),
    }
}
