use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

pub const DRIVER_NAME_PLACEHOLDER: &str = "Not assigned";
pub const DRIVER_PHONE_PLACEHOLDER: &str = "N/A";
pub const VEHICLE_NAME_PLACEHOLDER: &str = "Unknown vehicle";
pub const CUSTOMER_NAME_PLACEHOLDER: &str = "Unknown customer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingNumber(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub i64);

macro_rules! display_inner {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })+
    };
}

display_inner!(BookingId, BookingNumber, UserId, VehicleId, DriverId);

/// Trip status as reported by the backend.
///
/// `IN_PROGRESS` and `ONGOING` both arrive from different surfaces for the
/// same in-transit state; both parse to [`BookingStatus::Ongoing`] and only
/// `ONGOING` is ever sent back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    DriverAssigned,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        Self::Pending,
        Self::DriverAssigned,
        Self::Confirmed,
        Self::Ongoing,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DriverAssigned => "DRIVER_ASSIGNED",
            Self::Confirmed => "CONFIRMED",
            Self::Ongoing => "ONGOING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Non-terminal, non-cancelled. The only "active" definition in the crate.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::DriverAssigned | Self::Confirmed | Self::Ongoing)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States in which a driver reference must be present.
    pub fn requires_driver(&self) -> bool {
        matches!(self, Self::DriverAssigned | Self::Confirmed | Self::Ongoing)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "PENDING" => Ok(Self::Pending),
            "DRIVER_ASSIGNED" => Ok(Self::DriverAssigned),
            "CONFIRMED" => Ok(Self::Confirmed),
            "ONGOING" | "IN_PROGRESS" => Ok(Self::Ongoing),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(DomainError::UnknownStatus(value.to_string())),
        }
    }
}

impl Serialize for BookingStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for BookingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "" => Ok(Self::Pending),
            "COMPLETED" | "PAID" => Ok(Self::Completed),
            _ => Err(DomainError::UnknownPaymentStatus(value.to_string())),
        }
    }
}

/// Canonical booking shape. Display fields are always populated; the wire
/// boundary substitutes placeholders for anything the backend left out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub booking_number: BookingNumber,
    pub user_id: UserId,
    pub vehicle_id: VehicleId,
    pub driver_id: Option<DriverId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub vehicle_name: String,
    pub driver_name: String,
    pub driver_phone: String,
    pub customer_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum InvariantViolation {
    DriverMissing { status: BookingStatus },
    PaidBeforeCompletion { status: BookingStatus },
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl Booking {
    pub fn is_paid(&self) -> bool {
        self.payment_status.is_completed()
    }

    pub fn has_driver(&self) -> bool {
        self.driver_id.is_some()
    }

    pub fn is_assigned_to(&self, driver: DriverId) -> bool {
        self.driver_id == Some(driver)
    }

    /// Backend-owned invariants, checked so callers can log drift instead of
    /// trusting a malformed record silently.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        if self.status.requires_driver() && self.driver_id.is_none() {
            violations.push(InvariantViolation::DriverMissing { status: self.status });
        }
        if self.is_paid() && !self.status.is_completed() {
            violations.push(InvariantViolation::PaidBeforeCompletion { status: self.status });
        }
        if self.end_date < self.start_date {
            violations.push(InvariantViolation::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        violations
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    pub fn booking(id: i64, status: BookingStatus, driver: Option<i64>) -> Booking {
        Booking {
            id: BookingId(id),
            booking_number: BookingNumber(format!("BK-{id:04}")),
            user_id: UserId(1),
            vehicle_id: VehicleId(10),
            driver_id: driver.map(DriverId),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap_or_default(),
            total_price: Decimal::new(100, 0),
            status,
            payment_status: PaymentStatus::Pending,
            vehicle_name: "Toyota Corolla".to_string(),
            driver_name: DRIVER_NAME_PLACEHOLDER.to_string(),
            driver_phone: DRIVER_PHONE_PLACEHOLDER.to_string(),
            customer_name: "Ada".to_string(),
        }
    }

    pub fn paid(mut booking: Booking, price: i64) -> Booking {
        booking.payment_status = PaymentStatus::Completed;
        booking.total_price = Decimal::new(price, 0);
        booking
    }
}
