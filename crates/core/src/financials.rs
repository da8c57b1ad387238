use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::{Booking, DriverId};
use crate::errors::DomainError;

/// Share of a paid booking's price attributed to its driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    /// 15%, the rate used by the trip and earnings views.
    pub const STANDARD: CommissionRate = CommissionRate(Decimal::from_parts(15, 0, 0, false, 2));

    pub fn new(rate: Decimal) -> Result<Self, DomainError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(DomainError::InvalidCommissionRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `None` when the product does not fit a `Decimal`.
    pub fn apply(&self, amount: Decimal) -> Option<Decimal> {
        amount.checked_mul(self.0)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financials {
    pub total_revenue: Decimal,
    pub driver_commission: Decimal,
    pub net_revenue: Decimal,
}

impl Financials {
    /// Adds one paid booking. A booking whose amounts would overflow is
    /// logged and left out.
    fn record(&mut self, booking: &Booking, rate: CommissionRate) -> bool {
        if !booking.is_paid() {
            return false;
        }
        match self.with(booking, rate) {
            Some(next) => {
                *self = next;
                true
            }
            None => {
                tracing::warn!(
                    event_name = "financials.booking_skipped",
                    booking_id = booking.id.0,
                    total_price = %booking.total_price,
                    "booking amount overflows the financial totals"
                );
                false
            }
        }
    }

    fn with(&self, booking: &Booking, rate: CommissionRate) -> Option<Self> {
        let total_revenue = self.total_revenue.checked_add(booking.total_price)?;
        let driver_commission = if booking.has_driver() {
            self.driver_commission.checked_add(rate.apply(booking.total_price)?)?
        } else {
            self.driver_commission
        };
        let net_revenue = total_revenue.checked_sub(driver_commission)?;
        Some(Self { total_revenue, driver_commission, net_revenue })
    }
}

/// Revenue, commission and net over the paid bookings in `bookings`.
///
/// Unpaid bookings contribute nothing; paid bookings without a driver add to
/// revenue but not to commission. Empty input is all zeros.
pub fn compute_financials<'a, I>(bookings: I, rate: CommissionRate) -> Financials
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut financials = Financials::default();
    for booking in bookings {
        financials.record(booking, rate);
    }
    financials
}

/// One driver's commission share over their paid bookings.
pub fn driver_earnings<'a, I>(bookings: I, driver: DriverId, rate: CommissionRate) -> Decimal
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|booking| booking.is_paid() && booking.is_assigned_to(driver))
        .fold(Decimal::ZERO, |earned, booking| {
            match rate.apply(booking.total_price).and_then(|share| earned.checked_add(share)) {
                Some(total) => total,
                None => {
                    tracing::warn!(
                        event_name = "financials.booking_skipped",
                        booking_id = booking.id.0,
                        total_price = %booking.total_price,
                        "booking amount overflows the driver earnings"
                    );
                    earned
                }
            }
        })
}

/// Which booking date places a booking into a month bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketField {
    /// Revenue by trip date.
    StartDate,
    /// Driver earnings by completion date.
    EndDate,
}

impl BucketField {
    fn date_of(&self, booking: &Booking) -> NaiveDate {
        match self {
            Self::StartDate => booking.start_date,
            Self::EndDate => booking.end_date,
        }
    }
}

impl FromStr for BucketField {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "start_date" | "start" => Ok(Self::StartDate),
            "end_date" | "end" => Ok(Self::EndDate),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported bucket field `{other}` (expected start_date|end_date)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyFinancials {
    pub month: YearMonth,
    pub bookings: usize,
    pub financials: Financials,
}

/// Paid bookings grouped by calendar month of `field`, oldest first. Months
/// with no paid booking are omitted.
pub fn monthly_breakdown<'a, I>(
    bookings: I,
    rate: CommissionRate,
    field: BucketField,
) -> Vec<MonthlyFinancials>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut buckets: BTreeMap<YearMonth, (usize, Financials)> = BTreeMap::new();
    for booking in bookings.into_iter().filter(|booking| booking.is_paid()) {
        let (count, financials) =
            buckets.entry(YearMonth::of(field.date_of(booking))).or_default();
        if financials.record(booking, rate) {
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(month, (bookings, financials))| MonthlyFinancials { month, bookings, financials })
        .collect()
}
