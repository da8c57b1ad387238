use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::{BookingNumber, DriverId, UserId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub i64);

/// Star rating, 1 to 5 inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::RatingOutOfRange(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Rating::new(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl FromStr for ReviewStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(DomainError::UnknownReviewStatus(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverReview {
    pub id: ReviewId,
    pub booking_number: BookingNumber,
    pub driver_id: Option<DriverId>,
    pub user_id: Option<UserId>,
    pub rating: Rating,
    pub comment: String,
    pub status: ReviewStatus,
}

impl DriverReview {
    pub fn is_public(&self) -> bool {
        self.status == ReviewStatus::Approved
    }
}

/// Aggregate over approved reviews only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RatingSummary {
    pub approved_count: usize,
    /// `None` when nothing is approved yet.
    pub average: Option<Decimal>,
    /// Index 0 holds one-star counts, index 4 five-star counts.
    pub distribution: [usize; 5],
}

impl RatingSummary {
    pub fn from_reviews<'a, I>(reviews: I) -> Self
    where
        I: IntoIterator<Item = &'a DriverReview>,
    {
        let mut distribution = [0usize; 5];
        let mut total: u64 = 0;
        let mut approved_count = 0usize;

        for review in reviews.into_iter().filter(|review| review.is_public()) {
            let stars = review.rating.value();
            if let Some(slot) = distribution.get_mut(usize::from(stars.saturating_sub(1))) {
                *slot += 1;
            }
            total += u64::from(stars);
            approved_count += 1;
        }

        let average = (approved_count > 0).then(|| {
            (Decimal::from(total) / Decimal::from(approved_count as u64)).round_dp(2)
        });

        Self { approved_count, average, distribution }
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::fixtures::review;
    use super::{DriverReview, Rating, RatingSummary, ReviewStatus};

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
    }

    #[test]
    fn rating_deserialization_validates_range() {
        assert!(serde_json::from_str::<Rating>("4").is_ok());
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = RatingSummary::from_reviews(&Vec::<DriverReview>::new());
        assert_eq!(summary.approved_count, 0);
        assert_eq!(summary.average, None);
        assert_eq!(summary.distribution, [0; 5]);
    }

    #[test]
    fn summary_counts_only_approved_reviews() {
        let reviews = vec![
            review(1, "BK-1", 1, 5, ReviewStatus::Approved),
            review(2, "BK-2", 1, 4, ReviewStatus::Approved),
            review(3, "BK-3", 2, 1, ReviewStatus::Rejected),
            review(4, "BK-4", 3, 1, ReviewStatus::Pending),
        ];

        let summary = RatingSummary::from_reviews(&reviews);

        assert_eq!(summary.approved_count, 2);
        assert_eq!(summary.average, Some(Decimal::new(450, 2)));
        assert_eq!(summary.distribution, [0, 0, 0, 1, 1]);
    }
}
