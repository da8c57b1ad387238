//! Normalization boundary between backend JSON and the canonical domain
//! shapes.
//!
//! Backend surfaces disagree on key names and on whether ids and prices are
//! numbers or strings. Everything is resolved here so the rest of the crate
//! only ever sees [`Booking`] and [`DriverReview`] with display fields filled.
//! A record that lacks something the domain cannot invent (identity, owner,
//! dates, price, status) is dropped with a warning instead of failing the
//! whole list.

use std::str::FromStr;

use chrono::NaiveDate;
use ridehub_core::domain::booking::{
    CUSTOMER_NAME_PLACEHOLDER, DRIVER_NAME_PLACEHOLDER, DRIVER_PHONE_PLACEHOLDER,
    VEHICLE_NAME_PLACEHOLDER,
};
use ridehub_core::{
    ApplicationError, Booking, BookingId, BookingNumber, BookingStatus, DriverId, DriverReview,
    NewDriverReview, PaymentStatus, Rating, ReviewId, ReviewStatus, UserId, VehicleId,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;

const LIST_WRAPPER_KEYS: [&str; 4] = ["content", "data", "items", "results"];
const DRIVER_NAME_KEYS: [&str; 3] = ["driverName", "driver.name", "driver.fullName"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has unusable value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

pub fn bookings_from_value(value: Value) -> Result<Vec<Booking>, ApplicationError> {
    let records = list_records(value, "bookings")?;
    Ok(collect_valid(records, "booking", booking_from_record))
}

pub fn reviews_from_value(value: Value) -> Result<Vec<DriverReview>, ApplicationError> {
    let records = list_records(value, "reviews")?;
    Ok(collect_valid(records, "driver_review", review_from_record))
}

pub fn review_request_body(review: &NewDriverReview) -> Value {
    json!({
        "bookingNumber": review.booking_number,
        "rating": review.rating.value(),
        "comment": review.comment,
    })
}

pub fn booking_from_record(record: &Value) -> Result<Booking, WireError> {
    let id = required_i64(record, "id", &["id", "bookingId"])?;
    let status_raw = first(record, &["status", "bookingStatus"])
        .and_then(text)
        .ok_or(WireError::MissingField("status"))?;
    let status = BookingStatus::from_str(&status_raw)
        .map_err(|_| WireError::InvalidField { field: "status", value: status_raw.clone() })?;
    let payment_status = match first(record, &["paymentStatus", "payment.status"]).and_then(text)
    {
        Some(raw) => PaymentStatus::from_str(&raw)
            .map_err(|_| WireError::InvalidField { field: "paymentStatus", value: raw })?,
        None => PaymentStatus::Pending,
    };

    let booking_number = first(record, &["bookingNumber", "bookingNo", "reference"])
        .and_then(text)
        .unwrap_or_else(|| format!("BK-{id}"));

    Ok(Booking {
        id: BookingId(id),
        booking_number: BookingNumber(booking_number),
        user_id: UserId(required_i64(record, "userId", &["userId", "user.id", "customerId"])?),
        vehicle_id: VehicleId(required_i64(record, "vehicleId", &["vehicleId", "vehicle.id"])?),
        driver_id: first(record, &["driverId", "driver.id"]).and_then(integer).map(DriverId),
        start_date: required_date(record, "startDate", &["startDate", "pickupDate"])?,
        end_date: required_date(record, "endDate", &["endDate", "returnDate"])?,
        total_price: required_decimal(record, "totalPrice", &["totalPrice", "price", "amount"])?,
        status,
        payment_status,
        vehicle_name: first(record, &["vehicleName", "vehicle.name", "vehicle.model"])
            .and_then(text)
            .unwrap_or_else(|| VEHICLE_NAME_PLACEHOLDER.to_string()),
        driver_name: person_name(record, &DRIVER_NAME_KEYS, "driver")
            .unwrap_or_else(|| DRIVER_NAME_PLACEHOLDER.to_string()),
        driver_phone: first(record, &["driverPhone", "driver.phone", "driver.phoneNumber"])
            .and_then(text)
            .unwrap_or_else(|| DRIVER_PHONE_PLACEHOLDER.to_string()),
        customer_name: person_name(record, &["customerName", "userName", "user.name"], "user")
            .unwrap_or_else(|| CUSTOMER_NAME_PLACEHOLDER.to_string()),
    })
}

pub fn review_from_record(record: &Value) -> Result<DriverReview, WireError> {
    let id = required_i64(record, "id", &["id", "reviewId"])?;
    let booking_number = first(record, &["bookingNumber", "booking.bookingNumber"])
        .and_then(text)
        .ok_or(WireError::MissingField("bookingNumber"))?;
    let stars = required_i64(record, "rating", &["rating", "stars"])?;
    let rating = Rating::new(stars)
        .map_err(|_| WireError::InvalidField { field: "rating", value: stars.to_string() })?;
    let status = match first(record, &["status", "reviewStatus"]).and_then(text) {
        Some(raw) => ReviewStatus::from_str(&raw)
            .map_err(|_| WireError::InvalidField { field: "status", value: raw })?,
        None => ReviewStatus::Pending,
    };

    Ok(DriverReview {
        id: ReviewId(id),
        booking_number: BookingNumber(booking_number),
        driver_id: first(record, &["driverId", "driver.id"]).and_then(integer).map(DriverId),
        user_id: first(record, &["userId", "user.id"]).and_then(integer).map(UserId),
        rating,
        comment: first(record, &["comment", "reviewText"]).and_then(text).unwrap_or_default(),
        status,
    })
}

fn list_records(value: Value, what: &str) -> Result<Vec<Value>, ApplicationError> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => LIST_WRAPPER_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| ApplicationError::Decode(format!("expected a JSON array of {what}"))),
        Value::Null => Ok(Vec::new()),
        _ => Err(ApplicationError::Decode(format!("expected a JSON array of {what}"))),
    }
}

fn collect_valid<T>(
    records: Vec<Value>,
    kind: &'static str,
    convert: fn(&Value) -> Result<T, WireError>,
) -> Vec<T> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match convert(record) {
            Ok(item) => Some(item),
            Err(error) => {
                tracing::warn!(
                    event_name = "wire.record_skipped",
                    kind,
                    index,
                    record_id = ?record.get("id"),
                    error = %error,
                    "skipping malformed backend record"
                );
                None
            }
        })
        .collect()
}

/// Looks up a dotted path, treating JSON null as absent.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, key| current.get(key))
        .filter(|value| !value.is_null())
}

fn first<'a>(record: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(record, path))
}

fn text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(raw) => raw.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    let raw = text(value)?;
    Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).ok()
}

fn date(value: &Value) -> Option<NaiveDate> {
    let raw = text(value)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn person_name(record: &Value, paths: &[&str], nested: &str) -> Option<String> {
    if let Some(name) = first(record, paths).and_then(text) {
        return Some(name);
    }
    let first_name = lookup(record, &format!("{nested}.firstName")).and_then(text);
    let last_name = lookup(record, &format!("{nested}.lastName")).and_then(text);
    match (first_name, last_name) {
        (Some(first_name), Some(last_name)) => Some(format!("{first_name} {last_name}")),
        (Some(name), None) | (None, Some(name)) => Some(name),
        (None, None) => None,
    }
}

fn required_i64(record: &Value, field: &'static str, paths: &[&str]) -> Result<i64, WireError> {
    let value = first(record, paths).ok_or(WireError::MissingField(field))?;
    integer(value).ok_or_else(|| WireError::InvalidField { field, value: value.to_string() })
}

fn required_date(
    record: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<NaiveDate, WireError> {
    let value = first(record, paths).ok_or(WireError::MissingField(field))?;
    date(value).ok_or_else(|| WireError::InvalidField { field, value: value.to_string() })
}

fn required_decimal(
    record: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<Decimal, WireError> {
    let value = first(record, paths).ok_or(WireError::MissingField(field))?;
    decimal(value).ok_or_else(|| WireError::InvalidField { field, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ridehub_core::{BookingStatus, DriverId, PaymentStatus, ReviewStatus, UserId};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{bookings_from_value, booking_from_record, reviews_from_value, WireError};

    #[test]
    fn flat_record_maps_to_canonical_booking() {
        let booking = booking_from_record(&json!({
            "id": 12,
            "bookingNumber": "BK-0012",
            "userId": 3,
            "vehicleId": "44",
            "driverId": 7,
            "startDate": "2026-03-01",
            "endDate": "2026-03-04T18:00:00",
            "totalPrice": 249.5,
            "status": "IN_PROGRESS",
            "paymentStatus": "PENDING",
            "vehicleName": "Toyota Hiace",
            "driverName": "Sam Okafor",
            "driverPhone": "+254700000000",
            "customerName": "Ada Lovelace"
        }))
        .expect("valid record");

        assert_eq!(booking.status, BookingStatus::Ongoing);
        assert_eq!(booking.driver_id, Some(DriverId(7)));
        assert_eq!(booking.vehicle_id.0, 44);
        assert_eq!(booking.total_price, Decimal::new(2495, 1));
        assert_eq!(booking.end_date, NaiveDate::from_ymd_opt(2026, 3, 4).expect("date"));
        assert_eq!(booking.driver_name, "Sam Okafor");
    }

    #[test]
    fn nested_driver_keys_and_missing_fields_fall_back_to_placeholders() {
        let with_nested = booking_from_record(&json!({
            "id": 1, "userId": 3, "vehicleId": 4,
            "startDate": "2026-03-01", "endDate": "2026-03-02",
            "totalPrice": "100.00", "status": "DRIVER_ASSIGNED",
            "driver": { "id": "9", "firstName": "Lee", "lastName": "Chen", "phoneNumber": "555" }
        }))
        .expect("valid record");
        assert_eq!(with_nested.driver_id, Some(DriverId(9)));
        assert_eq!(with_nested.driver_name, "Lee Chen");
        assert_eq!(with_nested.driver_phone, "555");
        assert_eq!(with_nested.booking_number.0, "BK-1");
        assert_eq!(with_nested.payment_status, PaymentStatus::Pending);

        let bare = booking_from_record(&json!({
            "id": 2, "userId": 3, "vehicleId": 4, "driverId": null,
            "startDate": "2026-03-01", "endDate": "2026-03-02",
            "totalPrice": 80, "status": "PENDING"
        }))
        .expect("valid record");
        assert_eq!(bare.driver_id, None);
        assert_eq!(bare.driver_name, "Not assigned");
        assert_eq!(bare.driver_phone, "N/A");
        assert_eq!(bare.vehicle_name, "Unknown vehicle");
        assert_eq!(bare.customer_name, "Unknown customer");
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let bookings = bookings_from_value(json!([
            { "id": 1, "userId": 3, "vehicleId": 4, "startDate": "2026-03-01",
              "endDate": "2026-03-02", "totalPrice": 80, "status": "PENDING" },
            { "id": 2, "userId": 3, "vehicleId": 4, "startDate": "2026-03-01",
              "endDate": "2026-03-02", "totalPrice": 80, "status": "TELEPORTING" },
            { "userId": 3, "status": "PENDING" }
        ]))
        .expect("list decodes");
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id.0, 1);
    }

    #[test]
    fn record_errors_name_the_field() {
        assert_eq!(
            booking_from_record(&json!({ "id": 1, "status": "PENDING" })),
            Err(WireError::MissingField("userId"))
        );
    }

    #[test]
    fn paged_wrapper_and_non_list_bodies() {
        let reviews = reviews_from_value(json!({
            "content": [
                { "id": 1, "bookingNumber": "BK-0001", "userId": 3, "rating": 5,
                  "status": "APPROVED", "comment": "great" },
                { "id": 2, "bookingNumber": "BK-0002", "rating": 9 }
            ]
        }))
        .expect("wrapper decodes");
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].user_id, Some(UserId(3)));
        assert_eq!(reviews[0].status, ReviewStatus::Approved);

        assert!(bookings_from_value(json!("nope")).is_err());
        assert!(bookings_from_value(json!(null)).map(|list| list.is_empty()).unwrap_or(false));
    }
}
