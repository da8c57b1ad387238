use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use ridehub_client::{
    BookingBackend, BookingScope, BookingService, HttpBookingBackend, ReadRetryPolicy,
    SessionContext,
};
use ridehub_core::config::ApiConfig;
use ridehub_core::{
    Actor, ApplicationError, BookingId, BookingStatus, CommissionRate, DomainError, DriverId,
    PaymentError, UserId,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[derive(Default)]
struct FakeState {
    bookings: Vec<Value>,
    admin_failures_remaining: usize,
    admin_list_calls: usize,
    status_calls: usize,
    confirm_calls: usize,
    fail_status_updates: bool,
}

type Shared = Arc<Mutex<FakeState>>;
type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn authorized(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    match headers.get("authorization").and_then(|value| value.to_str().ok()) {
        Some("Bearer valid-token") => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, Json(json!({ "message": "token expired" })))),
    }
}

fn rejected(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

async fn user_bookings(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Reply {
    authorized(&headers)?;
    let state = state.lock().expect("state lock");
    let owned: Vec<Value> = state
        .bookings
        .iter()
        .filter(|booking| booking["userId"].as_i64() == Some(user_id))
        .cloned()
        .collect();
    Ok(Json(Value::Array(owned)))
}

async fn admin_bookings(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    let mut state = state.lock().expect("state lock");
    state.admin_list_calls += 1;
    if state.admin_failures_remaining > 0 {
        state.admin_failures_remaining -= 1;
        return Err(rejected(StatusCode::SERVICE_UNAVAILABLE, "warming up"));
    }
    Ok(Json(json!({ "content": state.bookings })))
}

async fn no_reviews(headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    Ok(Json(json!([])))
}

async fn update_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    authorized(&headers)?;
    let mut state = state.lock().expect("state lock");
    state.status_calls += 1;
    if state.fail_status_updates {
        return Err(rejected(StatusCode::BAD_GATEWAY, "upstream down"));
    }
    let status = params.get("status").cloned().unwrap_or_default();
    let booking = state
        .bookings
        .iter_mut()
        .find(|booking| booking["id"].as_i64() == Some(id))
        .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "booking not found"))?;
    booking["status"] = json!(status);
    Ok(Json(booking.clone()))
}

async fn assign_driver(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    authorized(&headers)?;
    let driver_id: i64 = params
        .get("driverId")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| rejected(StatusCode::BAD_REQUEST, "driverId is required"))?;
    let mut state = state.lock().expect("state lock");
    let booking = state
        .bookings
        .iter_mut()
        .find(|booking| booking["id"].as_i64() == Some(id))
        .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "booking not found"))?;
    if booking["status"] != json!("PENDING") {
        return Err(rejected(StatusCode::CONFLICT, "driver already assigned"));
    }
    booking["status"] = json!("DRIVER_ASSIGNED");
    booking["driver"] = json!({ "id": driver_id, "fullName": "Sam Okafor", "phone": "555-0199" });
    Ok(Json(booking.clone()))
}

async fn confirm_payment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    authorized(&headers)?;
    let mut state = state.lock().expect("state lock");
    state.confirm_calls += 1;
    let booking = state
        .bookings
        .iter_mut()
        .find(|booking| booking["id"].as_i64() == Some(id))
        .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "booking not found"))?;
    if booking["paymentStatus"] == json!("COMPLETED") {
        return Err(rejected(StatusCode::BAD_REQUEST, "Payment already completed"));
    }
    booking["paymentStatus"] = json!("COMPLETED");
    Ok(Json(booking.clone()))
}

async fn submit_review(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    authorized(&headers)?;
    Ok(Json(body))
}

async fn spawn_backend(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/api/bookings/user/{user_id}", get(user_bookings))
        .route("/api/admin/bookings", get(admin_bookings))
        .route("/api/driver-reviews/user/{user_id}", get(no_reviews))
        .route("/api/admin/driver-reviews", get(no_reviews))
        .route("/api/bookings/{id}/status", put(update_status))
        .route("/api/bookings/{id}/confirm-payment", put(confirm_payment))
        .route("/api/admin/bookings/{id}/assign-driver", put(assign_driver))
        .route("/api/driver-reviews", post(submit_review))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn backend_for(addr: SocketAddr) -> HttpBookingBackend {
    let config = ApiConfig {
        base_url: format!("http://{addr}/"),
        timeout_secs: 5,
        read_max_attempts: 3,
        read_retry_base_delay_ms: 1,
    };
    HttpBookingBackend::new(&config).expect("client builds")
}

fn booking_json(id: i64, status: &str, payment: &str, driver: Option<i64>) -> Value {
    json!({
        "id": id,
        "bookingNumber": format!("BK-{id:04}"),
        "userId": 1,
        "vehicleId": 10,
        "driverId": driver,
        "startDate": "2026-03-01",
        "endDate": "2026-03-03",
        "totalPrice": "100.00",
        "status": status,
        "paymentStatus": payment,
        "vehicle": { "name": "Toyota Hiace" }
    })
}

fn shared(bookings: Vec<Value>) -> Shared {
    Arc::new(Mutex::new(FakeState { bookings, ..FakeState::default() }))
}

fn sessions(token: &str, actor: Actor) -> SessionContext {
    let sessions = SessionContext::default();
    sessions.login(token.to_string().into(), actor);
    sessions
}

#[tokio::test]
async fn list_normalizes_backend_records_with_placeholders() {
    let state = shared(vec![
        booking_json(1, "PENDING", "PENDING", None),
        booking_json(2, "IN_PROGRESS", "PENDING", Some(7)),
        json!({ "id": 3, "userId": 1, "status": "PENDING" }),
    ]);
    let addr = spawn_backend(state).await;
    let backend = backend_for(addr);
    let session = sessions("valid-token", Actor::Customer(UserId(1))).current().expect("session");

    let bookings = backend
        .list_bookings(&session, BookingScope::User(UserId(1)))
        .await
        .expect("list succeeds");

    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[0].driver_name, "Not assigned");
    assert_eq!(bookings[0].driver_phone, "N/A");
    assert_eq!(bookings[0].vehicle_name, "Toyota Hiace");
    assert_eq!(bookings[1].status, BookingStatus::Ongoing);
}

#[tokio::test]
async fn unauthorized_response_invalidates_session_without_retry() {
    let state = shared(vec![booking_json(1, "PENDING", "PENDING", None)]);
    let addr = spawn_backend(state.clone()).await;
    let service = BookingService::new(
        Arc::new(backend_for(addr)),
        sessions("stale-token", Actor::Admin),
        CommissionRate::STANDARD,
    );

    let error = service.refresh().await.expect_err("401");
    assert!(error.is_session_invalid());
    assert!(!service.sessions().is_active());
    assert_eq!(state.lock().expect("state lock").admin_list_calls, 0);
}

#[tokio::test]
async fn reads_retry_through_transient_failures() {
    let state = shared(vec![booking_json(1, "PENDING", "PENDING", None)]);
    state.lock().expect("state lock").admin_failures_remaining = 2;
    let addr = spawn_backend(state.clone()).await;
    let session = sessions("valid-token", Actor::Admin).current().expect("session");

    let bookings = backend_for(addr)
        .list_bookings(&session, BookingScope::Admin)
        .await
        .expect("third attempt succeeds");
    assert_eq!(bookings.len(), 1);
    assert_eq!(state.lock().expect("state lock").admin_list_calls, 3);
}

#[tokio::test]
async fn reads_give_up_after_the_attempt_budget() {
    let state = shared(vec![]);
    state.lock().expect("state lock").admin_failures_remaining = 10;
    let addr = spawn_backend(state.clone()).await;
    let session = sessions("valid-token", Actor::Admin).current().expect("session");

    let backend = backend_for(addr).with_read_retry(ReadRetryPolicy::no_retry());
    let error = backend.list_bookings(&session, BookingScope::Admin).await.expect_err("503");
    assert!(matches!(error, ApplicationError::Transport(_)));
    assert_eq!(state.lock().expect("state lock").admin_list_calls, 1);
}

#[tokio::test]
async fn mutations_are_sent_once_even_on_transport_failure() {
    let state = shared(vec![booking_json(1, "CONFIRMED", "PENDING", Some(7))]);
    state.lock().expect("state lock").fail_status_updates = true;
    let addr = spawn_backend(state.clone()).await;
    let session = sessions("valid-token", Actor::Driver(DriverId(7))).current().expect("session");

    let error = backend_for(addr)
        .update_status(&session, BookingId(1), BookingStatus::Ongoing)
        .await
        .expect_err("502");
    assert!(error.is_retryable());
    assert_eq!(state.lock().expect("state lock").status_calls, 1);
}

#[tokio::test]
async fn admin_assigns_driver_and_sees_refetched_state() {
    let state = shared(vec![booking_json(1, "PENDING", "PENDING", None)]);
    let addr = spawn_backend(state).await;
    let service = BookingService::new(
        Arc::new(backend_for(addr)),
        sessions("valid-token", Actor::Admin),
        CommissionRate::STANDARD,
    );

    let snapshot = service.assign_driver(BookingId(1), DriverId(7)).await.expect("assigned");
    let booking = snapshot.find(BookingId(1)).expect("listed");
    assert_eq!(booking.status, BookingStatus::DriverAssigned);
    assert_eq!(booking.driver_id, Some(DriverId(7)));
    assert_eq!(booking.driver_name, "Sam Okafor");

    let error = service.start_trip(BookingId(1)).await.expect_err("admin cannot start trips");
    assert!(matches!(error, ApplicationError::Domain(DomainError::Lifecycle(_))));
}

#[tokio::test]
async fn confirm_payment_twice_never_reaches_backend_twice() {
    let state = shared(vec![
        booking_json(1, "COMPLETED", "PENDING", Some(5)),
        booking_json(2, "COMPLETED", "COMPLETED", None),
    ]);
    let addr = spawn_backend(state.clone()).await;
    let service = BookingService::new(
        Arc::new(backend_for(addr)),
        sessions("valid-token", Actor::Customer(UserId(1))),
        CommissionRate::STANDARD,
    );

    let paid = service.confirm_payment(BookingId(1)).await.expect("first payment");
    assert_eq!(paid.financials.total_revenue, Decimal::new(200, 0));
    assert_eq!(paid.financials.driver_commission, Decimal::new(15, 0));
    assert_eq!(paid.financials.net_revenue, Decimal::new(185, 0));

    let error = service.confirm_payment(BookingId(1)).await.expect_err("already paid");
    assert_eq!(
        error,
        ApplicationError::Domain(DomainError::Payment(PaymentError::AlreadyPaid {
            booking_id: BookingId(1)
        }))
    );
    assert_eq!(state.lock().expect("state lock").confirm_calls, 1);

    let again = service.refresh().await.expect("refresh");
    assert_eq!(again.financials, paid.financials);
}
