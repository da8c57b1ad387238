use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use ridehub_core::config::ApiConfig;
use ridehub_core::{
    ApplicationError, Booking, BookingId, BookingStatus, DriverId, DriverReview, NewDriverReview,
};
use serde_json::Value;

use crate::api::{BookingBackend, BookingScope};
use crate::retry::ReadRetryPolicy;
use crate::session::Session;
use crate::wire;

const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// REST implementation of [`BookingBackend`] over reqwest with bearer auth.
#[derive(Clone, Debug)]
pub struct HttpBookingBackend {
    client: Client,
    base_url: String,
    read_retry: ReadRetryPolicy,
}

impl HttpBookingBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                ApplicationError::Configuration(format!("could not build HTTP client: {error}"))
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            read_retry: ReadRetryPolicy::from_config(config),
        })
    }

    pub fn with_read_retry(mut self, policy: ReadRetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, session: &Session, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, ApplicationError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|error| {
            tracing::warn!(
                event_name = "client.request_failed",
                operation,
                error = %error,
                "backend request did not complete"
            );
            ApplicationError::Transport(format!("{operation}: {error}"))
        })?;

        let status = response.status();
        tracing::debug!(
            event_name = "client.request",
            operation,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend responded"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    async fn get_json(
        &self,
        session: &Session,
        path: &str,
        operation: &str,
    ) -> Result<Value, ApplicationError> {
        let response = self.execute(self.request(session, Method::GET, path), operation).await?;
        response
            .json::<Value>()
            .await
            .map_err(|error| ApplicationError::Decode(format!("{operation}: {error}")))
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> ApplicationError {
    let message = backend_message(body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("request rejected").to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApplicationError::SessionInvalid(format!("{}: {message}", status.as_u16()))
        }
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => {
            ApplicationError::Conflict { status: status.as_u16(), message }
        }
        other if other.is_server_error() => {
            ApplicationError::Transport(format!("{}: {message}", other.as_u16()))
        }
        other => ApplicationError::Conflict { status: other.as_u16(), message },
    }
}

fn backend_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let message = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))?,
        Err(_) => trimmed.to_string(),
    };
    Some(message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect())
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn list_bookings(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<Booking>, ApplicationError> {
        let path = scope.bookings_path();
        let path = path.as_str();
        let body = self
            .read_retry
            .run("list_bookings", move || self.get_json(session, path, "list_bookings"))
            .await?;
        wire::bookings_from_value(body)
    }

    async fn update_status(
        &self,
        session: &Session,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ApplicationError> {
        let request = self
            .request(session, Method::PUT, &format!("/api/bookings/{booking_id}/status"))
            .query(&[("status", status.as_wire())]);
        self.execute(request, "update_status").await.map(|_| ())
    }

    async fn assign_driver(
        &self,
        session: &Session,
        booking_id: BookingId,
        driver_id: DriverId,
    ) -> Result<(), ApplicationError> {
        let request = self
            .request(
                session,
                Method::PUT,
                &format!("/api/admin/bookings/{booking_id}/assign-driver"),
            )
            .query(&[("driverId", driver_id.0)]);
        self.execute(request, "assign_driver").await.map(|_| ())
    }

    async fn confirm_payment(
        &self,
        session: &Session,
        booking_id: BookingId,
    ) -> Result<(), ApplicationError> {
        let request = self.request(
            session,
            Method::PUT,
            &format!("/api/bookings/{booking_id}/confirm-payment"),
        );
        self.execute(request, "confirm_payment").await.map(|_| ())
    }

    async fn list_driver_reviews(
        &self,
        session: &Session,
        scope: BookingScope,
    ) -> Result<Vec<DriverReview>, ApplicationError> {
        let path = scope.reviews_path();
        let path = path.as_str();
        let body = self
            .read_retry
            .run("list_driver_reviews", move || {
                self.get_json(session, path, "list_driver_reviews")
            })
            .await?;
        wire::reviews_from_value(body)
    }

    async fn submit_driver_review(
        &self,
        session: &Session,
        review: &NewDriverReview,
    ) -> Result<(), ApplicationError> {
        let request = self
            .request(session, Method::POST, "/api/driver-reviews")
            .json(&wire::review_request_body(review));
        self.execute(request, "submit_driver_review").await.map(|_| ())
    }
}
