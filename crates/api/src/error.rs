//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking_store::StoreError;
use domain::BookingError;
use lifecycle::{GatewayError, LifecycleError};
use seat_inventory::InventoryError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Booking lifecycle error.
    Lifecycle(LifecycleError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Lifecycle(err) => lifecycle_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn lifecycle_error_to_response(err: LifecycleError) -> (StatusCode, String) {
    match &err {
        LifecycleError::Inventory(inventory_err) => match inventory_err {
            InventoryError::SeatUnavailable { .. } => (StatusCode::CONFLICT, err.to_string()),
            InventoryError::HoldExpired(_) => {
                (StatusCode::GONE, "seat hold expired".to_string())
            }
            InventoryError::InvalidRequest(booking_err) => booking_error_status(booking_err),
        },
        LifecycleError::Booking(booking_err) => booking_error_status(booking_err),
        LifecycleError::Store(StoreError::ConcurrencyConflict { .. })
        | LifecycleError::Store(StoreError::DuplicateBooking(_)) => (
            StatusCode::CONFLICT,
            "booking was modified concurrently, retry".to_string(),
        ),
        LifecycleError::Store(StoreError::BookingNotFound(id)) => {
            (StatusCode::NOT_FOUND, format!("Booking not found: {id}"))
        }
        LifecycleError::Gateway(GatewayError::Unavailable(_)) => {
            tracing::warn!(error = %err, "payment gateway unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "payment gateway unavailable, try again later".to_string(),
            )
        }
        LifecycleError::Gateway(GatewayError::Rejected(_)) => {
            tracing::warn!(error = %err, "payment gateway rejected request");
            (
                StatusCode::BAD_GATEWAY,
                "payment gateway rejected the request".to_string(),
            )
        }
        LifecycleError::BookingNotFound(_)
        | LifecycleError::ReferenceNotFound(_)
        | LifecycleError::ScheduleNotFound(_)
        | LifecycleError::UnknownPaymentRef(_) => (StatusCode::NOT_FOUND, err.to_string()),
        LifecycleError::ScheduleDeparted(_) => (StatusCode::CONFLICT, err.to_string()),
        LifecycleError::NotCashBooking(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        LifecycleError::Store(_) => {
            tracing::error!(error = %err, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

fn booking_error_status(err: &BookingError) -> (StatusCode, String) {
    let status = match err {
        BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BookingError::PaymentMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::Forbidden { .. } => StatusCode::FORBIDDEN,
        BookingError::NoSeats
        | BookingError::InvalidSeat { .. }
        | BookingError::UnsupportedCapacity(_) => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Lifecycle(err)
    }
}
