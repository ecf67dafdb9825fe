//! Booking endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use booking_store::BookingStore;
use common::{BookingId, ScheduleId};
use domain::{
    Actor, Booking, BookingStatus, CustomerId, HistoryEntry, Money, PaymentMethod, PaymentStatus,
    SeatNumber,
};
use lifecycle::{BookingLifecycle, CreateBooking};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::payments::PaymentOutcomeResponse;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookingStore> {
    pub lifecycle: Arc<BookingLifecycle<S>>,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub schedule_id: ScheduleId,
    pub seats: Vec<SeatNumber>,
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub payer_contact: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the customer acting for themselves.
    pub actor: Option<Actor>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct CashPaymentRequest {
    pub amount: Money,
    pub actor: Actor,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking_id: BookingId,
    pub reference: String,
    pub schedule_id: ScheduleId,
    pub customer_id: String,
    pub seats: Vec<SeatNumber>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id(),
            reference: booking.reference().to_string(),
            schedule_id: booking.schedule_id(),
            customer_id: booking.customer_id().to_string(),
            seats: booking.seats().iter().copied().collect(),
            status: booking.status(),
            payment_status: booking.payment_status(),
            payment_method: booking.payment_method(),
            total_amount: booking.total_amount(),
            notes: booking.notes().map(String::from),
            created_at: booking.created_at().to_rfc3339(),
            updated_at: booking.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryResponse {
    pub version: i64,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub event_type: &'static str,
    pub recorded_at: String,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            version: entry.version.as_i64(),
            from: entry.from,
            to: entry.to,
            event_type: entry.event.event_type(),
            recorded_at: entry.recorded_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /bookings: hold seats and create a booking awaiting payment.
#[tracing::instrument(skip(state, req), fields(schedule_id = %req.schedule_id))]
pub async fn create<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let seats: BTreeSet<SeatNumber> = req.seats.iter().copied().collect();
    if seats.len() != req.seats.len() {
        return Err(ApiError::BadRequest(
            "Seat numbers must not repeat".to_string(),
        ));
    }
    if req.customer_id.trim().is_empty() {
        return Err(ApiError::BadRequest("customerId is required".to_string()));
    }

    let actor = req
        .actor
        .unwrap_or_else(|| Actor::customer(req.customer_id.clone()));
    let request = CreateBooking {
        schedule_id: req.schedule_id,
        seats,
        customer_id: CustomerId::new(req.customer_id),
        payment_method: req.payment_method,
        payer_contact: req.payer_contact,
        notes: req.notes,
    };

    let booking = state.lifecycle.create(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(&booking))))
}

/// GET /bookings/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state.lifecycle.get_booking(booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// GET /bookings/by-reference/{reference}
#[tracing::instrument(skip(state))]
pub async fn by_reference<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.lifecycle.find_by_reference(&reference).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// POST /bookings/{id}/cancel: cancel, refunding first if already paid.
#[tracing::instrument(skip(state, req), fields(actor = %req.actor))]
pub async fn cancel<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state
        .lifecycle
        .cancel(booking_id, req.reason, &req.actor)
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// POST /bookings/{id}/complete: mark a confirmed trip as travelled.
#[tracing::instrument(skip(state))]
pub async fn complete<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let booking = state.lifecycle.complete(booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// POST /bookings/{id}/cash-payment: record cash taken at the counter.
#[tracing::instrument(skip(state, req), fields(actor = %req.actor))]
pub async fn cash_payment<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CashPaymentRequest>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let outcome = state
        .lifecycle
        .record_cash_payment(booking_id, req.amount, &req.actor)
        .await?;
    Ok(Json(PaymentOutcomeResponse::from(&outcome)))
}

/// GET /bookings/{id}/history: the audit trail of status transitions.
#[tracing::instrument(skip(state))]
pub async fn history<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let booking_id = parse_booking_id(&id)?;
    let entries = state
        .lifecycle
        .history(booking_id)
        .await?
        .into_iter()
        .map(HistoryEntryResponse::from)
        .collect();
    Ok(Json(entries))
}

fn parse_booking_id(id: &str) -> Result<BookingId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid booking ID: {e}")))
}
