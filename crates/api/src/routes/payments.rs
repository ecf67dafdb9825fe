//! Payment gateway webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use booking_store::BookingStore;
use domain::BookingStatus;
use lifecycle::{CallbackOutcome, PaymentCallback};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::bookings::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcomeResponse {
    pub outcome: &'static str,
    pub status: Option<BookingStatus>,
}

impl From<&CallbackOutcome> for PaymentOutcomeResponse {
    fn from(outcome: &CallbackOutcome) -> Self {
        let status = match outcome {
            CallbackOutcome::Applied(status) | CallbackOutcome::Ignored(status) => Some(*status),
            CallbackOutcome::Duplicate | CallbackOutcome::Reconciliation(_) => None,
        };
        Self {
            outcome: outcome.label(),
            status,
        }
    }
}

/// POST /payments/callback: apply a gateway payment confirmation.
///
/// Redeliveries answer 200 with outcome `duplicate` so the gateway stops
/// retrying. An unknown reference answers 404 and is retried by the gateway.
#[tracing::instrument(skip(state, callback), fields(external_ref = %callback.external_ref))]
pub async fn callback<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    if callback.external_ref.trim().is_empty() {
        return Err(ApiError::BadRequest("externalRef is required".to_string()));
    }

    let outcome = state.lifecycle.handle_callback(callback).await?;
    Ok(Json(PaymentOutcomeResponse::from(&outcome)))
}
