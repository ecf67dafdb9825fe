//! Schedule seat availability.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use booking_store::BookingStore;
use common::ScheduleId;
use domain::SeatNumber;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::bookings::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub schedule_id: ScheduleId,
    pub available: Vec<SeatNumber>,
}

/// GET /schedules/{id}/availability: seats neither held nor sold.
#[tracing::instrument(skip(state))]
pub async fn availability<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let schedule_id: ScheduleId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid schedule ID: {e}")))?;

    let available = state.lifecycle.availability(schedule_id).await?;
    Ok(Json(AvailabilityResponse {
        schedule_id,
        available: available.into_iter().collect(),
    }))
}
