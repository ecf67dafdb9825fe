//! Manual reconciliation queue.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use booking_store::BookingStore;
use common::{BookingId, CaseId};
use domain::{Money, ReconciliationCase};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::bookings::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationCaseResponse {
    pub case_id: CaseId,
    pub booking_id: BookingId,
    pub external_ref: Option<String>,
    pub amount: Money,
    pub reason: &'static str,
    pub detail: String,
    pub raised_at: String,
}

impl From<ReconciliationCase> for ReconciliationCaseResponse {
    fn from(case: ReconciliationCase) -> Self {
        Self {
            case_id: case.case_id,
            booking_id: case.booking_id,
            external_ref: case.external_ref,
            amount: case.amount,
            reason: case.reason.label(),
            detail: case.reason.to_string(),
            raised_at: case.raised_at.to_rfc3339(),
        }
    }
}

/// GET /reconciliation: payments awaiting an operator.
#[tracing::instrument(skip(state))]
pub async fn list<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ReconciliationCaseResponse>>, ApiError> {
    let cases = state
        .lifecycle
        .reconciliation_cases()
        .await?
        .into_iter()
        .map(ReconciliationCaseResponse::from)
        .collect();
    Ok(Json(cases))
}
