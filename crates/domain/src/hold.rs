//! Seat hold tokens.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{BookingId, HoldId, ScheduleId};
use serde::{Deserialize, Serialize};

use crate::value_objects::SeatNumber;

/// Proof of a time-boxed seat hold, issued by the seat inventory.
///
/// The booking keeps its token so the lifecycle can later finalize or
/// release exactly the seats it was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldToken {
    pub hold_id: HoldId,
    pub schedule_id: ScheduleId,
    pub holder: BookingId,
    pub seats: BTreeSet<SeatNumber>,
    pub expires_at: DateTime<Utc>,
}

impl HoldToken {
    /// Returns true if the hold has expired at `now`.
    ///
    /// A hold is live during `[created, expires_at)`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
