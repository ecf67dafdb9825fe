use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use common::{BookingId, Clock, ScheduleId, SystemClock};
use domain::{HoldToken, Schedule, SeatNumber};
use tokio::sync::{Mutex, RwLock};

use crate::Result;
use crate::seats::ScheduleSeats;

/// Point-in-time counts for one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryStats {
    pub capacity: u16,
    pub held: usize,
    pub allocated: usize,
}

/// Seat availability for all schedules.
///
/// Each schedule gets its own mutex the first time it is touched; operations
/// on different schedules never contend.
pub struct SeatInventory {
    schedules: RwLock<HashMap<ScheduleId, Arc<Mutex<ScheduleSeats>>>>,
    clock: Arc<dyn Clock>,
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl SeatInventory {
    /// Creates an empty inventory reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            schedules: RwLock::new(HashMap::new()),
            clock,
        }
    }

    async fn seats_for(&self, schedule: &Schedule) -> Arc<Mutex<ScheduleSeats>> {
        if let Some(seats) = self.schedules.read().await.get(&schedule.schedule_id) {
            return seats.clone();
        }

        self.schedules
            .write()
            .await
            .entry(schedule.schedule_id)
            .or_insert_with(|| Arc::new(Mutex::new(ScheduleSeats::new(schedule))))
            .clone()
    }

    async fn existing(&self, schedule_id: ScheduleId) -> Option<Arc<Mutex<ScheduleSeats>>> {
        self.schedules.read().await.get(&schedule_id).cloned()
    }

    /// Holds every requested seat for `holder`, or none of them.
    ///
    /// Fails with `SeatUnavailable` naming the seats already taken.
    #[tracing::instrument(skip(self, schedule), fields(schedule_id = %schedule.schedule_id))]
    pub async fn hold_seats(
        &self,
        schedule: &Schedule,
        seats: &BTreeSet<SeatNumber>,
        holder: BookingId,
        ttl: Duration,
    ) -> Result<HoldToken> {
        schedule.validate_seats(seats)?;

        let state = self.seats_for(schedule).await;
        let mut state = state.lock().await;

        match state.hold(seats, holder, ttl, self.clock.now()) {
            Ok(token) => {
                metrics::counter!("seat_holds_granted_total").increment(1);
                tracing::debug!(hold_id = %token.hold_id, "Seats held");
                Ok(token)
            }
            Err(e) => {
                metrics::counter!("seat_holds_rejected_total").increment(1);
                tracing::info!(error = %e, "Seat hold rejected");
                Err(e)
            }
        }
    }

    /// Releases a hold. Releasing an unknown, expired or already released
    /// hold is a no-op.
    #[tracing::instrument(skip(self, token), fields(hold_id = %token.hold_id))]
    pub async fn release(&self, token: &HoldToken) {
        let Some(state) = self.existing(token.schedule_id).await else {
            return;
        };
        if state.lock().await.release(token.hold_id) {
            tracing::debug!("Hold released");
        }
    }

    /// Turns a live hold into a permanent allocation for its holder.
    ///
    /// Fails with `HoldExpired` once `expires_at` has passed, whether or not
    /// the sweep has already removed the hold.
    #[tracing::instrument(skip(self, token), fields(hold_id = %token.hold_id))]
    pub async fn finalize(&self, token: &HoldToken) -> Result<()> {
        let Some(state) = self.existing(token.schedule_id).await else {
            return Err(crate::InventoryError::HoldExpired(token.hold_id));
        };
        let result = state.lock().await.finalize(token, self.clock.now());
        if result.is_ok() {
            tracing::debug!(booking_id = %token.holder, "Hold finalized");
        }
        result
    }

    /// Undoes a `finalize` whose booking could not be saved.
    ///
    /// The seats go back on hold with the original expiry, so the payment
    /// can still be settled on redelivery.
    #[tracing::instrument(skip(self, token), fields(hold_id = %token.hold_id))]
    pub async fn revert_finalize(&self, token: &HoldToken) {
        if let Some(state) = self.existing(token.schedule_id).await {
            state.lock().await.unfinalize(token);
            tracing::debug!(booking_id = %token.holder, "Finalize reverted");
        }
    }

    /// Frees the seats allocated to a booking.
    #[tracing::instrument(skip(self))]
    pub async fn release_allocation(&self, schedule_id: ScheduleId, booking_id: BookingId) {
        if let Some(state) = self.existing(schedule_id).await {
            let freed = state.lock().await.release_allocation(booking_id);
            tracing::debug!(freed, "Allocation released");
        }
    }

    /// Returns the seats neither held nor allocated.
    pub async fn availability(&self, schedule: &Schedule) -> BTreeSet<SeatNumber> {
        let state = self.seats_for(schedule).await;
        let state = state.lock().await;
        state.available(self.clock.now())
    }

    /// Returns hold and allocation counts for a schedule.
    pub async fn stats(&self, schedule: &Schedule) -> InventoryStats {
        let state = self.seats_for(schedule).await;
        let state = state.lock().await;
        InventoryStats {
            capacity: state.capacity(),
            held: state.held_count(),
            allocated: state.allocated_count(),
        }
    }

    /// Releases every hold past its expiry; returns the released holds.
    pub async fn sweep_expired(&self) -> Vec<HoldToken> {
        let now = self.clock.now();
        let all: Vec<_> = self.schedules.read().await.values().cloned().collect();

        let mut released = Vec::new();
        for state in all {
            released.extend(state.lock().await.purge_expired(now));
        }

        if !released.is_empty() {
            metrics::counter!("seat_holds_expired_total").increment(released.len() as u64);
            tracing::info!(count = released.len(), "Expired holds released");
        }
        released
    }

    /// Re-registers a hold recorded on a pending booking after a restart.
    ///
    /// Already expired holds are skipped.
    pub async fn restore_hold(&self, schedule: &Schedule, token: HoldToken) -> Result<()> {
        let state = self.seats_for(schedule).await;
        let mut state = state.lock().await;
        state.restore_hold(token, self.clock.now())
    }

    /// Re-registers the seats of a paid booking after a restart.
    pub async fn restore_allocation(
        &self,
        schedule: &Schedule,
        seats: &BTreeSet<SeatNumber>,
        booking_id: BookingId,
    ) -> Result<()> {
        let state = self.seats_for(schedule).await;
        let mut state = state.lock().await;
        state.allocate(seats, booking_id)
    }
}
