//! Background sweep for expired holds, unpaid bookings and departed trips.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use booking_store::BookingStore;
use domain::BookingStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::lifecycle::BookingLifecycle;

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Holds released because their TTL passed.
    pub expired_holds: usize,
    /// Pending bookings failed for lack of payment.
    pub timed_out: usize,
    /// Confirmed bookings completed after departure.
    pub completed: usize,
}

impl<S: BookingStore> BookingLifecycle<S> {
    /// Runs one sweep pass.
    ///
    /// Releases expired holds, times out bookings still `PendingPayment`
    /// past the hold TTL plus the payment grace period, and completes
    /// confirmed bookings whose schedule has departed. A booking that moved
    /// on concurrently is skipped.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport {
            expired_holds: self.inventory.sweep_expired().await.len(),
            ..SweepReport::default()
        };

        let now = self.clock.now();
        let cutoff = now - self.config.hold_ttl - self.config.payment_grace;

        for booking in self.store.pending_created_before(cutoff).await? {
            match self
                .on_payment_failure_or_timeout(booking.booking_id(), "payment timed out")
                .await
            {
                Ok(_) => report.timed_out += 1,
                Err(e) if e.is_invalid_transition() => {}
                Err(e) => tracing::warn!(
                    booking_id = %booking.booking_id(),
                    error = %e,
                    "failed to time out booking"
                ),
            }
        }

        let mut departed = HashMap::new();
        for booking in self.store.list_by_status(BookingStatus::Confirmed).await? {
            let schedule_id = booking.schedule_id();
            if !departed.contains_key(&schedule_id) {
                let has_departed = self
                    .catalog
                    .get_schedule(schedule_id)
                    .await
                    .is_some_and(|s| s.has_departed(now));
                departed.insert(schedule_id, has_departed);
            }
            if !departed.get(&schedule_id).copied().unwrap_or(false) {
                continue;
            }

            match self.complete(booking.booking_id()).await {
                Ok(_) => report.completed += 1,
                Err(e) if e.is_invalid_transition() => {}
                Err(e) => tracing::warn!(
                    booking_id = %booking.booking_id(),
                    error = %e,
                    "failed to complete booking"
                ),
            }
        }

        if report != SweepReport::default() {
            metrics::counter!("bookings_timed_out_total").increment(report.timed_out as u64);
            metrics::counter!("bookings_completed_total").increment(report.completed as u64);
            tracing::info!(
                expired_holds = report.expired_holds,
                timed_out = report.timed_out,
                completed = report.completed,
                "sweep finished"
            );
        }
        Ok(report)
    }
}

/// Runs [`BookingLifecycle::sweep`] on a fixed interval until shut down.
pub struct Sweeper<S: BookingStore> {
    lifecycle: Arc<BookingLifecycle<S>>,
    interval: Duration,
}

impl<S: BookingStore + 'static> Sweeper<S> {
    /// Creates a sweeper.
    pub fn new(lifecycle: Arc<BookingLifecycle<S>>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Spawns the sweep loop; it stops when `shutdown` becomes true or its
    /// sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.lifecycle.sweep().await {
                        tracing::error!(error = %e, "sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("sweeper stopped");
    }
}
