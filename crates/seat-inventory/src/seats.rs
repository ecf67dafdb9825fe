//! Seat state of a single schedule.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use common::{BookingId, HoldId, ScheduleId};
use domain::{HoldToken, Schedule, SeatLayout, SeatNumber};

use crate::{InventoryError, Result};

/// Holds and allocations of one schedule.
///
/// A seat number appears in at most one of `held` and `allocated`, and
/// only sellable seats of `layout` are ever recorded.
#[derive(Debug)]
pub(crate) struct ScheduleSeats {
    schedule_id: ScheduleId,
    layout: SeatLayout,
    holds: HashMap<HoldId, HoldToken>,
    held: HashMap<SeatNumber, HoldId>,
    allocated: HashMap<SeatNumber, BookingId>,
}

impl ScheduleSeats {
    pub(crate) fn new(schedule: &Schedule) -> Self {
        Self {
            schedule_id: schedule.schedule_id,
            layout: schedule.layout,
            holds: HashMap::new(),
            held: HashMap::new(),
            allocated: HashMap::new(),
        }
    }

    /// Drops holds whose TTL has passed and returns them.
    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<HoldToken> {
        let expired: Vec<HoldId> = self
            .holds
            .values()
            .filter(|h| h.is_expired(now))
            .map(|h| h.hold_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|hold_id| self.remove_hold(hold_id))
            .collect()
    }

    pub(crate) fn hold(
        &mut self,
        seats: &BTreeSet<SeatNumber>,
        holder: BookingId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<HoldToken> {
        self.purge_expired(now);
        self.ensure_free(seats)?;

        let token = HoldToken {
            hold_id: HoldId::new(),
            schedule_id: self.schedule_id,
            holder,
            seats: seats.clone(),
            expires_at: now + ttl,
        };
        self.insert_hold(token.clone());
        Ok(token)
    }

    /// Re-inserts a hold issued before a restart.
    pub(crate) fn restore_hold(&mut self, token: HoldToken, now: DateTime<Utc>) -> Result<()> {
        self.purge_expired(now);
        if token.is_expired(now) || self.holds.contains_key(&token.hold_id) {
            return Ok(());
        }
        self.ensure_free(&token.seats)?;
        self.insert_hold(token);
        Ok(())
    }

    /// Returns true if the hold was still present.
    pub(crate) fn release(&mut self, hold_id: HoldId) -> bool {
        self.remove_hold(hold_id).is_some()
    }

    pub(crate) fn finalize(&mut self, token: &HoldToken, now: DateTime<Utc>) -> Result<()> {
        let live = self
            .holds
            .get(&token.hold_id)
            .is_some_and(|h| !h.is_expired(now));

        if !live {
            self.remove_hold(token.hold_id);
            return Err(InventoryError::HoldExpired(token.hold_id));
        }

        if let Some(hold) = self.remove_hold(token.hold_id) {
            for seat in hold.seats {
                self.allocated.insert(seat, hold.holder);
            }
        }
        Ok(())
    }

    /// Moves the seats of a finalized hold back to held under the same token.
    pub(crate) fn unfinalize(&mut self, token: &HoldToken) {
        for seat in &token.seats {
            if self.allocated.get(seat) == Some(&token.holder) {
                self.allocated.remove(seat);
            }
        }
        if !self.holds.contains_key(&token.hold_id) && self.ensure_free(&token.seats).is_ok() {
            self.insert_hold(token.clone());
        }
    }

    /// Allocates seats directly to a booking, used when restoring state.
    pub(crate) fn allocate(
        &mut self,
        seats: &BTreeSet<SeatNumber>,
        booking_id: BookingId,
    ) -> Result<()> {
        let conflicting: Vec<SeatNumber> = seats
            .iter()
            .filter(|s| {
                self.held.contains_key(s)
                    || self.allocated.get(s).is_some_and(|owner| *owner != booking_id)
            })
            .copied()
            .collect();
        if !conflicting.is_empty() {
            return Err(InventoryError::SeatUnavailable {
                schedule_id: self.schedule_id,
                seats: conflicting,
            });
        }

        for seat in seats {
            self.allocated.insert(*seat, booking_id);
        }
        Ok(())
    }

    /// Frees seats allocated to `booking_id`; returns how many were freed.
    pub(crate) fn release_allocation(&mut self, booking_id: BookingId) -> usize {
        let before = self.allocated.len();
        self.allocated.retain(|_, owner| *owner != booking_id);
        before - self.allocated.len()
    }

    pub(crate) fn available(&self, now: DateTime<Utc>) -> BTreeSet<SeatNumber> {
        self.layout
            .sellable_seats()
            .into_iter()
            .filter(|seat| !self.allocated.contains_key(seat))
            .filter(|seat| {
                self.held
                    .get(seat)
                    .and_then(|hold_id| self.holds.get(hold_id))
                    .is_none_or(|hold| hold.is_expired(now))
            })
            .collect()
    }

    pub(crate) fn held_count(&self) -> usize {
        self.held.len()
    }

    pub(crate) fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub(crate) fn capacity(&self) -> u16 {
        self.layout.capacity()
    }

    fn ensure_free(&self, seats: &BTreeSet<SeatNumber>) -> Result<()> {
        let taken: Vec<SeatNumber> = seats
            .iter()
            .filter(|s| self.held.contains_key(s) || self.allocated.contains_key(s))
            .copied()
            .collect();

        if taken.is_empty() {
            Ok(())
        } else {
            Err(InventoryError::SeatUnavailable {
                schedule_id: self.schedule_id,
                seats: taken,
            })
        }
    }

    fn insert_hold(&mut self, token: HoldToken) {
        for seat in &token.seats {
            self.held.insert(*seat, token.hold_id);
        }
        self.holds.insert(token.hold_id, token);
    }

    fn remove_hold(&mut self, hold_id: HoldId) -> Option<HoldToken> {
        let token = self.holds.remove(&hold_id)?;
        for seat in &token.seats {
            self.held.remove(seat);
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    fn schedule() -> Schedule {
        Schedule::new(
            ScheduleId::new(),
            SeatLayout::Fourteen,
            Money::new(500),
            Utc::now() + Duration::hours(1),
        )
    }

    fn seats(numbers: &[u16]) -> BTreeSet<SeatNumber> {
        numbers.iter().copied().map(SeatNumber::new).collect()
    }

    #[test]
    fn test_hold_is_all_or_nothing() {
        let mut state = ScheduleSeats::new(&schedule());
        let now = Utc::now();
        let ttl = Duration::seconds(300);

        state
            .hold(&seats(&[3, 4]), BookingId::new(), ttl, now)
            .unwrap();
        let err = state
            .hold(&seats(&[4, 5]), BookingId::new(), ttl, now)
            .unwrap_err();

        assert!(matches!(err, InventoryError::SeatUnavailable { ref seats, .. } if seats == &vec![SeatNumber::new(4)]));
        // Seat 5 was not partially taken
        assert!(state.available(now).contains(&SeatNumber::new(5)));
        assert_eq!(state.held_count(), 2);
    }

    #[test]
    fn test_expired_hold_frees_seats() {
        let mut state = ScheduleSeats::new(&schedule());
        let now = Utc::now();
        let ttl = Duration::seconds(300);

        state
            .hold(&seats(&[1]), BookingId::new(), ttl, now)
            .unwrap();
        assert!(!state.available(now + Duration::seconds(299)).contains(&SeatNumber::new(1)));
        assert!(state.available(now + ttl).contains(&SeatNumber::new(1)));

        let purged = state.purge_expired(now + ttl);
        assert_eq!(purged.len(), 1);
        assert_eq!(state.held_count(), 0);
    }

    #[test]
    fn test_finalize_moves_hold_to_allocation() {
        let mut state = ScheduleSeats::new(&schedule());
        let now = Utc::now();
        let holder = BookingId::new();
        let token = state
            .hold(&seats(&[7, 8]), holder, Duration::seconds(300), now)
            .unwrap();

        state.finalize(&token, now).unwrap();
        assert_eq!(state.held_count(), 0);
        assert_eq!(state.allocated_count(), 2);

        assert_eq!(state.release_allocation(holder), 2);
        assert_eq!(state.available(now).len(), 14);
    }

    #[test]
    fn test_finalize_after_expiry_fails() {
        let mut state = ScheduleSeats::new(&schedule());
        let now = Utc::now();
        let token = state
            .hold(&seats(&[2]), BookingId::new(), Duration::seconds(300), now)
            .unwrap();

        let result = state.finalize(&token, now + Duration::seconds(300));
        assert_eq!(result, Err(InventoryError::HoldExpired(token.hold_id)));
        assert_eq!(state.held_count(), 0);
        assert_eq!(state.allocated_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut state = ScheduleSeats::new(&schedule());
        let now = Utc::now();
        let token = state
            .hold(&seats(&[2]), BookingId::new(), Duration::seconds(300), now)
            .unwrap();

        assert!(state.release(token.hold_id));
        assert!(!state.release(token.hold_id));
        assert_eq!(state.available(now).len(), 14);
    }

    #[test]
    fn test_allocate_rejects_foreign_seats() {
        let mut state = ScheduleSeats::new(&schedule());
        let owner = BookingId::new();
        state.allocate(&seats(&[1, 2]), owner).unwrap();
        // Restoring the same allocation twice is harmless
        state.allocate(&seats(&[1, 2]), owner).unwrap();

        let result = state.allocate(&seats(&[2, 3]), BookingId::new());
        assert!(matches!(
            result,
            Err(InventoryError::SeatUnavailable { .. })
        ));
        assert_eq!(state.allocated_count(), 2);
        assert_eq!(state.capacity(), 14);
    }
}
