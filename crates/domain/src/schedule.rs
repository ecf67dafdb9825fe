//! Schedules and vehicle seat layouts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::ScheduleId;
use serde::{Deserialize, Serialize};

use crate::error::BookingError;
use crate::value_objects::{Money, SeatNumber};

/// Supported vehicle layouts.
///
/// Each layout has a driver seat and some non-sellable empty positions;
/// seat numbers count sellable positions only, so a layout of capacity `n`
/// sells seats `1..=n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum SeatLayout {
    /// 14-seater matatu.
    Fourteen,
    /// 25-seater minibus.
    TwentyFive,
    /// 33-seater bus.
    ThirtyThree,
}

impl SeatLayout {
    /// Returns the number of sellable seats.
    pub fn capacity(&self) -> u16 {
        match self {
            SeatLayout::Fourteen => 14,
            SeatLayout::TwentyFive => 25,
            SeatLayout::ThirtyThree => 33,
        }
    }

    /// Returns true if the seat number can be sold on this layout.
    pub fn is_sellable(&self, seat: SeatNumber) -> bool {
        (1..=self.capacity()).contains(&seat.get())
    }

    /// Returns every sellable seat number.
    pub fn sellable_seats(&self) -> BTreeSet<SeatNumber> {
        (1..=self.capacity()).map(SeatNumber::new).collect()
    }
}

impl TryFrom<u16> for SeatLayout {
    type Error = BookingError;

    fn try_from(capacity: u16) -> Result<Self, Self::Error> {
        match capacity {
            14 => Ok(SeatLayout::Fourteen),
            25 => Ok(SeatLayout::TwentyFive),
            33 => Ok(SeatLayout::ThirtyThree),
            other => Err(BookingError::UnsupportedCapacity(other)),
        }
    }
}

impl From<SeatLayout> for u16 {
    fn from(layout: SeatLayout) -> Self {
        layout.capacity()
    }
}

/// One bookable departure, read from the external route catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: ScheduleId,
    #[serde(rename = "capacity")]
    pub layout: SeatLayout,
    pub price_per_seat: Money,
    pub departure_time: DateTime<Utc>,
}

impl Schedule {
    /// Creates a schedule.
    pub fn new(
        schedule_id: ScheduleId,
        layout: SeatLayout,
        price_per_seat: Money,
        departure_time: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id,
            layout,
            price_per_seat,
            departure_time,
        }
    }

    /// Returns the number of sellable seats.
    pub fn capacity(&self) -> u16 {
        self.layout.capacity()
    }

    /// Checks that a seat request is non-empty and only names sellable seats.
    pub fn validate_seats(&self, seats: &BTreeSet<SeatNumber>) -> Result<(), BookingError> {
        if seats.is_empty() {
            return Err(BookingError::NoSeats);
        }
        if let Some(seat) = seats.iter().find(|s| !self.layout.is_sellable(**s)) {
            return Err(BookingError::InvalidSeat {
                seat: *seat,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Returns the price of the given number of seats.
    pub fn price_for(&self, seat_count: usize) -> Money {
        self.price_per_seat.multiply(seat_count)
    }

    /// Returns true once the departure time has passed.
    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        now >= self.departure_time
    }
}
