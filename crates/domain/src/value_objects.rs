//! Value objects for the booking domain.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque customer identifier supplied by the surrounding identity system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Creates a customer ID from the identity system's value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the customer ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CustomerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A sellable seat number on a vehicle layout (1-based).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeatNumber(u16);

impl SeatNumber {
    /// Creates a seat number.
    pub fn new(number: u16) -> Self {
        Self(number)
    }

    /// Returns the raw seat number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for SeatNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SeatNumber {
    fn from(n: u16) -> Self {
        Self(n)
    }
}

/// Externally shown booking code, e.g. `SH-7Q2K9XMA`.
///
/// Distinct from the internal [`common::BookingId`] so that internal
/// identifiers never appear on tickets or SMS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    const PREFIX: &'static str = "SH-";

    /// Generates a fresh reference.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{}{}", Self::PREFIX, &raw[..8]))
    }

    /// Wraps an existing reference value.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount in whole Kenyan shillings.
///
/// Mobile-money charges are settled in whole units, so no minor unit is
/// tracked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a money amount.
    pub fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw amount.
    pub fn amount(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: usize) -> Money {
        Money(self.0 * quantity as i64)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KES {}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_multiply() {
        assert_eq!(Money::new(500).multiply(2), Money::new(1000));
        assert_eq!(Money::new(500).multiply(0), Money::zero());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(1000).to_string(), "KES 1000");
    }

    #[test]
    fn test_money_add() {
        let mut total = Money::new(300);
        total += Money::new(200);
        assert_eq!(total, Money::new(500));
        assert_eq!(Money::new(1) + Money::new(2), Money::new(3));
    }

    #[test]
    fn test_reference_format() {
        let reference = BookingReference::generate();
        assert!(reference.as_str().starts_with("SH-"));
        assert_eq!(reference.as_str().len(), 11);
        assert_ne!(reference, BookingReference::generate());
    }

    #[test]
    fn test_seat_number_ordering() {
        assert!(SeatNumber::new(1) < SeatNumber::new(2));
        assert_eq!(serde_json::to_string(&SeatNumber::new(7)).unwrap(), "7");
    }
}
