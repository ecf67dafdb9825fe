//! Domain layer for the shuttle booking engine.
//!
//! This crate provides the core domain model:
//! - Booking record with its status/payment-status state machine
//! - Schedules and their fixed seat layouts
//! - Seat hold tokens issued by the seat inventory
//! - Payment transactions and manual reconciliation cases
//! - The caller context (`Actor`) passed into every mutation

pub mod actor;
pub mod booking;
pub mod error;
pub mod hold;
pub mod notification;
pub mod payment;
pub mod reconciliation;
pub mod schedule;
pub mod value_objects;

pub use actor::{Actor, Role};
pub use booking::{Booking, BookingEvent, BookingStatus, HistoryEntry, NewBooking, PaymentStatus};
pub use error::BookingError;
pub use hold::HoldToken;
pub use notification::NotificationEvent;
pub use payment::{CallbackStatus, PaymentMethod, PaymentTransaction};
pub use reconciliation::{ReconciliationCase, ReconciliationReason};
pub use schedule::{Schedule, SeatLayout};
pub use value_objects::{BookingReference, CustomerId, Money, SeatNumber};
