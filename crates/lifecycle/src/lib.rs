//! Booking lifecycle for the shuttle booking engine.
//!
//! This crate drives a booking from seat hold to a terminal state:
//! 1. Hold seats and create the booking in `PendingPayment`
//! 2. Initiate the mobile-money charge (bounded retry)
//! 3. Apply the asynchronous gateway callback, idempotently
//! 4. Confirm, cancel, refund or complete, releasing or finalizing seats
//!
//! A background sweep reclaims expired holds and times out unpaid bookings.

pub mod callbacks;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod retry;
pub mod services;
pub mod sweeper;

pub use callbacks::{CallbackOutcome, PaymentCallback};
pub use error::{LifecycleError, Result};
pub use lifecycle::{BookingLifecycle, CreateBooking, LifecycleConfig, Services};
pub use retry::RetryPolicy;
pub use services::{
    ChargeRequest, GatewayError, InMemoryNotificationDispatcher, InMemoryPaymentGateway,
    InMemoryScheduleCatalog, NotificationDispatcher, NotificationError, PaymentGateway,
    RefundRequest, ScheduleCatalog, TracingNotificationDispatcher,
};
pub use sweeper::{SweepReport, Sweeper};
