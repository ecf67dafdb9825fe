//! Collaborators of the booking lifecycle.

pub mod catalog;
pub mod gateway;
pub mod notification;

pub use catalog::{InMemoryScheduleCatalog, ScheduleCatalog};
pub use gateway::{ChargeRequest, GatewayError, InMemoryPaymentGateway, PaymentGateway, RefundRequest};
pub use notification::{
    InMemoryNotificationDispatcher, NotificationDispatcher, NotificationError,
    TracingNotificationDispatcher,
};
