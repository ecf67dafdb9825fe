//! Notification dispatcher trait and implementations.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::BookingId;
use domain::NotificationEvent;
use thiserror::Error;

/// A notification could not be delivered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

/// Sink for ticket and SMS delivery.
///
/// Delivery is best-effort: the lifecycle logs failures and never rolls
/// back a booking because of one.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Tells the collaborator that a booking reached `event`.
    async fn notify(
        &self,
        booking_id: BookingId,
        event: NotificationEvent,
    ) -> Result<(), NotificationError>;
}

/// Dispatcher that only writes a log line per notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn notify(
        &self,
        booking_id: BookingId,
        event: NotificationEvent,
    ) -> Result<(), NotificationError> {
        tracing::info!(%booking_id, event = %event, "booking notification");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<(BookingId, NotificationEvent)>,
    fail: bool,
}

/// In-memory dispatcher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationDispatcher {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationDispatcher {
    /// Creates a new in-memory dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent notification to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Returns the notifications delivered so far.
    pub fn sent(&self) -> Vec<(BookingId, NotificationEvent)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Returns the events delivered for one booking.
    pub fn events_for(&self, booking_id: BookingId) -> Vec<NotificationEvent> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == booking_id)
            .map(|(_, event)| event)
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationDispatcher {
    async fn notify(
        &self,
        booking_id: BookingId,
        event: NotificationEvent,
    ) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(NotificationError("SMS provider unreachable".to_string()));
        }
        state.sent.push((booking_id, event));
        Ok(())
    }
}
