//! Events delivered to the notification dispatcher.

use serde::{Deserialize, Serialize};

/// Booking events the ticket/SMS collaborator is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationEvent {
    Confirmed,
    Cancelled,
    Refunded,
}

impl NotificationEvent {
    /// Returns the event name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::Confirmed => "Confirmed",
            NotificationEvent::Cancelled => "Cancelled",
            NotificationEvent::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
