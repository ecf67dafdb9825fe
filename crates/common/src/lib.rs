//! Shared types for the shuttle booking engine.

pub mod clock;
pub mod types;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{BookingId, CaseId, HoldId, ScheduleId, TransactionId};
pub use version::Version;
