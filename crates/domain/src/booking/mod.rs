//! Booking record and its state machine.

mod aggregate;
mod events;
mod state;

pub use aggregate::{Booking, HistoryEntry, NewBooking};
pub use events::{
    BookingEvent, CancellationData, CompletionData, PaymentFailedData, PaymentRequestedData,
    PaymentSettledData, RefundData,
};
pub use state::{BookingStatus, PaymentStatus};
