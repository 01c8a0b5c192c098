//! Smart Alarm State Machine
//!
//! Owns the alarm window, the tracking flag and the in-progress sample window
//! as a single [`TrackingSession`], and encodes every allowed transition.

mod session;
mod window;

pub use session::{
    AlarmState, ClassificationOutcome, CompletedWindow, Effect, SampleOutcome, SessionStatus,
    TrackingSession, WakeReason,
};
pub use window::{AlarmWindow, ALARM_TIME_FORMAT};

use thiserror::Error;

/// Alarm configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlarmError {
    #[error("Invalid alarm time '{value}': expected YYYY-MM-DD_HH:MM")]
    InvalidTimestamp { value: String },

    #[error("Invalid alarm payload '{0}': expected '<start>,<end>'")]
    InvalidPayload(String),

    #[error("Alarm window end {end} is not after start {start}")]
    EmptyWindow { start: String, end: String },
}
