//! Orchestrator
//!
//! Wires the alarm session to its three triggers: inbound MQTT messages,
//! the periodic alarm poller and HTTP arm requests. Every trigger goes
//! through [`AlarmController`], which owns the only mutable
//! [`alarm::TrackingSession`].

mod clock;
mod controller;
mod coordinator;
mod poller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::AlarmController;
pub use coordinator::{parse_sample, IngestionCoordinator, MessageError};
pub use poller::{AlarmPoller, DEFAULT_POLL_INTERVAL};

/// Metric names
pub mod metric_names {
    pub const SAMPLES: &str = "smart_alarm_samples_total";
    pub const WINDOWS_CLASSIFIED: &str = "smart_alarm_windows_classified_total";
    pub const STALE_RESULTS: &str = "smart_alarm_stale_results_total";
    pub const WAKE_EVENTS: &str = "smart_alarm_wake_events_total";
    pub const DROPPED_MESSAGES: &str = "smart_alarm_dropped_messages_total";
}
