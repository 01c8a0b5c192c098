//! Publish Gateway
//!
//! MQTT connection management for the alarm service:
//! - Bounded retry with fixed backoff for every publish
//! - Subscription to the inbound topics, renewed on every reconnect
//! - Ordered delivery of outbound messages

mod client;
mod retry;

pub use client::{alarm_topic, run_outbound, EventLoopDriver, MqttConfig, MqttGateway, Publisher};
pub use retry::RetryPolicy;

use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Topic names
pub mod topics {
    /// Alarm-set messages (`setalarm/<start>-<end>`)
    pub const SET_ALARM_FILTER: &str = "setalarm/#";
    pub const SET_ALARM_PREFIX: &str = "setalarm/";
    /// Accelerometer samples, JSON `{"x","y","z"}`
    pub const ACC_DATA: &str = "acc/data";
    /// Tracking on/off, `"1"` or `"0"`, in both directions
    pub const TRACKING: &str = "sleeptrackON/";
    pub const WAKE_UP: &str = "wakeUp/";
    /// Retained JSON array of drained sleep rows
    pub const SLEEP_DATA: &str = "sleepdata/";

    /// Filters subscribed on every connection
    pub const SUBSCRIPTIONS: [&str; 3] = [SET_ALARM_FILTER, ACC_DATA, TRACKING];
}

/// Message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, if it is
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Message queued for the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Tracking on (`"1"`) or off (`"0"`)
    TrackingControl(bool),
    /// Wake the user
    WakeUp,
    /// Drained rows as a JSON array, retained
    SleepData(String),
}

impl Outbound {
    pub fn topic(&self) -> &'static str {
        match self {
            Outbound::TrackingControl(_) => topics::TRACKING,
            Outbound::WakeUp => topics::WAKE_UP,
            Outbound::SleepData(_) => topics::SLEEP_DATA,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            Outbound::TrackingControl(true) | Outbound::WakeUp => b"1".to_vec(),
            Outbound::TrackingControl(false) => b"0".to_vec(),
            Outbound::SleepData(json) => json.as_bytes().to_vec(),
        }
    }

    pub fn retain(&self) -> bool {
        matches!(self, Outbound::SleepData(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_encoding() {
        assert_eq!(Outbound::TrackingControl(true).topic(), "sleeptrackON/");
        assert_eq!(Outbound::TrackingControl(false).payload(), b"0");
        assert_eq!(Outbound::WakeUp.topic(), "wakeUp/");
        assert_eq!(Outbound::WakeUp.payload(), b"1");

        let data = Outbound::SleepData("[]".to_string());
        assert_eq!(data.topic(), "sleepdata/");
        assert!(data.retain());
        assert!(!Outbound::WakeUp.retain());
    }

    #[test]
    fn test_inbound_payload_str() {
        assert_eq!(InboundMessage::new("acc/data", "1").payload_str(), Some("1"));
        assert_eq!(InboundMessage::new("acc/data", vec![0xff, 0xfe]).payload_str(), None);
    }
}
