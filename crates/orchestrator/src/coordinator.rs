//! Inbound message dispatch

use crate::{metric_names, AlarmController};
use alarm::{AlarmError, AlarmWindow};
use gateway::{topics, InboundMessage};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use window_buffer::{Sample, SampleError};

/// Why an inbound message was dropped
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not UTF-8")]
    NotUtf8,
    #[error("invalid sample JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidSample(#[from] SampleError),
    #[error(transparent)]
    InvalidAlarm(#[from] AlarmError),
    #[error("unknown tracking command {0:?}")]
    UnknownCommand(String),
}

#[derive(Debug, Deserialize)]
struct AccPayload {
    x: f64,
    y: f64,
    z: f64,
}

/// Parse an `acc/data` payload: `{"x": .., "y": .., "z": ..}`
pub fn parse_sample(payload: &[u8]) -> Result<Sample, MessageError> {
    let acc: AccPayload = serde_json::from_slice(payload)?;
    Ok(Sample::checked(acc.x, acc.y, acc.z)?)
}

/// Consumes inbound messages strictly in arrival order
pub struct IngestionCoordinator {
    controller: Arc<AlarmController>,
}

impl IngestionCoordinator {
    pub fn new(controller: Arc<AlarmController>) -> Self {
        Self { controller }
    }

    /// Process messages until the channel closes
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("Ingestion coordinator started");
        while let Some(message) = inbound.recv().await {
            self.dispatch(message).await;
        }
        info!("Ingestion coordinator stopped: inbound channel closed");
    }

    /// Handle one message. Malformed payloads are logged and dropped.
    pub async fn dispatch(&self, message: InboundMessage) {
        let topic = message.topic.as_str();
        let result = if topic.starts_with(topics::SET_ALARM_PREFIX) {
            self.on_set_alarm(&message).await
        } else if topic == topics::ACC_DATA {
            self.on_sample(&message).await
        } else if topic == topics::TRACKING {
            self.on_tracking(&message).await
        } else {
            debug!("Ignoring message on {}", topic);
            Ok(())
        };

        if let Err(e) = result {
            warn!("Dropping message on {}: {}", topic, e);
            counter!(metric_names::DROPPED_MESSAGES, "topic" => topic_label(topic)).increment(1);
        }
    }

    async fn on_set_alarm(&self, message: &InboundMessage) -> Result<(), MessageError> {
        let payload = message.payload_str().ok_or(MessageError::NotUtf8)?;
        let window = AlarmWindow::parse_payload(payload)?;
        info!("Alarm set request: {}", window);
        self.controller.arm(window).await;
        Ok(())
    }

    async fn on_sample(&self, message: &InboundMessage) -> Result<(), MessageError> {
        let sample = parse_sample(&message.payload)?;
        self.controller.handle_sample(sample).await;
        Ok(())
    }

    async fn on_tracking(&self, message: &InboundMessage) -> Result<(), MessageError> {
        let payload = message.payload_str().ok_or(MessageError::NotUtf8)?;
        match payload.trim() {
            "1" => {
                self.controller.start_tracking().await;
                Ok(())
            }
            "0" => {
                self.controller.stop().await;
                Ok(())
            }
            other => Err(MessageError::UnknownCommand(other.to_string())),
        }
    }
}

/// Metric label for a topic; alarm-set topics embed timestamps
fn topic_label(topic: &str) -> &'static str {
    if topic.starts_with(topics::SET_ALARM_PREFIX) {
        topics::SET_ALARM_PREFIX
    } else if topic == topics::ACC_DATA {
        topics::ACC_DATA
    } else if topic == topics::TRACKING {
        topics::TRACKING
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample() {
        let sample = parse_sample(br#"{"x": 0.52, "y": -0.1, "z": 0.96}"#).unwrap();
        assert_eq!(sample, Sample::new(0.52, -0.1, 0.96));
    }

    #[test]
    fn test_parse_sample_rejects_garbage() {
        assert!(matches!(parse_sample(b"not json"), Err(MessageError::InvalidJson(_))));
        assert!(matches!(parse_sample(br#"{"x": 1.0, "y": 2.0}"#), Err(MessageError::InvalidJson(_))));
        assert!(matches!(
            parse_sample(br#"{"x": "a", "y": 2.0, "z": 3.0}"#),
            Err(MessageError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_topic_label() {
        assert_eq!(topic_label("setalarm/2025-05-02_08:00-2025-05-02_08:30"), "setalarm/");
        assert_eq!(topic_label("acc/data"), "acc/data");
        assert_eq!(topic_label("wakeUp/"), "other");
    }
}
