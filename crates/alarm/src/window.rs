//! Alarm window parsing and time checks

use crate::AlarmError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format of alarm times (local wall clock)
pub const ALARM_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M";

/// Time range in which the user may be woken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmWindow {
    /// Earliest wake time; tracking starts here
    pub start: NaiveDateTime,
    /// Hard deadline
    pub end: NaiveDateTime,
}

impl AlarmWindow {
    /// Create a window; `end` must be strictly after `start`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, AlarmError> {
        if end <= start {
            return Err(AlarmError::EmptyWindow {
                start: start.format(ALARM_TIME_FORMAT).to_string(),
                end: end.format(ALARM_TIME_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse one `YYYY-MM-DD_HH:MM` timestamp
    pub fn parse_time(value: &str) -> Result<NaiveDateTime, AlarmError> {
        NaiveDateTime::parse_from_str(value.trim(), ALARM_TIME_FORMAT).map_err(|_| {
            AlarmError::InvalidTimestamp {
                value: value.to_string(),
            }
        })
    }

    /// Parse start and end timestamps
    pub fn parse(start: &str, end: &str) -> Result<Self, AlarmError> {
        Self::new(Self::parse_time(start)?, Self::parse_time(end)?)
    }

    /// Parse an alarm-set payload: `"<start>,<end>"`
    pub fn parse_payload(payload: &str) -> Result<Self, AlarmError> {
        let mut parts = payload.split(',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => Self::parse(start, end),
            _ => Err(AlarmError::InvalidPayload(payload.to_string())),
        }
    }

    /// Encode as an alarm-set payload
    pub fn to_payload(&self) -> String {
        format!(
            "{},{}",
            self.start.format(ALARM_TIME_FORMAT),
            self.end.format(ALARM_TIME_FORMAT)
        )
    }

    /// Start time reached
    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        now >= self.start
    }

    /// Deadline passed
    pub fn has_elapsed(&self, now: NaiveDateTime) -> bool {
        now > self.end
    }

    /// `now` inside `[start, end]`
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.start <= now && now <= self.end
    }
}

impl fmt::Display for AlarmWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(ALARM_TIME_FORMAT),
            self.end.format(ALARM_TIME_FORMAT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let window = AlarmWindow::parse_payload("2025-05-02_08:00,2025-05-02_08:30").unwrap();
        assert_eq!(window.start.format("%H:%M").to_string(), "08:00");
        assert_eq!(window.end.format("%H:%M").to_string(), "08:30");
        assert_eq!(window.to_payload(), "2025-05-02_08:00,2025-05-02_08:30");
    }

    #[test]
    fn test_rejects_bad_format() {
        assert!(matches!(
            AlarmWindow::parse_payload("2025-05-02 08:00,2025-05-02_08:30"),
            Err(AlarmError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            AlarmWindow::parse_payload("2025-05-02_08:00"),
            Err(AlarmError::InvalidPayload(_))
        ));
        assert!(matches!(
            AlarmWindow::parse_payload("a,b,c"),
            Err(AlarmError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(matches!(
            AlarmWindow::parse("2025-05-02_08:30", "2025-05-02_08:00"),
            Err(AlarmError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn test_time_checks() {
        let window = AlarmWindow::parse("2025-05-02_08:00", "2025-05-02_08:30").unwrap();
        let at = |s: &str| AlarmWindow::parse_time(s).unwrap();

        assert!(!window.has_started(at("2025-05-02_07:59")));
        assert!(window.has_started(at("2025-05-02_08:00")));
        assert!(window.contains(at("2025-05-02_08:30")));
        assert!(!window.has_elapsed(at("2025-05-02_08:30")));
        assert!(window.has_elapsed(at("2025-05-02_08:31")));
    }
}
