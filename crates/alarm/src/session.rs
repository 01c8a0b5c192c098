//! Tracking session state machine
//!
//! ```text
//!            arm                poll (now >= start)
//!   Idle ─────────► Armed ───────────────────────► Tracking
//!    ▲                │                               │
//!    │   stop         │      light sleep in window    │
//!    ├────────────────┘      or poll (now > end)      │
//!    │                                                ▼
//!    └──────────────────────────────────────────── Fired
//! ```
//!
//! Every transition that invalidates work in flight bumps the session
//! generation. Window classifications carry the generation they were taken
//! under and are discarded when it no longer matches.

use crate::AlarmWindow;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};
use window_buffer::{Sample, Window, WindowBuffer};

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    /// No alarm armed
    Idle,
    /// Alarm window set, waiting for its start
    Armed,
    /// Accumulating samples toward classification
    Tracking,
}

/// Why a wake event was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeReason {
    /// Light sleep detected inside the alarm window
    LightSleep,
    /// Alarm window elapsed
    Deadline,
}

impl WakeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeReason::LightSleep => "light_sleep",
            WakeReason::Deadline => "deadline",
        }
    }
}

/// Outbound side effect requested by a transition, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Tell the device to start (true) or stop (false) streaming samples
    TrackingControl(bool),
    /// Trigger the physical wake mechanism
    WakeUp(WakeReason),
    /// Drain the persisted windows and publish them
    DrainSleepData,
}

/// A full window handed off for classification
#[derive(Debug, Clone)]
pub struct CompletedWindow {
    pub window: Window,
    /// Session generation the window was captured under
    pub generation: u64,
}

/// Result of offering a sample to the session
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// Tracking is off; sample discarded
    Dropped,
    /// Sample added to the in-progress window
    Buffered,
    /// Sample completed a window
    Completed(CompletedWindow),
}

/// Result of applying a classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    /// The session moved on since the window was captured
    Stale,
    /// Result belongs to the current session; effects may be empty
    Applied(Vec<Effect>),
}

/// Read-only snapshot for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: AlarmState,
    pub alarm_window: Option<AlarmWindow>,
    pub generation: u64,
    pub buffered_samples: usize,
    pub window_size: usize,
    /// Samples accepted since startup
    pub samples_received: u64,
    /// Windows completed since startup
    pub windows_completed: u64,
    pub wakes_fired: u64,
    pub last_wake: Option<WakeReason>,
}

/// Alarm window, tracking flag and sample buffer as one unit
#[derive(Debug)]
pub struct TrackingSession {
    /// Armed alarm, if any
    alarm: Option<AlarmWindow>,
    /// Whether samples are being accumulated
    tracking: bool,
    /// In-progress window
    buffer: WindowBuffer,
    /// Incremented whenever in-flight classifications become invalid
    generation: u64,
    /// Wake events emitted since startup
    wakes_fired: u64,
    last_wake: Option<WakeReason>,
}

impl TrackingSession {
    /// Create an idle session collecting windows of `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            alarm: None,
            tracking: false,
            buffer: WindowBuffer::new(window_size),
            generation: 0,
            wakes_fired: 0,
            last_wake: None,
        }
    }

    /// Current state
    pub fn state(&self) -> AlarmState {
        match (self.alarm, self.tracking) {
            (None, _) => AlarmState::Idle,
            (Some(_), false) => AlarmState::Armed,
            (Some(_), true) => AlarmState::Tracking,
        }
    }

    pub fn alarm_window(&self) -> Option<AlarmWindow> {
        self.alarm
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot for status reporting
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            alarm_window: self.alarm,
            generation: self.generation,
            buffered_samples: self.buffer.len(),
            window_size: self.buffer.capacity(),
            samples_received: self.buffer.total_appended(),
            windows_completed: self.buffer.windows_emitted(),
            wakes_fired: self.wakes_fired,
            last_wake: self.last_wake,
        }
    }

    /// Arm (or re-arm) the alarm. The new window replaces any existing one
    /// and tracking restarts from scratch once its start is reached.
    pub fn arm(&mut self, window: AlarmWindow) -> Vec<Effect> {
        if let Some(previous) = self.alarm {
            info!("Replacing alarm window {} with {}", previous, window);
        } else {
            info!("Alarm armed: {}", window);
        }
        self.alarm = Some(window);
        self.tracking = false;
        self.buffer.clear();
        self.generation += 1;
        Vec::new()
    }

    /// Timer-driven check: start tracking once the window opens, fire once it
    /// has elapsed. Both can happen in one call when the poller runs late.
    pub fn poll(&mut self, now: NaiveDateTime) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(window) = self.alarm else {
            return effects;
        };

        if !self.tracking && window.has_started(now) {
            info!("Alarm start {} reached, starting sleep tracking", window.start);
            self.begin_tracking();
            effects.push(Effect::TrackingControl(true));
        }

        effects.extend(self.check_deadline(now));
        effects
    }

    /// Fire if tracking and the alarm deadline has passed
    pub fn check_deadline(&mut self, now: NaiveDateTime) -> Vec<Effect> {
        match self.alarm {
            Some(window) if self.tracking && window.has_elapsed(now) => {
                info!("Alarm window {} elapsed, triggering wake-up", window);
                self.fire(WakeReason::Deadline)
            }
            _ => Vec::new(),
        }
    }

    /// Device-requested tracking start. Only meaningful while armed; returns
    /// whether the state changed.
    pub fn start_tracking(&mut self) -> bool {
        match self.state() {
            AlarmState::Armed => {
                info!("Sleep tracking started on request");
                self.begin_tracking();
                true
            }
            AlarmState::Tracking => false,
            AlarmState::Idle => {
                debug!("Tracking start ignored: no alarm armed");
                false
            }
        }
    }

    /// Manual stop: cancels the alarm without a wake event. Returns whether
    /// the state changed.
    pub fn stop(&mut self) -> bool {
        if self.alarm.is_none() && !self.tracking {
            return false;
        }
        info!("Sleep tracking stopped");
        self.reset();
        true
    }

    /// Offer a sample; only buffered while tracking
    pub fn append_sample(&mut self, sample: Sample) -> SampleOutcome {
        if !self.tracking {
            return SampleOutcome::Dropped;
        }
        match self.buffer.append(sample) {
            Some(window) => SampleOutcome::Completed(CompletedWindow {
                window,
                generation: self.generation,
            }),
            None => SampleOutcome::Buffered,
        }
    }

    /// Apply a classification taken under `generation`.
    ///
    /// `wake_candidate` is true when the predicted stage is one the user may
    /// be woken in. Stale results never mutate the session.
    pub fn apply_classification(
        &mut self,
        generation: u64,
        wake_candidate: bool,
        now: NaiveDateTime,
    ) -> ClassificationOutcome {
        if generation != self.generation || !self.tracking {
            debug!(
                "Discarding classification for generation {} (current {})",
                generation, self.generation
            );
            return ClassificationOutcome::Stale;
        }
        let Some(window) = self.alarm else {
            return ClassificationOutcome::Stale;
        };

        if wake_candidate && window.contains(now) {
            info!("Light sleep detected in alarm window, triggering wake-up");
            ClassificationOutcome::Applied(self.fire(WakeReason::LightSleep))
        } else {
            ClassificationOutcome::Applied(Vec::new())
        }
    }

    fn begin_tracking(&mut self) {
        self.tracking = true;
        self.buffer.clear();
        self.generation += 1;
    }

    fn fire(&mut self, reason: WakeReason) -> Vec<Effect> {
        self.reset();
        self.wakes_fired += 1;
        self.last_wake = Some(reason);
        vec![
            Effect::WakeUp(reason),
            Effect::TrackingControl(false),
            Effect::DrainSleepData,
        ]
    }

    fn reset(&mut self) {
        self.alarm = None;
        self.tracking = false;
        self.buffer.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        AlarmWindow::parse_time(s).unwrap()
    }

    fn window() -> AlarmWindow {
        AlarmWindow::parse("2025-05-02_08:00", "2025-05-02_08:30").unwrap()
    }

    fn fill(session: &mut TrackingSession, n: usize) -> Option<CompletedWindow> {
        let mut completed = None;
        for i in 0..n {
            if let SampleOutcome::Completed(c) = session.append_sample(Sample::new(i as f64, 0.0, 1.0)) {
                completed = Some(c);
            }
        }
        completed
    }

    fn wake_count(effects: &[Effect]) -> usize {
        effects.iter().filter(|e| matches!(e, Effect::WakeUp(_))).count()
    }

    #[test]
    fn test_arm_then_start() {
        let mut session = TrackingSession::new(30);
        assert_eq!(session.state(), AlarmState::Idle);

        assert!(session.arm(window()).is_empty());
        assert_eq!(session.state(), AlarmState::Armed);

        assert!(session.poll(at("2025-05-02_07:59")).is_empty());

        let effects = session.poll(at("2025-05-02_08:00"));
        assert_eq!(effects, vec![Effect::TrackingControl(true)]);
        assert_eq!(session.state(), AlarmState::Tracking);

        // Tracking-on is published exactly once
        assert!(session.poll(at("2025-05-02_08:05")).is_empty());
    }

    #[test]
    fn test_deadline_fallback() {
        let mut session = TrackingSession::new(30);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));

        assert!(session.poll(at("2025-05-02_08:30")).is_empty());

        let effects = session.poll(at("2025-05-02_08:31"));
        assert_eq!(
            effects,
            vec![
                Effect::WakeUp(WakeReason::Deadline),
                Effect::TrackingControl(false),
                Effect::DrainSleepData,
            ]
        );
        assert_eq!(session.state(), AlarmState::Idle);
        assert!(session.alarm_window().is_none());
        assert!(!session.is_tracking());

        assert!(session.poll(at("2025-05-02_08:32")).is_empty());
    }

    #[test]
    fn test_late_poll_starts_and_fires() {
        let mut session = TrackingSession::new(30);
        session.arm(window());

        let effects = session.poll(at("2025-05-02_09:00"));
        assert_eq!(effects[0], Effect::TrackingControl(true));
        assert_eq!(wake_count(&effects), 1);
        assert_eq!(session.state(), AlarmState::Idle);
    }

    #[test]
    fn test_samples_dropped_unless_tracking() {
        let mut session = TrackingSession::new(3);
        assert!(matches!(session.append_sample(Sample::default()), SampleOutcome::Dropped));

        session.arm(window());
        assert!(matches!(session.append_sample(Sample::default()), SampleOutcome::Dropped));

        session.poll(at("2025-05-02_08:00"));
        assert!(matches!(session.append_sample(Sample::default()), SampleOutcome::Buffered));
    }

    #[test]
    fn test_status_counts_survive_rearm() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));
        assert!(fill(&mut session, 4).is_some());

        // Re-arming clears the pending sample but keeps the totals
        session.arm(window());
        let status = session.status();
        assert_eq!(status.buffered_samples, 0);
        assert_eq!(status.samples_received, 4);
        assert_eq!(status.windows_completed, 1);
    }

    #[test]
    fn test_light_sleep_fires_once() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));

        let first = fill(&mut session, 3).unwrap();
        let captured = first.generation;

        let outcome = session.apply_classification(first.generation, true, at("2025-05-02_08:10"));
        match outcome {
            ClassificationOutcome::Applied(effects) => assert_eq!(wake_count(&effects), 1),
            ClassificationOutcome::Stale => panic!("current result treated as stale"),
        }

        // A second qualifying result from the same generation arrives late
        let again = session.apply_classification(captured, true, at("2025-05-02_08:11"));
        assert_eq!(again, ClassificationOutcome::Stale);
        assert_eq!(session.status().wakes_fired, 1);
    }

    #[test]
    fn test_light_sleep_outside_window_does_not_fire() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        assert!(session.start_tracking());

        let completed = fill(&mut session, 3).unwrap();
        let outcome = session.apply_classification(completed.generation, true, at("2025-05-02_07:30"));
        assert_eq!(outcome, ClassificationOutcome::Applied(Vec::new()));
        assert_eq!(session.state(), AlarmState::Tracking);
    }

    #[test]
    fn test_deep_sleep_does_not_fire() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));

        let completed = fill(&mut session, 3).unwrap();
        let outcome = session.apply_classification(completed.generation, false, at("2025-05-02_08:10"));
        assert_eq!(outcome, ClassificationOutcome::Applied(Vec::new()));
        assert_eq!(session.state(), AlarmState::Tracking);
    }

    #[test]
    fn test_stale_after_stop() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));
        let completed = fill(&mut session, 3).unwrap();

        assert!(session.stop());
        let outcome = session.apply_classification(completed.generation, true, at("2025-05-02_08:10"));
        assert_eq!(outcome, ClassificationOutcome::Stale);
        assert_eq!(session.status().wakes_fired, 0);
    }

    #[test]
    fn test_stale_after_rearm() {
        let mut session = TrackingSession::new(3);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));
        let completed = fill(&mut session, 3).unwrap();

        session.arm(window());
        session.poll(at("2025-05-02_08:01"));
        assert_eq!(session.state(), AlarmState::Tracking);

        let outcome = session.apply_classification(completed.generation, true, at("2025-05-02_08:10"));
        assert_eq!(outcome, ClassificationOutcome::Stale);
        assert_eq!(session.state(), AlarmState::Tracking);
    }

    #[test]
    fn test_manual_stop_clears_everything() {
        let mut session = TrackingSession::new(30);
        session.arm(window());
        session.poll(at("2025-05-02_08:00"));
        fill(&mut session, 10);
        assert_eq!(session.buffered_samples(), 10);

        assert!(session.stop());
        assert_eq!(session.state(), AlarmState::Idle);
        assert_eq!(session.buffered_samples(), 0);
        assert!(!session.is_tracking());
        assert_eq!(session.status().wakes_fired, 0);

        // Repeated stop is a no-op
        assert!(!session.stop());
    }

    #[test]
    fn test_start_tracking_ignored_when_idle() {
        let mut session = TrackingSession::new(30);
        assert!(!session.start_tracking());
        assert_eq!(session.state(), AlarmState::Idle);
    }

    #[test]
    fn test_rearm_overwrites_window() {
        let mut session = TrackingSession::new(30);
        session.arm(window());
        let later = AlarmWindow::parse("2025-05-03_07:00", "2025-05-03_07:30").unwrap();
        session.arm(later);
        assert_eq!(session.alarm_window(), Some(later));
        assert!(session.poll(at("2025-05-02_08:10")).is_empty());
    }
}
