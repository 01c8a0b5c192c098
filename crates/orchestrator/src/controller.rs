//! Single mutation point for the tracking session

use crate::metric_names;
use crate::Clock;
use alarm::{
    AlarmWindow, ClassificationOutcome, CompletedWindow, Effect, SampleOutcome, SessionStatus,
    TrackingSession,
};
use chrono::{Duration, NaiveDateTime};
use gateway::Outbound;
use inference_engine::SleepClassifier;
use metrics::counter;
use std::sync::Arc;
use storage::{to_json, LabeledWindow, SleepWindowSink};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use window_buffer::Sample;

/// Owns the tracking session. All triggers (coordinator, poller, HTTP) go
/// through here; effects of a transition are executed before the lock is
/// released so outbound messages keep transition order.
pub struct AlarmController {
    session: Mutex<TrackingSession>,
    classifier: Arc<SleepClassifier>,
    sink: Arc<dyn SleepWindowSink>,
    outbound: mpsc::UnboundedSender<Outbound>,
    clock: Arc<dyn Clock>,
    /// Nominal time between two samples
    sample_period: Duration,
}

impl AlarmController {
    pub fn new(
        classifier: Arc<SleepClassifier>,
        sink: Arc<dyn SleepWindowSink>,
        outbound: mpsc::UnboundedSender<Outbound>,
        clock: Arc<dyn Clock>,
        sample_period: Duration,
    ) -> Self {
        let window_size = classifier.window_size();
        info!(
            "Alarm controller ready: window_size={}, sample_period={}s",
            window_size,
            sample_period.num_seconds()
        );
        Self {
            session: Mutex::new(TrackingSession::new(window_size)),
            classifier,
            sink,
            outbound,
            clock,
            sample_period,
        }
    }

    /// Current wall-clock time as seen by the controller
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Arm (or re-arm) the alarm
    pub async fn arm(&self, window: AlarmWindow) {
        let mut session = self.session.lock().await;
        let effects = session.arm(window);
        self.execute(effects);
    }

    /// Timer check: start tracking at the window start, fire past the end
    pub async fn poll(&self) {
        let mut session = self.session.lock().await;
        let effects = session.poll(self.clock.now());
        self.execute(effects);
    }

    /// Device asked to start tracking
    pub async fn start_tracking(&self) -> bool {
        self.session.lock().await.start_tracking()
    }

    /// Device asked to stop tracking; cancels the alarm without waking
    pub async fn stop(&self) -> bool {
        self.session.lock().await.stop()
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }

    /// Offer one accelerometer sample. A completed window is classified
    /// without holding the session lock; the result only applies if the
    /// session has not moved on in the meantime. The deadline is checked
    /// after the window has been classified and persisted, so a sample
    /// that both completes a window and lands past the alarm end still
    /// contributes its window to the final sleep data.
    pub async fn handle_sample(&self, sample: Sample) {
        let (completed, completed_at) = {
            let mut session = self.session.lock().await;
            let now = self.clock.now();
            let outcome = session.append_sample(sample);
            if !matches!(outcome, SampleOutcome::Dropped) {
                counter!(metric_names::SAMPLES).increment(1);
            }

            match outcome {
                SampleOutcome::Completed(completed) => (completed, now),
                SampleOutcome::Buffered => {
                    debug!("Buffered sample ({}/{})", session.buffered_samples(), self.classifier.window_size());
                    let effects = session.check_deadline(now);
                    self.execute(effects);
                    return;
                }
                SampleOutcome::Dropped => {
                    debug!("Sample dropped: not tracking");
                    return;
                }
            }
        };

        self.classify(completed, completed_at).await;

        let mut session = self.session.lock().await;
        let effects = session.check_deadline(self.clock.now());
        self.execute(effects);
    }

    async fn classify(&self, completed: CompletedWindow, completed_at: NaiveDateTime) {
        let CompletedWindow { window, generation } = completed;
        let classifier = Arc::clone(&self.classifier);
        let task = tokio::task::spawn_blocking(move || {
            let result = classifier.classify(&window);
            (window, result)
        });

        let (window, result) = match task.await {
            Ok(output) => output,
            Err(e) => {
                error!("Classification task failed: {}", e);
                return;
            }
        };
        let classification = match result {
            Ok(classification) => classification,
            Err(e) => {
                error!("Failed to classify window: {}", e);
                return;
            }
        };
        counter!(metric_names::WINDOWS_CLASSIFIED).increment(1);
        info!(
            "Window classified as {} (confidence {:.2})",
            classification.stage,
            classification.confidence()
        );
        debug!(
            "Class probabilities {:?} in {} ms",
            classification.probabilities, classification.latency_ms
        );

        let mut session = self.session.lock().await;
        let outcome = session.apply_classification(
            generation,
            classification.stage.is_wake_candidate(),
            self.clock.now(),
        );
        match outcome {
            ClassificationOutcome::Stale => {
                counter!(metric_names::STALE_RESULTS).increment(1);
                debug!(
                    "Discarded {} result from generation {}",
                    classification.stage, generation
                );
            }
            ClassificationOutcome::Applied(effects) => {
                let labeled = LabeledWindow::ending_at(
                    window,
                    classification.stage.as_str(),
                    completed_at,
                    self.sample_period,
                );
                if let Err(e) = self.sink.append(&labeled) {
                    error!("Failed to persist window: {}", e);
                }
                self.execute(effects);
            }
        }
    }

    /// Run transition effects in order. Called with the session lock held.
    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::TrackingControl(on) => self.send(Outbound::TrackingControl(on)),
                Effect::WakeUp(reason) => {
                    counter!(metric_names::WAKE_EVENTS, "reason" => reason.as_str()).increment(1);
                    info!("Wake-up triggered ({})", reason.as_str());
                    self.send(Outbound::WakeUp);
                }
                Effect::DrainSleepData => self.drain_sleep_data(),
            }
        }
    }

    fn drain_sleep_data(&self) {
        let records = match self.sink.drain() {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to drain sleep data: {}", e);
                return;
            }
        };
        if records.is_empty() {
            debug!("No sleep data to publish");
            return;
        }
        match to_json(&records) {
            Ok(json) => {
                info!("Publishing {} sleep data rows", records.len());
                self.send(Outbound::SleepData(json));
            }
            Err(e) => error!("Failed to encode sleep data: {}", e),
        }
    }

    fn send(&self, message: Outbound) {
        if self.outbound.send(message).is_err() {
            warn!("Outbound queue closed, message dropped");
        }
    }
}
