//! Periodic alarm check

use crate::AlarmController;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Drives the time-based transitions: tracking start at the window start and
/// the deadline wake. Conditions are level-triggered, so a late tick still
/// applies them.
pub struct AlarmPoller {
    controller: Arc<AlarmController>,
    interval: Duration,
}

impl AlarmPoller {
    pub fn new(controller: Arc<AlarmController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    pub async fn run(self) {
        info!("Alarm poller started (every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.controller.poll().await;
        }
    }
}
