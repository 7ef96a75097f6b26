//! Display-cadence frame source

use std::time::Duration;

use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Ticks at a fixed frame period while running. Stopping drops the
/// interval, so no tick scheduled before `stop()` is ever delivered.
#[derive(Debug)]
pub struct FrameScheduler {
    period: Duration,
    interval: Option<Interval>,
}

impl FrameScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }
        let mut ticker = interval(self.period);
        // A slow frame drops ticks instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(ticker);
        debug!(period_us = self.period.as_micros() as u64, "Frame scheduler started");
    }

    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            debug!("Frame scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next frame. Pending forever while stopped, which makes
    /// it safe to use as a `select!` branch.
    pub async fn next_frame(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(ticker) => ticker.tick().await,
            None => std::future::pending().await,
        }
    }
}
