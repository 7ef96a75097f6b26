//! Cancellable countdown timers
//!
//! A timer is a spawned task that sends one event per step. Its handle
//! aborts the task on `cancel()` and on drop, so replacing or discarding a
//! handle always clears the timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Which countdown fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Countdown before a run goes live
    RunStart,
    /// Countdown after session results before rejoining
    Restart,
}

/// One countdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub kind: TimerKind,
    /// Steps left after this one; zero on the last event
    pub remaining: u32,
}

/// Handle to a running countdown
#[derive(Debug)]
pub struct CountdownTimer {
    kind: TimerKind,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start a countdown of `steps` events, the first one `period` from now
    pub fn start(
        kind: TimerKind,
        steps: u32,
        period: Duration,
        events: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for remaining in (0..steps).rev() {
                ticker.tick().await;
                if events.send(TimerEvent { kind, remaining }).is_err() {
                    break;
                }
            }
        });

        debug!(?kind, steps, "Countdown timer started");
        Self { kind, task }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        // Drop does the abort
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            debug!(kind = ?self.kind, "Countdown timer cancelled");
        }
        self.task.abort();
    }
}

/// Slot holding at most one timer; setting a new one cancels the old
#[derive(Debug, Default)]
pub struct TimerSlot {
    timer: Option<CountdownTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, timer: CountdownTimer) {
        self.timer = Some(timer);
    }

    pub fn clear(&mut self) {
        self.timer = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}
