//! Impulse source for the headless client

use crate::config::PilotMode;
use crate::game::{RunState, Simulation};

/// Flaps whenever the actor sinks below the centre of the next gap.
/// Also provides the first impulse that wakes the actor after a countdown.
#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    /// Pixels below the gap centre tolerated before flapping
    slack: f32,
    /// Stop after waking the actor
    wake_only: bool,
}

impl Autopilot {
    pub fn new(slack: f32) -> Self {
        Self {
            slack,
            wake_only: false,
        }
    }

    /// Wakes the actor and then lets it fall
    pub fn wake_only() -> Self {
        Self {
            wake_only: true,
            ..Self::default()
        }
    }

    pub fn for_mode(mode: PilotMode) -> Option<Self> {
        match mode {
            PilotMode::Fly => Some(Self::default()),
            PilotMode::Wake => Some(Self::wake_only()),
            PilotMode::Off => None,
        }
    }

    /// Whether an impulse should be triggered this frame
    pub fn wants_impulse(&self, sim: &Simulation) -> bool {
        if sim.state() != RunState::Running || sim.is_paused() {
            return false;
        }
        let Some(actor) = sim.actor() else {
            return false;
        };
        if !actor.started {
            return true;
        }
        if self.wake_only || actor.velocity < 0.0 {
            return false;
        }

        let width = sim.tuning().obstacle_width;
        let target = sim
            .obstacles()
            .iter()
            .find(|o| o.trailing_edge(width) >= actor.left())
            .map(|o| o.gap_top + o.gap_height / 2.0)
            .or_else(|| sim.bounds().map(|b| b.ground_line / 2.0));

        match target {
            Some(y) => actor.center_y() > y + self.slack,
            None => false,
        }
    }
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new(10.0)
    }
}
