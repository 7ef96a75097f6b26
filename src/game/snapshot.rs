//! Read-only frame snapshots and the renderer seam

use tracing::trace;

use super::collision::Verdict;
use super::obstacles::Obstacle;
use super::physics::Actor;
use super::simulation::RunState;
use super::Viewport;

/// Everything a renderer may look at for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameSnapshot<'a> {
    /// Frame counter since the simulation was created
    pub frame: u64,
    pub viewport: Viewport,
    pub state: RunState,
    pub paused: bool,
    pub score: u32,
    pub high_score: u32,
    pub actor: &'a Actor,
    pub wing_angle: f32,
    pub obstacles: &'a [Obstacle],
    pub obstacle_width: f32,
    /// Where the last run ended, for the impact effect
    pub impact: Option<Verdict>,
}

/// Draws frames. Implementations must not feed anything back into the
/// simulation.
pub trait Renderer {
    fn render(&mut self, frame: &FrameSnapshot<'_>);
}

/// Renderer that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &FrameSnapshot<'_>) {}
}

/// Headless renderer that traces a summary every `interval` frames
pub struct TraceRenderer {
    /// Frames since the last traced one
    frames_since_trace: u32,
    /// Trace interval in frames
    interval: u32,
}

impl TraceRenderer {
    pub fn new(interval: u32) -> Self {
        Self {
            frames_since_trace: 0,
            interval: interval.max(1),
        }
    }

    fn should_trace(&mut self) -> bool {
        self.frames_since_trace += 1;
        if self.frames_since_trace >= self.interval {
            self.frames_since_trace = 0;
            true
        } else {
            false
        }
    }
}

impl Renderer for TraceRenderer {
    fn render(&mut self, frame: &FrameSnapshot<'_>) {
        if !self.should_trace() {
            return;
        }
        trace!(
            frame = frame.frame,
            state = ?frame.state,
            paused = frame.paused,
            score = frame.score,
            high_score = frame.high_score,
            actor_y = frame.actor.y,
            velocity = frame.actor.velocity,
            obstacles = frame.obstacles.len(),
            "frame"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_renderer_fires_on_interval() {
        let mut renderer = TraceRenderer::new(3);
        let fired: Vec<bool> = (0..6).map(|_| renderer.should_trace()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn zero_interval_traces_every_frame() {
        let mut renderer = TraceRenderer::new(0);
        assert!(renderer.should_trace());
        assert!(renderer.should_trace());
    }
}
