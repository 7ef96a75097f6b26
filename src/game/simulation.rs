//! Per-frame simulation loop and run state machine

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::collision::{CollisionSystem, TerminalReason, Verdict, WorldBounds};
use super::obstacles::{Obstacle, ObstacleStream};
use super::physics::{Actor, WingFlap};
use super::snapshot::{FrameSnapshot, Renderer};
use super::{Tuning, Viewport};

/// Steps in the pre-run countdown, one per second
pub const COUNTDOWN_STEPS: u32 = 3;

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for a start signal
    Idle,
    /// Counting down, world frozen
    Countdown { remaining: u32 },
    /// Full simulation
    Running,
    /// Run ended, world frozen until reset
    Over { reason: TerminalReason },
}

/// Events surfaced to whoever drives the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Countdown advanced, `remaining` steps left
    CountdownTick { remaining: u32 },
    /// Countdown finished, run is live
    RunStarted,
    /// First impulse of the run woke the actor up
    ActorStarted,
    /// Score incremented
    ScoreChanged { score: u32 },
    /// Run ended
    Terminal { reason: TerminalReason, score: u32 },
    /// The run beat the previous best
    NewHighScore { score: u32 },
}

/// Entities that only exist once the viewport is known
#[derive(Debug, Clone)]
struct World {
    actor: Actor,
    stream: ObstacleStream,
    bounds: WorldBounds,
}

impl World {
    fn fresh(viewport: Viewport, tuning: &Tuning, rng: &mut ChaCha8Rng) -> Self {
        Self {
            actor: Actor::spawn(viewport, tuning),
            stream: ObstacleStream::with_first(viewport, tuning, rng),
            bounds: WorldBounds::new(viewport, tuning),
        }
    }
}

/// A single player's simulation
pub struct Simulation {
    tuning: Tuning,
    viewport: Option<Viewport>,
    world: Option<World>,
    state: RunState,
    paused: bool,
    score: u32,
    high_score: u32,
    wings: WingFlap,
    impact: Option<Verdict>,
    rng: ChaCha8Rng,
    frame: u64,
}

impl Simulation {
    /// Create an uninitialised simulation. Ticks are no-ops until
    /// [`Simulation::resize`] supplies a viewport.
    pub fn new(tuning: Tuning, high_score: u32, seed: u64) -> Self {
        Self {
            tuning,
            viewport: None,
            world: None,
            state: RunState::Idle,
            paused: false,
            score: 0,
            high_score,
            wings: WingFlap::new(),
            impact: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            frame: 0,
        }
    }

    /// Set or change the viewport. The first call builds the world; later
    /// calls keep actor and obstacles where they are and only move the bounds.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        match self.world.as_mut() {
            Some(world) => {
                world.stream.resize(viewport, &self.tuning);
                world.bounds = WorldBounds::new(viewport, &self.tuning);
            }
            None => {
                self.world = Some(World::fresh(viewport, &self.tuning, &mut self.rng));
                debug!(width = viewport.width, height = viewport.height, "Simulation initialised");
            }
        }
    }

    /// Idle -> Countdown. Returns false when not idle.
    pub fn start(&mut self) -> bool {
        if self.state != RunState::Idle {
            debug!(state = ?self.state, "Ignoring start outside idle");
            return false;
        }
        self.reset_world();
        self.state = RunState::Countdown {
            remaining: COUNTDOWN_STEPS,
        };
        info!(steps = COUNTDOWN_STEPS, "Countdown started");
        true
    }

    /// Advance the countdown by one step, entering Running at zero
    pub fn countdown_step(&mut self) -> Option<SimEvent> {
        let RunState::Countdown { remaining } = self.state else {
            return None;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.state = RunState::Running;
            info!("Run started");
            Some(SimEvent::RunStarted)
        } else {
            self.state = RunState::Countdown { remaining };
            Some(SimEvent::CountdownTick { remaining })
        }
    }

    /// Apply the player's impulse. Only accepted while running and unpaused.
    pub fn trigger_impulse(&mut self) -> Option<SimEvent> {
        if self.state != RunState::Running || self.paused {
            return None;
        }
        let world = self.world.as_mut()?;
        let first = !world.actor.started;
        world.actor.apply_impulse(&self.tuning);
        first.then_some(SimEvent::ActorStarted)
    }

    /// Run one frame: update when live, then always render
    pub fn tick<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Vec<SimEvent> {
        let mut events = Vec::new();
        self.frame += 1;
        self.wings.advance();

        let Some(world) = self.world.as_mut() else {
            debug!(frame = self.frame, "Tick before actor initialised, skipping");
            return events;
        };

        if self.state == RunState::Running && !self.paused && world.actor.started {
            world.actor.integrate(&self.tuning, self.paused);

            world.stream.advance(self.tuning.scroll_speed);
            world.stream.maybe_spawn(&mut self.rng);
            world.stream.cull();

            match CollisionSystem::check_terminal(&world.actor, &world.stream, &world.bounds) {
                Some(verdict) => {
                    self.state = RunState::Over {
                        reason: verdict.reason,
                    };
                    self.impact = Some(verdict);
                    events.push(SimEvent::Terminal {
                        reason: verdict.reason,
                        score: self.score,
                    });
                    info!(reason = %verdict.reason, score = self.score, "Run over");

                    if self.score > self.high_score {
                        self.high_score = self.score;
                        events.push(SimEvent::NewHighScore { score: self.score });
                    }
                }
                None => {
                    let cleared = CollisionSystem::check_score(&world.actor, &mut world.stream);
                    for _ in 0..cleared {
                        self.score += 1;
                        events.push(SimEvent::ScoreChanged { score: self.score });
                    }
                }
            }
        }

        if let Some(frame) = self.snapshot() {
            renderer.render(&frame);
        }
        events
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            debug!(paused, "Pause toggled");
        }
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.set_paused(!self.paused);
        self.paused
    }

    /// Over -> Idle with a fresh world. Returns false from any other state.
    pub fn reset(&mut self) -> bool {
        if !matches!(self.state, RunState::Over { .. }) {
            return false;
        }
        self.state = RunState::Idle;
        self.paused = false;
        self.reset_world();
        true
    }

    /// Forced end from the session: any state -> Idle with a cleared world.
    /// Returns the score the run had reached.
    pub fn end_session(&mut self) -> u32 {
        let score = self.score;
        self.state = RunState::Idle;
        self.paused = false;
        self.reset_world();
        info!(score, "Session ended, simulation idle");
        score
    }

    fn reset_world(&mut self) {
        self.score = 0;
        self.impact = None;
        self.wings.reset();
        if let Some(viewport) = self.viewport {
            self.world = Some(World::fresh(viewport, &self.tuning, &mut self.rng));
        }
    }

    /// Read-only view of the current frame, `None` before initialisation
    pub fn snapshot(&self) -> Option<FrameSnapshot<'_>> {
        let world = self.world.as_ref()?;
        Some(FrameSnapshot {
            frame: self.frame,
            viewport: self.viewport.unwrap_or_default(),
            state: self.state,
            paused: self.paused,
            score: self.score,
            high_score: self.high_score,
            actor: &world.actor,
            wing_angle: self.wings.angle(),
            obstacles: world.stream.obstacles(),
            obstacle_width: world.stream.width(),
            impact: self.impact,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.world.as_ref().map(|w| &w.actor)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.world
            .as_ref()
            .map(|w| w.stream.obstacles())
            .unwrap_or(&[])
    }

    pub fn bounds(&self) -> Option<WorldBounds> {
        self.world.as_ref().map(|w| w.bounds)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[cfg(test)]
    fn actor_mut(&mut self) -> Option<&mut Actor> {
        self.world.as_mut().map(|w| &mut w.actor)
    }
}
