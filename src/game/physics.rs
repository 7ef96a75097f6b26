//! Actor physics: gravity, impulse and the cosmetic wing flap

use std::f32::consts::PI;

use super::{Tuning, Viewport};

/// Fraction of the theoretical jump apex treated as reachable
const ACHIEVABLE_FRACTION: f32 = 0.8;

/// Wing animation step per frame (radians)
const WING_SPEED: f32 = 0.15;
/// Wing reverses direction beyond this angle
const MAX_WING_ANGLE: f32 = PI / 6.0;

/// The player-controlled entity
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Vertical velocity, positive is downward
    pub velocity: f32,
    /// Physics stays inert until the first impulse
    pub started: bool,
}

impl Actor {
    /// Spawn pose: a quarter of the way across, vertically centred
    pub fn spawn(viewport: Viewport, tuning: &Tuning) -> Self {
        Self {
            x: viewport.width / 4.0,
            y: viewport.height / 2.0,
            width: tuning.actor_width,
            height: tuning.actor_height,
            velocity: 0.0,
            started: false,
        }
    }

    /// Assign the upward impulse velocity and wake the actor up.
    ///
    /// This is an assignment, so repeated calls within a frame are equivalent
    /// to a single call.
    pub fn apply_impulse(&mut self, tuning: &Tuning) {
        self.velocity = tuning.jump_velocity;
        self.started = true;
    }

    /// Advance one frame of gravity integration
    pub fn integrate(&mut self, tuning: &Tuning, paused: bool) {
        if !self.started || paused {
            return;
        }
        let (y, velocity) = PhysicsSystem::step(self.y, self.velocity, tuning);
        self.y = y;
        self.velocity = velocity;
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Stateless physics helpers shared by the actor and the obstacle generator
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// One gravity step. Returns (new_y, new_velocity)
    pub fn step(y: f32, velocity: f32, tuning: &Tuning) -> (f32, f32) {
        let velocity = (velocity + tuning.gravity).min(tuning.max_fall_speed);
        (y + velocity, velocity)
    }

    /// Height an impulse can reliably climb: `v² / 2g`, scaled down to leave
    /// room for reaction time. `None` when gravity is zero (or negative),
    /// in which case there is no ceiling on reachable height.
    pub fn achievable_height(tuning: &Tuning) -> Option<f32> {
        if tuning.gravity <= 0.0 {
            return None;
        }
        let apex = (tuning.jump_velocity * tuning.jump_velocity) / (2.0 * tuning.gravity);
        Some(apex * ACHIEVABLE_FRACTION)
    }
}

/// Cosmetic wing animation. Keeps moving in every run state so idle and
/// frozen frames still look alive.
#[derive(Debug, Clone, PartialEq)]
pub struct WingFlap {
    angle: f32,
    direction: f32,
}

impl WingFlap {
    pub fn new() -> Self {
        Self {
            angle: 0.0,
            direction: 1.0,
        }
    }

    pub fn advance(&mut self) {
        self.angle += WING_SPEED * self.direction;
        if self.angle.abs() > MAX_WING_ANGLE {
            self.direction = -self.direction;
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for WingFlap {
    fn default() -> Self {
        Self::new()
    }
}
