//! Game simulation modules

pub mod collision;
pub mod obstacles;
pub mod physics;
pub mod simulation;
pub mod snapshot;

pub use collision::{Aabb, CollisionSystem, TerminalReason, Verdict, WorldBounds};
pub use obstacles::{GapBand, Obstacle, ObstacleStream};
pub use physics::{Actor, PhysicsSystem, WingFlap};
pub use simulation::{RunState, SimEvent, Simulation, COUNTDOWN_STEPS};
pub use snapshot::{FrameSnapshot, NullRenderer, Renderer, TraceRenderer};

/// Size of the play field in screen units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Tuning constants for one run, all expressed per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Downward acceleration added to velocity every frame
    pub gravity: f32,
    /// Velocity assigned by an impulse (negative = upward)
    pub jump_velocity: f32,
    /// Maximum downward velocity
    pub max_fall_speed: f32,
    /// Horizontal distance obstacles scroll every frame
    pub scroll_speed: f32,

    /// Actor bounding box
    pub actor_width: f32,
    pub actor_height: f32,

    /// Obstacle column width
    pub obstacle_width: f32,
    /// Vertical size of the passable gap
    pub gap_height: f32,
    /// Horizontal spacing between consecutive obstacles
    pub spawn_spacing: f32,
    /// Smallest allowed gap top
    pub min_gap_top: f32,
    /// Clearance kept between the lowest gap and the grass line
    pub gap_bottom_margin: f32,

    /// Ground strip height measured from the bottom of the viewport
    pub ground_height: f32,
    /// Grass tufts drawn on top of the ground
    pub grass_height: f32,
    /// Ceiling line measured from the top of the viewport
    pub sky_line: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            gravity: 0.07,
            jump_velocity: -2.5,
            max_fall_speed: 10.0,
            scroll_speed: 2.0,
            actor_width: 58.0,
            actor_height: 45.0,
            obstacle_width: 80.0,
            gap_height: 150.0,
            spawn_spacing: 300.0,
            min_gap_top: 100.0,
            gap_bottom_margin: 50.0,
            ground_height: 100.0,
            grass_height: 20.0,
            sky_line: 50.0,
        }
    }
}
