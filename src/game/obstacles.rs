//! Obstacle stream: procedural gap generation, scrolling and culling

use rand::Rng;

use super::collision::Aabb;
use super::physics::PhysicsSystem;
use super::{Tuning, Viewport};

/// A top/bottom column pair with a passable gap between them
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    /// Left edge
    pub x: f32,
    /// Y of the lower edge of the top column
    pub gap_top: f32,
    pub gap_height: f32,
    /// Set once the actor has cleared this obstacle
    pub scored: bool,
}

impl Obstacle {
    pub fn new(x: f32, gap_top: f32, gap_height: f32) -> Self {
        Self {
            x,
            gap_top,
            gap_height,
            scored: false,
        }
    }

    /// Right edge, the last part of the obstacle to pass the actor
    pub fn trailing_edge(&self, width: f32) -> f32 {
        self.x + width
    }

    pub fn gap_bottom(&self) -> f32 {
        self.gap_top + self.gap_height
    }

    pub fn top_rect(&self, width: f32) -> Aabb {
        Aabb::new(self.x, 0.0, width, self.gap_top)
    }

    pub fn bottom_rect(&self, width: f32, field_height: f32) -> Aabb {
        let y = self.gap_bottom();
        Aabb::new(self.x, y, width, field_height - y)
    }
}

/// Vertical band a gap top is drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapBand {
    pub min: f32,
    pub max: f32,
}

impl GapBand {
    /// Band for a viewport, capped so every gap stays reachable with the
    /// current jump and gravity. Never inverted: when the cap falls below
    /// the minimum the band collapses onto the minimum.
    pub fn for_viewport(viewport: Viewport, tuning: &Tuning) -> Self {
        let min = tuning.min_gap_top;
        let floor_limit = viewport.height
            - tuning.ground_height
            - tuning.grass_height
            - tuning.gap_height
            - tuning.gap_bottom_margin;

        let max = match PhysicsSystem::achievable_height(tuning) {
            Some(reach) => floor_limit.min(viewport.height / 2.0 + reach / 2.0),
            None => floor_limit,
        };

        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Ordered obstacles, oldest (smallest x) first
#[derive(Debug, Clone)]
pub struct ObstacleStream {
    obstacles: Vec<Obstacle>,
    width: f32,
    gap_height: f32,
    spacing: f32,
    viewport: Viewport,
    band: GapBand,
}

impl ObstacleStream {
    pub fn new(viewport: Viewport, tuning: &Tuning) -> Self {
        Self {
            obstacles: Vec::new(),
            width: tuning.obstacle_width,
            gap_height: tuning.gap_height,
            spacing: tuning.spawn_spacing,
            viewport,
            band: GapBand::for_viewport(viewport, tuning),
        }
    }

    /// Fresh stream holding a single obstacle at the right boundary
    pub fn with_first<R: Rng + ?Sized>(viewport: Viewport, tuning: &Tuning, rng: &mut R) -> Self {
        let mut stream = Self::new(viewport, tuning);
        stream.spawn(rng);
        stream
    }

    /// Follow a viewport change; existing obstacles keep their positions
    pub fn resize(&mut self, viewport: Viewport, tuning: &Tuning) {
        self.viewport = viewport;
        self.band = GapBand::for_viewport(viewport, tuning);
    }

    /// Scroll every obstacle left by `dx`
    pub fn advance(&mut self, dx: f32) {
        for obstacle in &mut self.obstacles {
            obstacle.x -= dx;
        }
    }

    /// Drop obstacles whose trailing edge has left the screen. Returns the
    /// number removed.
    pub fn cull(&mut self) -> usize {
        let before = self.obstacles.len();
        let width = self.width;
        self.obstacles.retain(|o| o.trailing_edge(width) > 0.0);
        before - self.obstacles.len()
    }

    /// Append a new obstacle at the right boundary once the newest one has
    /// scrolled a full spacing in. Returns true when one was added.
    pub fn maybe_spawn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let due = match self.obstacles.last() {
            Some(newest) => newest.x < self.viewport.width - self.spacing,
            None => true,
        };
        if due {
            self.spawn(rng);
        }
        due
    }

    fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let gap_top = self.band.sample(rng);
        self.obstacles
            .push(Obstacle::new(self.viewport.width, gap_top, self.gap_height));
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub(crate) fn obstacles_mut(&mut self) -> &mut [Obstacle] {
        &mut self.obstacles
    }

    /// Column width shared by every obstacle in the stream
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn band(&self) -> GapBand {
        self.band
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }
}
