//! Collision and scoring - terminal hit detection and gap-clear scoring

use std::fmt;

use serde::{Deserialize, Serialize};

use super::obstacles::ObstacleStream;
use super::physics::Actor;
use super::{Tuning, Viewport};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn of_actor(actor: &Actor) -> Self {
        Self::new(actor.x, actor.y, actor.width, actor.height)
    }

    /// Strict overlap on both axes; touching edges do not collide
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Horizontal lines that end a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    /// Top of the ground strip
    pub ground_line: f32,
    /// Bottom of the sky strip
    pub sky_line: f32,
    /// Full play field height, bottom columns extend to here
    pub field_height: f32,
}

impl WorldBounds {
    pub fn new(viewport: Viewport, tuning: &Tuning) -> Self {
        Self {
            ground_line: viewport.height - tuning.ground_height,
            sky_line: tuning.sky_line,
            field_height: viewport.height,
        }
    }
}

/// What ended the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Ground,
    Ceiling,
    Obstacle,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ground => "ground",
            Self::Ceiling => "ceiling",
            Self::Obstacle => "obstacle",
        };
        f.write_str(name)
    }
}

/// Terminal verdict with the impact point used for the collision effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub reason: TerminalReason,
    pub impact_x: f32,
    pub impact_y: f32,
}

/// Collision system for terminal checks and scoring
pub struct CollisionSystem;

impl CollisionSystem {
    /// Check whether the actor's position ends the run.
    ///
    /// Evaluated ground, then ceiling, then obstacles; the first hit wins.
    pub fn check_terminal(
        actor: &Actor,
        stream: &ObstacleStream,
        bounds: &WorldBounds,
    ) -> Option<Verdict> {
        if actor.bottom() >= bounds.ground_line {
            return Some(Verdict {
                reason: TerminalReason::Ground,
                impact_x: actor.center_x(),
                impact_y: bounds.ground_line,
            });
        }

        if actor.top() <= bounds.sky_line {
            return Some(Verdict {
                reason: TerminalReason::Ceiling,
                impact_x: actor.center_x(),
                impact_y: bounds.sky_line,
            });
        }

        let body = Aabb::of_actor(actor);
        let width = stream.width();
        stream
            .obstacles()
            .iter()
            .find(|o| {
                body.overlaps(&o.top_rect(width))
                    || body.overlaps(&o.bottom_rect(width, bounds.field_height))
            })
            .map(|o| Verdict {
                reason: TerminalReason::Obstacle,
                impact_x: o.x,
                impact_y: actor.center_y(),
            })
    }

    /// Mark obstacles the actor has just cleared. Returns how many were
    /// newly scored this call; already-scored obstacles are never counted again.
    pub fn check_score(actor: &Actor, stream: &mut ObstacleStream) -> u32 {
        let width = stream.width();
        let mut newly_scored = 0;
        for obstacle in stream.obstacles_mut() {
            if !obstacle.scored && obstacle.trailing_edge(width) < actor.left() {
                obstacle.scored = true;
                newly_scored += 1;
            }
        }
        newly_scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::obstacles::Obstacle;

    fn setup() -> (Tuning, Viewport, WorldBounds) {
        let tuning = Tuning::default();
        let viewport = Viewport::new(800.0, 600.0);
        (tuning, viewport, WorldBounds::new(viewport, &tuning))
    }

    fn actor_at(x: f32, y: f32, tuning: &Tuning) -> Actor {
        Actor {
            x,
            y,
            width: tuning.actor_width,
            height: tuning.actor_height,
            velocity: 0.0,
            started: true,
        }
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(10.0, 0.0, 10.0, 10.0);
        let c = Aabb::new(9.0, 9.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn clear_flight_is_not_terminal() {
        let (tuning, viewport, bounds) = setup();
        let stream = ObstacleStream::new(viewport, &tuning);
        let actor = actor_at(200.0, 300.0, &tuning);
        assert_eq!(CollisionSystem::check_terminal(&actor, &stream, &bounds), None);
    }

    #[test]
    fn ground_contact_is_terminal() {
        let (tuning, viewport, bounds) = setup();
        let stream = ObstacleStream::new(viewport, &tuning);
        let actor = actor_at(200.0, bounds.ground_line - tuning.actor_height, &tuning);
        let verdict = CollisionSystem::check_terminal(&actor, &stream, &bounds).unwrap();
        assert_eq!(verdict.reason, TerminalReason::Ground);
        assert_eq!(verdict.impact_y, bounds.ground_line);
    }

    #[test]
    fn ground_wins_over_obstacle() {
        let (tuning, viewport, bounds) = setup();
        let mut stream = ObstacleStream::new(viewport, &tuning);
        // Bottom column covers the actor as well as the ground line
        stream.push(Obstacle::new(190.0, 100.0, 150.0));
        let actor = actor_at(200.0, bounds.ground_line - 10.0, &tuning);

        let verdict = CollisionSystem::check_terminal(&actor, &stream, &bounds).unwrap();
        assert_eq!(verdict.reason, TerminalReason::Ground);
    }

    #[test]
    fn ceiling_wins_over_obstacle() {
        let (tuning, viewport, bounds) = setup();
        assert_eq!(bounds.sky_line, 50.0);
        let mut stream = ObstacleStream::new(viewport, &tuning);
        stream.push(Obstacle::new(190.0, 200.0, 150.0));
        let actor = actor_at(200.0, 0.0, &tuning);

        let verdict = CollisionSystem::check_terminal(&actor, &stream, &bounds).unwrap();
        assert_eq!(verdict.reason, TerminalReason::Ceiling);
    }

    #[test]
    fn top_and_bottom_columns_both_hit() {
        let (tuning, viewport, bounds) = setup();
        let mut stream = ObstacleStream::new(viewport, &tuning);
        stream.push(Obstacle::new(190.0, 250.0, 150.0));

        let in_top = actor_at(200.0, 220.0, &tuning);
        let in_gap = actor_at(200.0, 260.0, &tuning);
        let in_bottom = actor_at(200.0, 380.0, &tuning);

        let hit = |a: &Actor| CollisionSystem::check_terminal(a, &stream, &bounds).map(|v| v.reason);
        assert_eq!(hit(&in_top), Some(TerminalReason::Obstacle));
        assert_eq!(hit(&in_gap), None);
        assert_eq!(hit(&in_bottom), Some(TerminalReason::Obstacle));
    }

    #[test]
    fn score_fires_once_when_trailing_edge_passes() {
        let (tuning, viewport, _) = setup();
        let mut stream = ObstacleStream::new(viewport, &tuning);
        let actor = actor_at(200.0, 300.0, &tuning);
        // Trailing edge exactly at the actor's x: not yet passed
        stream.push(Obstacle::new(200.0 - tuning.obstacle_width, 250.0, 150.0));

        assert_eq!(CollisionSystem::check_score(&actor, &mut stream), 0);
        assert!(!stream.obstacles()[0].scored);

        stream.advance(0.5);
        assert_eq!(CollisionSystem::check_score(&actor, &mut stream), 1);
        assert!(stream.obstacles()[0].scored);

        stream.advance(10.0);
        assert_eq!(CollisionSystem::check_score(&actor, &mut stream), 0);
        assert!(stream.obstacles()[0].scored);
    }

    #[test]
    fn reasons_display_lowercase() {
        assert_eq!(TerminalReason::Ceiling.to_string(), "ceiling");
        assert_eq!(TerminalReason::Ground.to_string(), "ground");
    }
}
