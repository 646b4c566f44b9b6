//! Coin-reach detection for the hand-stretch exercise.
//!
//! A virtual coin sits on one of three screen edges; each edge requires a
//! distinct arm gesture to collect. Collection regenerates the target on a
//! freshly rolled edge.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use fitquest_geometry::{bearing, distance, Point};
use fitquest_pose::{Joint, LandmarkFrame, VISIBILITY_FLOOR};

use crate::{ExerciseKind, MotionDetector, MotionEvent};

/// Wrist-to-coin pixel distance within which a reach can collect.
const PROXIMITY_THRESHOLD_PX: f32 = 100.0;

/// Screen edge a coin target occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Center,
    Right,
}

impl Edge {
    /// Derive the edge from a normalized position via fixed bands.
    pub fn from_position(x: f32, y: f32) -> Self {
        if (x - 0.5).abs() < 0.1 && y <= 0.1 {
            Edge::Center
        } else if x <= 0.1 {
            Edge::Left
        } else if x >= 0.9 {
            Edge::Right
        } else {
            Edge::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Center => "center",
            Edge::Right => "right",
        }
    }
}

/// A coin target in normalized screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoinTarget {
    pub x: f32,
    pub y: f32,
    pub edge: Edge,
}

impl CoinTarget {
    /// The fixed position for an edge. The stored edge is re-derived from
    /// the coordinates rather than trusted from the roll.
    pub fn at_edge(edge: Edge) -> Self {
        let (x, y) = match edge {
            Edge::Left => (0.05, 0.5),
            Edge::Center => (0.5, 0.05),
            Edge::Right => (0.95, 0.5),
        };
        Self {
            x,
            y,
            edge: Edge::from_position(x, y),
        }
    }

    /// Roll a uniformly random edge position.
    pub fn generate(rng: &mut StdRng) -> Self {
        let edge = [Edge::Left, Edge::Center, Edge::Right]
            .choose(rng)
            .copied()
            .unwrap_or(Edge::Center);
        Self::at_edge(edge)
    }
}

/// Counts coin collections from wrist reach gestures.
///
/// The collection predicate is edge-specific: the center coin wants either
/// arm raised roughly vertical, the left coin wants the right arm extended
/// across to the anatomical left, the right coin the mirror image. The arm
/// direction is the signed shoulder-to-wrist bearing in pixel space.
pub struct CoinReachDetector {
    target: CoinTarget,
    collected: u32,
    rng: StdRng,
}

impl CoinReachDetector {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic construction for reproducible target sequences.
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let target = CoinTarget::generate(&mut rng);
        Self {
            target,
            collected: 0,
            rng,
        }
    }

    pub fn target(&self) -> CoinTarget {
        self.target
    }

    pub fn collected(&self) -> u32 {
        self.collected
    }

    /// Shoulder-to-wrist bearing magnitude and wrist-to-coin distance, in
    /// pixel space; `None` when either joint is occluded.
    fn arm_reach(
        frame: &LandmarkFrame,
        shoulder: Joint,
        wrist: Joint,
        coin_px: Point,
    ) -> Option<(f32, f32)> {
        let [s, w] = frame.all_visible([shoulder, wrist], VISIBILITY_FLOOR)?;
        let s_px = frame.to_px(s.point());
        let w_px = frame.to_px(w.point());
        Some((distance(w_px, coin_px), bearing(s_px, w_px).abs()))
    }

    fn is_collected(&self, frame: &LandmarkFrame) -> bool {
        let coin_px = frame.to_px(Point::new(self.target.x, self.target.y));

        let left = Self::arm_reach(frame, Joint::LeftShoulder, Joint::LeftWrist, coin_px);
        let right = Self::arm_reach(frame, Joint::RightShoulder, Joint::RightWrist, coin_px);

        match self.target.edge {
            Edge::Center => {
                // Either arm raised roughly vertical.
                let raised = |reach: Option<(f32, f32)>| {
                    reach.is_some_and(|(dist, angle)| {
                        dist < PROXIMITY_THRESHOLD_PX && angle > 70.0 && angle < 110.0
                    })
                };
                raised(left) || raised(right)
            }
            Edge::Left => right.is_some_and(|(dist, angle)| {
                dist < PROXIMITY_THRESHOLD_PX && angle > 160.0
            }),
            Edge::Right => left.is_some_and(|(dist, angle)| {
                dist < PROXIMITY_THRESHOLD_PX && angle < 20.0
            }),
        }
    }
}

impl Default for CoinReachDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector for CoinReachDetector {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Hand
    }

    fn process(&mut self, frame: &LandmarkFrame) -> Vec<MotionEvent> {
        if !self.is_collected(frame) {
            return Vec::new();
        }

        self.collected += 1;
        self.target = CoinTarget::generate(&mut self.rng);
        tracing::debug!(
            collected = self.collected,
            next_edge = self.target.edge.as_str(),
            "coin collected"
        );
        vec![MotionEvent::CoinCollected {
            total: self.collected,
            next: self.target,
        }]
    }

    fn count(&self) -> u32 {
        self.collected
    }

    fn status(&self) -> &'static str {
        match self.target.edge {
            Edge::Left => "Stretch Left",
            Edge::Center => "Stretch Up",
            Edge::Right => "Stretch Right",
        }
    }

    fn reset(&mut self) {
        self.collected = 0;
        self.target = CoinTarget::generate(&mut self.rng);
    }
}
