//! Squat repetition detection from knee-flexion angles.

use fitquest_geometry::angle_between;
use fitquest_pose::{Joint, LandmarkFrame, VISIBILITY_FLOOR};

use crate::{ExerciseKind, MotionDetector, MotionEvent};

/// Knee angle (degrees) below which a leg counts as flexed.
const KNEE_FLEX_THRESHOLD: f32 = 120.0;

/// Session rep target used for progress computation.
pub const DEFAULT_GOAL_REPS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquatPhase {
    Standing,
    Squatting,
}

/// Counts full down-and-up squat cycles.
///
/// A rep requires both knees flexed below the threshold and then both
/// straightened again; the count fires on the Squatting→Standing edge, so
/// holding either position never re-counts.
pub struct SquatDetector {
    phase: SquatPhase,
    reps: u32,
    goal_reps: u32,
}

impl SquatDetector {
    pub fn new(goal_reps: u32) -> Self {
        Self {
            phase: SquatPhase::Standing,
            reps: 0,
            goal_reps: goal_reps.max(1),
        }
    }

    pub fn phase(&self) -> SquatPhase {
        self.phase
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    /// Session progress in percent, derived from the rep count.
    pub fn progress_percent(&self) -> f32 {
        (self.reps as f32 * 100.0 / self.goal_reps as f32).min(100.0)
    }

    fn knee_angles(frame: &LandmarkFrame) -> Option<(f32, f32)> {
        let [lh, lk, la, rh, rk, ra] = frame.all_visible(
            [
                Joint::LeftHip,
                Joint::LeftKnee,
                Joint::LeftAnkle,
                Joint::RightHip,
                Joint::RightKnee,
                Joint::RightAnkle,
            ],
            VISIBILITY_FLOOR,
        )?;

        let left = angle_between(lh.point(), lk.point(), la.point());
        let right = angle_between(rh.point(), rk.point(), ra.point());
        Some((left, right))
    }
}

impl MotionDetector for SquatDetector {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Squat
    }

    fn process(&mut self, frame: &LandmarkFrame) -> Vec<MotionEvent> {
        // An occluded frame must never fabricate a rep: hold state.
        let Some((left, right)) = Self::knee_angles(frame) else {
            return Vec::new();
        };

        let is_squatting = left < KNEE_FLEX_THRESHOLD && right < KNEE_FLEX_THRESHOLD;

        match (self.phase, is_squatting) {
            (SquatPhase::Standing, true) => {
                self.phase = SquatPhase::Squatting;
                Vec::new()
            }
            (SquatPhase::Squatting, false) => {
                self.phase = SquatPhase::Standing;
                self.reps += 1;
                tracing::debug!(reps = self.reps, "squat rep completed");
                vec![MotionEvent::RepCompleted { total: self.reps }]
            }
            _ => Vec::new(),
        }
    }

    fn count(&self) -> u32 {
        self.reps
    }

    fn status(&self) -> &'static str {
        match self.phase {
            SquatPhase::Squatting => "Squatting",
            SquatPhase::Standing => "Stand Straight",
        }
    }

    fn reset(&mut self) {
        self.phase = SquatPhase::Standing;
        self.reps = 0;
    }
}
