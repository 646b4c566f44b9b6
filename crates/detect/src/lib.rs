//! Motion event detectors.
//!
//! Each detector is a per-session state machine that consumes one landmark
//! frame at a time and emits discrete, debounced [`MotionEvent`]s. Counting
//! is edge-triggered everywhere: an event fires on a qualifying state
//! transition, never on frames spent inside a state, so noisy input can only
//! ever produce monotonic, non-inflated counts.
//!
//! Frames whose required joints fall below the visibility floor are no-ops:
//! the detector holds its last state rather than guessing.

mod chair_sit;
mod coin_reach;
mod squat;
mod walking;

use serde::{Deserialize, Serialize};

use fitquest_pose::LandmarkFrame;

pub use chair_sit::ChairSitDetector;
pub use coin_reach::{CoinReachDetector, CoinTarget, Edge};
pub use squat::{SquatDetector, SquatPhase, DEFAULT_GOAL_REPS};
pub use walking::{WalkingDetector, WalkingPhase};

/// The exercise modes the tracker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Hand,
    Squat,
    Walking,
    ChairSit,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Hand,
        ExerciseKind::Squat,
        ExerciseKind::Walking,
        ExerciseKind::ChairSit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Hand => "hand",
            ExerciseKind::Squat => "squat",
            ExerciseKind::Walking => "walking",
            ExerciseKind::ChairSit => "chair_sit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hand" => Some(ExerciseKind::Hand),
            "squat" => Some(ExerciseKind::Squat),
            "walking" => Some(ExerciseKind::Walking),
            "chair_sit" => Some(ExerciseKind::ChairSit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete, countable fitness event emitted by a detector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum MotionEvent {
    /// A full down-and-up squat cycle completed.
    RepCompleted { total: u32 },
    /// A new walking episode started.
    BurstStarted { total: u32 },
    /// A stand-to-sit transition registered.
    SitCompleted { total: u32 },
    /// The chair-sit baseline was established.
    CalibrationCompleted,
    /// A coin was reached; `next` is the freshly placed target.
    CoinCollected { total: u32, next: CoinTarget },
}

/// Common shape of the per-mode classifiers.
///
/// Implementations own their state for the session's lifetime and are driven
/// by the classify task; they never touch shared state themselves.
pub trait MotionDetector: Send {
    fn kind(&self) -> ExerciseKind;

    /// Feed one frame; returns the events that fired on this frame.
    fn process(&mut self, frame: &LandmarkFrame) -> Vec<MotionEvent>;

    /// The running count of completed events.
    fn count(&self) -> u32;

    /// Human-readable state label for the render side.
    fn status(&self) -> &'static str;

    /// Return to the freshly-constructed state (including calibration).
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in ExerciseKind::ALL {
            assert_eq!(ExerciseKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ExerciseKind::parse("yoga"), None);
    }

    #[test]
    fn test_fresh_detectors_report_their_kind() {
        let detectors: [Box<dyn MotionDetector>; 4] = [
            Box::new(CoinReachDetector::with_seed(1)),
            Box::new(SquatDetector::new(DEFAULT_GOAL_REPS)),
            Box::new(WalkingDetector::new()),
            Box::new(ChairSitDetector::new()),
        ];
        for (detector, kind) in detectors.iter().zip(ExerciseKind::ALL) {
            assert_eq!(detector.kind(), kind);
            assert_eq!(detector.count(), 0);
        }
    }
}
