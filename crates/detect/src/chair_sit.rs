//! Chair-sit detection against a per-session standing baseline.

use fitquest_pose::{Joint, LandmarkFrame, VISIBILITY_FLOOR};

use crate::{ExerciseKind, MotionDetector, MotionEvent};

/// Fraction of the baseline leg height below which the subject reads as
/// seated.
const SIT_RATIO: f32 = 0.8;

/// Counts stand-to-sit transitions.
///
/// The first frame with a usable hip and knee establishes the standing
/// baseline leg height; it is never recomputed within a session. Later
/// frames classify as sitting when the apparent leg height foreshortens by
/// at least 20%, and the count fires on the rise edge into the seated state.
/// If calibration is never obtained the detector stays inert, surfaced
/// through the status label rather than an error.
pub struct ChairSitDetector {
    calibrated: bool,
    baseline_leg_height: Option<f32>,
    sitting: bool,
    was_sitting: bool,
    sits: u32,
}

impl ChairSitDetector {
    pub fn new() -> Self {
        Self {
            calibrated: false,
            baseline_leg_height: None,
            sitting: false,
            was_sitting: false,
            sits: 0,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn baseline_leg_height(&self) -> Option<f32> {
        self.baseline_leg_height
    }

    pub fn sits(&self) -> u32 {
        self.sits
    }

    fn leg_height(frame: &LandmarkFrame) -> Option<f32> {
        let [hip, knee] =
            frame.all_visible([Joint::LeftHip, Joint::LeftKnee], VISIBILITY_FLOOR)?;
        Some((hip.y - knee.y).abs())
    }
}

impl Default for ChairSitDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector for ChairSitDetector {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::ChairSit
    }

    fn process(&mut self, frame: &LandmarkFrame) -> Vec<MotionEvent> {
        let Some(current) = Self::leg_height(frame) else {
            return Vec::new();
        };

        let Some(baseline) = self.baseline_leg_height else {
            self.baseline_leg_height = Some(current);
            self.calibrated = true;
            tracing::debug!(baseline = current, "chair-sit baseline calibrated");
            return vec![MotionEvent::CalibrationCompleted];
        };

        self.sitting = current < baseline * SIT_RATIO;

        let mut events = Vec::new();
        if self.sitting && !self.was_sitting {
            self.sits += 1;
            tracing::debug!(sits = self.sits, "chair sit detected");
            events.push(MotionEvent::SitCompleted { total: self.sits });
        }
        self.was_sitting = self.sitting;
        events
    }

    fn count(&self) -> u32 {
        self.sits
    }

    fn status(&self) -> &'static str {
        if !self.calibrated {
            "Calibrating..."
        } else if self.sitting {
            "Sitting"
        } else {
            "Standing"
        }
    }

    fn reset(&mut self) {
        self.calibrated = false;
        self.baseline_leg_height = None;
        self.sitting = false;
        self.was_sitting = false;
        self.sits = 0;
    }
}
