//! Walking burst detection from hip-midpoint displacement.

use ringbuf::{
    traits::{Consumer, Observer, RingBuffer},
    HeapRb,
};

use fitquest_pose::{Joint, LandmarkFrame, VISIBILITY_FLOOR};

use crate::{ExerciseKind, MotionDetector, MotionEvent};

/// Horizontal displacement (pixels) across the window that counts as motion.
const CENTER_MOVE_THRESHOLD_PX: f32 = 20.0;

/// Number of recent hip-center samples kept for displacement measurement.
const SMOOTH_FRAMES: usize = 5;

/// Consecutive quiet frames tolerated before a walking episode ends.
const STILL_FRAMES_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkingPhase {
    Standing,
    Walking,
}

/// Counts walking episodes from horizontal hip motion.
///
/// Two thresholds work together: displacement across the sample window must
/// exceed [`CENTER_MOVE_THRESHOLD_PX`] to open an episode (rejecting camera
/// jitter), and more than [`STILL_FRAMES_THRESHOLD`] consecutive quiet frames
/// must pass before it closes (so a stance pause mid-stride does not split
/// one walk into two bursts).
pub struct WalkingDetector {
    history: HeapRb<f32>,
    phase: WalkingPhase,
    still_frames: u32,
    bursts: u32,
}

impl WalkingDetector {
    pub fn new() -> Self {
        Self {
            history: HeapRb::new(SMOOTH_FRAMES),
            phase: WalkingPhase::Standing,
            still_frames: 0,
            bursts: 0,
        }
    }

    pub fn phase(&self) -> WalkingPhase {
        self.phase
    }

    pub fn bursts(&self) -> u32 {
        self.bursts
    }

    fn window_movement(&self) -> f32 {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &sample in self.history.iter() {
            min = min.min(sample);
            max = max.max(sample);
        }
        max - min
    }
}

impl Default for WalkingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector for WalkingDetector {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Walking
    }

    fn process(&mut self, frame: &LandmarkFrame) -> Vec<MotionEvent> {
        let Some([left_hip, right_hip]) =
            frame.all_visible([Joint::LeftHip, Joint::RightHip], VISIBILITY_FLOOR)
        else {
            return Vec::new();
        };

        let center_px = (left_hip.x + right_hip.x) / 2.0 * frame.width() as f32;
        self.history.push_overwrite(center_px);

        if self.history.occupied_len() < 2 {
            return Vec::new();
        }

        if self.window_movement() > CENTER_MOVE_THRESHOLD_PX {
            self.still_frames = 0;
            if self.phase == WalkingPhase::Standing {
                self.phase = WalkingPhase::Walking;
                self.bursts += 1;
                tracing::debug!(bursts = self.bursts, "walking burst started");
                return vec![MotionEvent::BurstStarted { total: self.bursts }];
            }
        } else {
            self.still_frames += 1;
            if self.still_frames > STILL_FRAMES_THRESHOLD {
                self.phase = WalkingPhase::Standing;
            }
        }
        Vec::new()
    }

    fn count(&self) -> u32 {
        self.bursts
    }

    fn status(&self) -> &'static str {
        match self.phase {
            WalkingPhase::Walking => "Walking",
            WalkingPhase::Standing => "Standing",
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.phase = WalkingPhase::Standing;
        self.still_frames = 0;
        self.bursts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitquest_pose::Landmark;

    const WIDTH: u32 = 800;

    fn frame_at_px(center_px: f32) -> LandmarkFrame {
        let x = center_px / WIDTH as f32;
        LandmarkFrame::empty(WIDTH, 600)
            .with_joint(Joint::LeftHip, Landmark::new(x, 0.5, 0.9))
            .with_joint(Joint::RightHip, Landmark::new(x, 0.5, 0.9))
    }

    fn feed(detector: &mut WalkingDetector, positions: &[f32]) {
        for &px in positions {
            detector.process(&frame_at_px(px));
        }
    }

    #[test]
    fn test_still_subject_never_bursts() {
        let mut detector = WalkingDetector::new();
        feed(&mut detector, &[100.0; 30]);
        assert_eq!(detector.bursts(), 0);
        assert_eq!(detector.phase(), WalkingPhase::Standing);
    }

    #[test]
    fn test_jitter_below_threshold_ignored() {
        let mut detector = WalkingDetector::new();
        // 15px of wobble stays under the 20px displacement gate.
        feed(&mut detector, &[100.0, 115.0, 100.0, 115.0, 100.0, 115.0]);
        assert_eq!(detector.bursts(), 0);
    }

    #[test]
    fn test_burst_fires_once_per_episode() {
        let mut detector = WalkingDetector::new();

        feed(&mut detector, &[100.0; 5]);
        assert_eq!(detector.bursts(), 0);

        // Sustained motion: one burst on the first qualifying frame only.
        feed(&mut detector, &[100.0, 140.0, 100.0, 140.0, 100.0]);
        assert_eq!(detector.bursts(), 1);
        assert_eq!(detector.phase(), WalkingPhase::Walking);

        // The window drains, then eleven quiet frames close the episode
        // without any extra burst.
        feed(&mut detector, &[100.0; 14]);
        assert_eq!(detector.bursts(), 1);
        assert_eq!(detector.phase(), WalkingPhase::Standing);

        // Motion resumes: exactly one new burst.
        feed(&mut detector, &[140.0]);
        assert_eq!(detector.bursts(), 2);
        assert_eq!(detector.phase(), WalkingPhase::Walking);
    }

    #[test]
    fn test_hysteresis_boundary() {
        let mut detector = WalkingDetector::new();

        feed(&mut detector, &[100.0, 140.0, 140.0, 140.0, 140.0]);
        assert_eq!(detector.bursts(), 1);

        // Ten quiet frames: the episode stays open.
        feed(&mut detector, &[140.0; 10]);
        assert_eq!(detector.phase(), WalkingPhase::Walking);

        // The eleventh closes it.
        feed(&mut detector, &[140.0]);
        assert_eq!(detector.phase(), WalkingPhase::Standing);

        // And renewed movement counts one more burst.
        feed(&mut detector, &[180.0]);
        assert_eq!(detector.bursts(), 2);
    }

    #[test]
    fn test_occluded_hips_do_not_feed_history() {
        let mut detector = WalkingDetector::new();
        feed(&mut detector, &[100.0, 100.0]);

        let mut hidden = frame_at_px(400.0);
        hidden.set_joint(Joint::LeftHip, Landmark::new(0.5, 0.5, 0.3));
        assert!(detector.process(&hidden).is_empty());
        assert_eq!(detector.bursts(), 0);

        // A visible jump afterwards still registers against the old window.
        feed(&mut detector, &[140.0]);
        assert_eq!(detector.bursts(), 1);
    }

    #[test]
    fn test_bursts_are_monotonic() {
        let mut detector = WalkingDetector::new();
        let mut last = 0;
        for i in 0..60 {
            let px = if (i / 7) % 2 == 0 { 100.0 } else { 160.0 };
            detector.process(&frame_at_px(px));
            assert!(detector.bursts() >= last);
            last = detector.bursts();
        }
    }
}
