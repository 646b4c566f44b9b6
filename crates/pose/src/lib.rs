//! Landmark frame contract between the external pose estimator and the
//! motion detectors.
//!
//! The estimator delivers one [`LandmarkFrame`] per camera tick: a fixed set
//! of named joints, each with normalized coordinates and a visibility score.
//! Frames are immutable once delivered. A frame with no joints set means no
//! person was detected on that tick.

use fitquest_geometry::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("frame read failed: {0}")]
    ReadFailed(String),
}

pub type Result<T> = std::result::Result<T, PoseError>;

/// Default visibility floor below which a joint is treated as unusable.
pub const VISIBILITY_FLOOR: f32 = 0.5;

/// Body joints tracked by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const COUNT: usize = 10;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    fn index(self) -> usize {
        match self {
            Joint::LeftShoulder => 0,
            Joint::RightShoulder => 1,
            Joint::LeftWrist => 2,
            Joint::RightWrist => 3,
            Joint::LeftHip => 4,
            Joint::RightHip => 5,
            Joint::LeftKnee => 6,
            Joint::RightKnee => 7,
            Joint::LeftAnkle => 8,
            Joint::RightAnkle => 9,
        }
    }
}

/// One joint estimate: normalized image coordinates plus confidence.
///
/// Coordinates are in `[0, 1]` with the origin at the top-left of the image,
/// independent of the actual frame resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A snapshot of joint estimates for a single camera frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkFrame {
    width: u32,
    height: u32,
    joints: [Option<Landmark>; Joint::COUNT],
}

impl LandmarkFrame {
    /// Create an empty frame (no person detected) for a source of the given
    /// pixel dimensions.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            joints: [None; Joint::COUNT],
        }
    }

    /// Builder-style joint assignment, used by sources and tests.
    pub fn with_joint(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.joints[joint.index()] = Some(landmark);
        self
    }

    pub fn set_joint(&mut self, joint: Joint, landmark: Landmark) {
        self.joints[joint.index()] = Some(landmark);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn joint(&self, joint: Joint) -> Option<Landmark> {
        self.joints[joint.index()]
    }

    /// The joint, only if its visibility is strictly above `floor`.
    pub fn visible(&self, joint: Joint, floor: f32) -> Option<Landmark> {
        self.joint(joint).filter(|lm| lm.visibility > floor)
    }

    /// All of the listed joints, each strictly above the visibility floor.
    /// Returns `None` as soon as any joint is missing or occluded.
    pub fn all_visible<const N: usize>(
        &self,
        joints: [Joint; N],
        floor: f32,
    ) -> Option<[Landmark; N]> {
        let mut out = [Landmark::new(0.0, 0.0, 0.0); N];
        for (slot, joint) in out.iter_mut().zip(joints) {
            *slot = self.visible(joint, floor)?;
        }
        Some(out)
    }

    /// Normalized coordinates of a joint.
    pub fn point(&self, joint: Joint) -> Option<Point> {
        self.joint(joint).map(|lm| lm.point())
    }

    /// Pixel-space coordinates of a joint, denormalized against this frame's
    /// dimensions.
    pub fn point_px(&self, joint: Joint) -> Option<Point> {
        self.joint(joint)
            .map(|lm| Point::new(lm.x * self.width as f32, lm.y * self.height as f32))
    }

    /// Denormalize an arbitrary normalized point against this frame.
    pub fn to_px(&self, point: Point) -> Point {
        Point::new(point.x * self.width as f32, point.y * self.height as f32)
    }

    pub fn has_person(&self) -> bool {
        self.joints.iter().any(|j| j.is_some())
    }
}

/// The seam to the external pose estimator.
///
/// `Ok(None)` signals end of stream (camera closed). A frame without joints
/// is a valid tick on which nobody was detected. Implementations own the
/// underlying camera handle; dropping the source releases it.
pub trait PoseSource: Send {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>>;
}

/// A [`PoseSource`] that replays a prerecorded frame sequence.
///
/// Used to drive sessions without a camera: demos, tests, and offline
/// reprocessing of captured landmark logs.
pub struct ReplaySource {
    frames: std::collections::VecDeque<LandmarkFrame>,
    frame_delay: std::time::Duration,
    trailing_error: Option<PoseError>,
}

impl ReplaySource {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self {
            frames: frames.into(),
            frame_delay: std::time::Duration::ZERO,
            trailing_error: None,
        }
    }

    /// Sleep between frames to mimic a camera's native rate.
    pub fn with_frame_delay(mut self, delay: std::time::Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Fail with a read error once the frames run out, instead of ending
    /// cleanly. Models a camera dying mid-session.
    pub fn failing_after(frames: Vec<LandmarkFrame>, message: &str) -> Self {
        Self {
            frames: frames.into(),
            frame_delay: std::time::Duration::ZERO,
            trailing_error: Some(PoseError::ReadFailed(message.to_string())),
        }
    }
}

impl PoseSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>> {
        match self.frames.pop_front() {
            Some(frame) => {
                if !self.frame_delay.is_zero() {
                    std::thread::sleep(self.frame_delay);
                }
                Ok(Some(frame))
            }
            None => match self.trailing_error.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }
}
