//! 2D geometry helpers for landmark analysis.
//!
//! All angles are in degrees. Points live in whatever coordinate space the
//! caller works in (normalized or pixel); the functions are unit-agnostic,
//! but mixing spaces within one call is on the caller.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Angle at vertex `p2` formed by the rays towards `p1` and `p3`.
///
/// Computed as the difference of the two `atan2` bearings, folded into
/// `[0, 180]`: any magnitude above 180 reflects to `360 - magnitude`.
pub fn angle_between(p1: Point, p2: Point, p3: Point) -> f32 {
    let raw = (p3.y - p2.y).atan2(p3.x - p2.x) - (p1.y - p2.y).atan2(p1.x - p2.x);
    let degrees = raw.to_degrees().abs();
    if degrees <= 180.0 {
        degrees
    } else {
        360.0 - degrees
    }
}

/// Signed bearing of the vector `to - from`, in degrees in `(-180, 180]`.
pub fn bearing(from: Point, to: Point) -> f32 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Euclidean distance between two points.
pub fn distance(p1: Point, p2: Point) -> f32 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}
