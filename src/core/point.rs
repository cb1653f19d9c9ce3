//! Point types for 3D lidar scans.

use serde::{Deserialize, Serialize};

/// A single lidar return in the sensor frame (meters).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    /// Forward
    pub x: f64,
    /// Left
    pub y: f64,
    /// Up
    pub z: f64,
}

impl Point3D {
    /// Create a new point
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar range from the sensor origin
    #[inline]
    pub fn planar_range(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Whether all coordinates are finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Rotate about the vertical axis by `yaw` radians (CCW positive)
    #[inline]
    pub fn rotated_yaw(&self, yaw: f64) -> Self {
        let (sin_y, cos_y) = yaw.sin_cos();
        Self::new(
            self.x * cos_y - self.y * sin_y,
            self.x * sin_y + self.y * cos_y,
            self.z,
        )
    }
}

impl From<[f64; 3]> for Point3D {
    #[inline]
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<Point3D> for [f64; 3] {
    #[inline]
    fn from(p: Point3D) -> Self {
        [p.x, p.y, p.z]
    }
}

/// An unordered lidar scan. Duplicates are allowed.
pub type PointCloud = Vec<Point3D>;
