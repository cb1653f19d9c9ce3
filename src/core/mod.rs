//! Core types for the Smriti library.
//!
//! Coordinate frames follow ROS REP-103:
//! - **X-axis**: Forward (positive ahead of the sensor)
//! - **Y-axis**: Left
//! - **Z-axis**: Up
//! - **Yaw**: Counter-clockwise rotation about +Z (radians)
//!
//! ## Type Categories
//!
//! - [`Point3D`]: A single lidar return in the sensor frame (meters)
//! - [`Pose3D`]: Rigid SE(3) transform (`nalgebra::Isometry3<f64>`)
//! - [`Twist`]: Tangent-space vector `(ρ, φ)` used by the pose graph
//!
//! The [`pose`] module carries the Lie-group helpers (exp/log maps and
//! adjoints) the optimizer is built on.

pub mod math;
mod point;
pub mod pose;

pub use point::{Point3D, PointCloud};
pub use pose::{Pose3D, Twist};
