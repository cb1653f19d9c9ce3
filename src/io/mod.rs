//! Text formats exchanged with external tooling.
//!
//! - [`closures`]: detected closures with their relative transforms
//! - [`kitti`]: trajectories as 3×4 row-major pose matrices
//!
//! The g2o pose graph format lives in [`crate::graph::g2o`].

pub mod closures;
pub mod kitti;

pub use closures::{read_closures, write_closures};
pub use kitti::{read_poses, write_poses};
