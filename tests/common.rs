//! Test utilities for Smriti integration tests.
//!
//! A seeded synthetic city, sensor scans taken from planar poses inside it,
//! and trajectory helpers.

#![allow(dead_code)]

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smriti::{Point3D, PointCloud, Pose3D};

/// Route library logs to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Half extent of the synthetic world (meters).
pub const WORLD_HALF_EXTENT: f64 = 60.0;

/// Block structure height at a world location, in `[0, 6]`.
fn structure_height(x: f64, y: f64) -> f64 {
    let blocks = ((x / 7.0).sin() * (y / 5.0).cos()).abs() * 4.0;
    let ridge = if (x / 11.0).floor() as i64 % 3 == 0 { 2.0 } else { 0.0 };
    blocks + ridge
}

/// Seeded static world: points scattered over the ground plane with the
/// height of the structure they belong to.
pub fn synthetic_world(seed: u64, num_points: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_points)
        .map(|_| {
            let x = rng.random_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT);
            let y = rng.random_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT);
            let z = structure_height(x, y) - 1.9 + rng.random_range(0.0..0.1);
            Point3D::new(x, y, z)
        })
        .collect()
}

/// Scan of `world` seen by a sensor at planar pose `(x, y, heading)`.
pub fn scan_at(world: &[Point3D], x: f64, y: f64, heading: f64) -> PointCloud {
    let (s, c) = heading.sin_cos();
    world
        .iter()
        .map(|p| {
            let dx = p.x - x;
            let dy = p.y - y;
            Point3D::new(c * dx + s * dy, -s * dx + c * dy, p.z)
        })
        .collect()
}

/// Rotate every point about the vertical axis.
pub fn rotate_cloud(cloud: &[Point3D], yaw: f64) -> PointCloud {
    cloud.iter().map(|p| p.rotated_yaw(yaw)).collect()
}

/// Planar pose as an SE(3) isometry.
pub fn planar_pose(x: f64, y: f64, heading: f64) -> Pose3D {
    Isometry3::from_parts(
        Translation3::new(x, y, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading),
    )
}

/// Straight trajectory along +X.
pub fn straight_trajectory(n: usize, spacing: f64) -> Vec<Pose3D> {
    (0..n)
        .map(|i| planar_pose(i as f64 * spacing, 0.0, 0.0))
        .collect()
}

/// Square loop that returns to the start (last pose coincides with the first).
pub fn square_loop(side: f64, per_side: usize) -> Vec<Pose3D> {
    let step = side / per_side as f64;
    let mut poses = Vec::with_capacity(4 * per_side + 1);
    let corners = [
        (0.0, 0.0, 0.0),
        (side, 0.0, std::f64::consts::FRAC_PI_2),
        (side, side, std::f64::consts::PI),
        (0.0, side, -std::f64::consts::FRAC_PI_2),
    ];
    for (cx, cy, heading) in corners {
        let (s, c) = f64::sin_cos(heading);
        for i in 0..per_side {
            let d = i as f64 * step;
            poses.push(planar_pose(cx + c * d, cy + s * d, heading));
        }
    }
    poses.push(planar_pose(0.0, 0.0, 0.0));
    poses
}

/// Seed and density of the world used by [`u_turn_scans`].
pub const U_TURN_SEED: u64 = 7;
pub const U_TURN_WORLD_POINTS: usize = 8000;

/// Planar poses `(x, y, heading)`: 10 scans over 8 m heading +X, a turn, and
/// a return to the first scan's position facing the other way.
pub fn u_turn_poses() -> Vec<(f64, f64, f64)> {
    let mut poses: Vec<_> = (0..10).map(|i| (i as f64 * 8.0 / 9.0, 0.0, 0.0)).collect();
    poses.push((9.0, 1.0, std::f64::consts::FRAC_PI_2));
    poses.push((8.0, 2.0, std::f64::consts::PI));
    poses.push((0.05, 0.03, std::f64::consts::PI));
    poses
}

/// Scans along [`u_turn_poses`].
pub fn u_turn_scans() -> Vec<PointCloud> {
    let world = synthetic_world(U_TURN_SEED, U_TURN_WORLD_POINTS);
    u_turn_poses()
        .into_iter()
        .map(|(x, y, heading)| scan_at(&world, x, y, heading))
        .collect()
}

/// Corrupt a trajectory with accumulated heading drift.
pub fn with_heading_drift(poses: &[Pose3D], drift_per_step: f64) -> Vec<Pose3D> {
    let Some(first) = poses.first() else {
        return Vec::new();
    };
    let mut out = vec![*first];
    let drift = planar_pose(0.0, 0.0, drift_per_step);
    for pair in poses.windows(2) {
        let step = pair[0].inverse() * pair[1];
        let last = out[out.len() - 1];
        out.push(last * step * drift);
    }
    out
}

/// Translation distance between two poses.
pub fn translation_error(a: &Pose3D, b: &Pose3D) -> f64 {
    (a.translation.vector - b.translation.vector).norm()
}
