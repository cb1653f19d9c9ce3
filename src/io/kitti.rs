//! KITTI trajectory files: one pose per line, the 12 entries of the top
//! 3×4 block of the homogeneous matrix in row-major order.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use nalgebra::Matrix4;

use crate::core::Pose3D;
use crate::core::pose::from_matrix;
use crate::error::{Error, Result};

/// Render poses.
pub fn to_string(poses: &[Pose3D]) -> String {
    let mut out = String::new();
    for pose in poses {
        let m = pose.to_homogeneous();
        let mut first = true;
        for r in 0..3 {
            for c in 0..4 {
                if !first {
                    out.push(' ');
                }
                first = false;
                let _ = write!(out, "{}", m[(r, c)]);
            }
        }
        out.push('\n');
    }
    out
}

/// Write poses to `path`.
pub fn write_poses(path: &Path, poses: &[Pose3D]) -> Result<()> {
    fs::write(path, to_string(poses))?;
    Ok(())
}

/// Read poses from `path`.
pub fn read_poses(path: &Path) -> Result<Vec<Pose3D>> {
    parse(&fs::read_to_string(path)?)
}

/// Parse KITTI poses.
pub fn parse(text: &str) -> Result<Vec<Pose3D>> {
    let mut poses = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>().map_err(|_| Error::Parse {
                    line: line_no,
                    message: format!("invalid number '{}'", t),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != 12 {
            return Err(Error::Parse {
                line: line_no,
                message: format!("expected 12 values, found {}", values.len()),
            });
        }
        let mut m = Matrix4::identity();
        for r in 0..3 {
            for c in 0..4 {
                m[(r, c)] = values[r * 4 + c];
            }
        }
        poses.push(from_matrix(&m).map_err(|e| Error::Parse {
            line: line_no,
            message: e.to_string(),
        })?);
    }
    Ok(poses)
}
