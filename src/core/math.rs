//! Mathematical utilities for angles.
//!
//! All angles are in radians, counter-clockwise positive.

use std::f64::consts::PI;

/// Two times PI (full circle in radians).
pub const TWO_PI: f64 = 2.0 * PI;

/// Normalize angle to [-π, π).
///
/// # Example
/// ```
/// use smriti::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(PI / 2.0) - PI / 2.0).abs() < 1e-12);
/// assert!((normalize_angle(2.5 * PI) - PI / 2.0).abs() < 1e-12);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TWO_PI;
    if a >= PI {
        a -= TWO_PI;
    } else if a < -PI {
        a += TWO_PI;
    }
    a
}

/// Wrap angle to [0, 2π).
///
/// # Example
/// ```
/// use smriti::core::math::wrap_two_pi;
/// use std::f64::consts::PI;
///
/// assert!((wrap_two_pi(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
/// ```
#[inline]
pub fn wrap_two_pi(angle: f64) -> f64 {
    let a = angle.rem_euclid(TWO_PI);
    // rem_euclid can return exactly TWO_PI for tiny negative inputs
    if a >= TWO_PI { 0.0 } else { a }
}

/// Shortest signed angular difference from `from` to `to`, in [-π, π).
#[inline]
pub fn angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!(normalize_angle(0.0).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-9);
        assert!((normalize_angle(-0.5 * PI) + 0.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_two_pi() {
        assert!(wrap_two_pi(0.0).abs() < 1e-12);
        assert!((wrap_two_pi(TWO_PI + 0.25) - 0.25).abs() < 1e-12);
        assert!(wrap_two_pi(-1e-300) < TWO_PI);
    }

    #[test]
    fn test_angle_diff_wraps() {
        let diff = angle_diff(-0.9 * PI, 0.9 * PI);
        assert!((diff + 0.2 * PI).abs() < 1e-9);
    }
}
