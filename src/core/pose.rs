//! SE(3) pose utilities.
//!
//! Poses are `nalgebra::Isometry3<f64>`. Tangent vectors are ordered
//! translation first: `ξ = (ρ, φ)` with `ρ` the translational part and `φ` the
//! rotation vector. The same ordering indexes the 6×6 information matrices.
//!
//! Increments are applied on the right: `T ← T · exp(δ)`.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Matrix6, Quaternion, Rotation3, Translation3, UnitQuaternion,
    Vector3, Vector6,
};

use crate::error::{Error, Result};

/// Rigid body transform in 3D.
pub type Pose3D = Isometry3<f64>;

/// Tangent-space vector `(ρx, ρy, ρz, φx, φy, φz)`.
pub type Twist = Vector6<f64>;

/// Threshold below which Taylor expansions replace closed forms.
const SMALL_ANGLE: f64 = 1e-6;

/// Tolerance for accepting a 4×4 matrix as a rigid transform.
const RIGID_TOLERANCE: f64 = 1e-4;

/// Skew-symmetric matrix `[v]×`.
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    v.cross_matrix()
}

#[inline]
fn translation_part(xi: &Twist) -> Vector3<f64> {
    Vector3::new(xi[0], xi[1], xi[2])
}

#[inline]
fn rotation_part(xi: &Twist) -> Vector3<f64> {
    Vector3::new(xi[3], xi[4], xi[5])
}

/// Exponential map `se(3) → SE(3)`.
pub fn exp(xi: &Twist) -> Pose3D {
    let rho = translation_part(xi);
    let phi = rotation_part(xi);
    let theta = phi.norm();
    let phi_x = skew(&phi);
    let phi_x2 = phi_x * phi_x;

    let (a, b) = if theta < SMALL_ANGLE {
        let t2 = theta * theta;
        (0.5 - t2 / 24.0, 1.0 / 6.0 - t2 / 120.0)
    } else {
        let t2 = theta * theta;
        (
            (1.0 - theta.cos()) / t2,
            (theta - theta.sin()) / (t2 * theta),
        )
    };

    let v = Matrix3::identity() + phi_x * a + phi_x2 * b;
    let rotation = UnitQuaternion::from_scaled_axis(phi);
    Isometry3::from_parts(Translation3::from(v * rho), rotation)
}

/// Logarithm map `SE(3) → se(3)`.
pub fn log(pose: &Pose3D) -> Twist {
    let phi = pose.rotation.scaled_axis();
    let theta = phi.norm();
    let phi_x = skew(&phi);
    let phi_x2 = phi_x * phi_x;

    let c = if theta < SMALL_ANGLE {
        1.0 / 12.0 + theta * theta / 720.0
    } else {
        let half = 0.5 * theta;
        (1.0 - half * half.cos() / half.sin()) / (theta * theta)
    };

    let v_inv = Matrix3::identity() - phi_x * 0.5 + phi_x2 * c;
    let rho = v_inv * pose.translation.vector;
    Vector6::new(rho[0], rho[1], rho[2], phi[0], phi[1], phi[2])
}

/// Adjoint of `T = (R, t)`: `[[R, [t]× R], [0, R]]`.
pub fn adjoint(pose: &Pose3D) -> Matrix6<f64> {
    let r = pose.rotation.to_rotation_matrix().into_inner();
    let t_x = skew(&pose.translation.vector);
    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    ad.fixed_view_mut::<3, 3>(0, 3).copy_from(&(t_x * r));
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
    ad
}

/// Small adjoint `ad(ξ) = [[ [φ]×, [ρ]× ], [0, [φ]×]]`.
pub fn small_adjoint(xi: &Twist) -> Matrix6<f64> {
    let phi_x = skew(&rotation_part(xi));
    let rho_x = skew(&translation_part(xi));
    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(&phi_x);
    ad.fixed_view_mut::<3, 3>(0, 3).copy_from(&rho_x);
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(&phi_x);
    ad
}

/// Second-order approximation of the inverse right Jacobian, `I + ½ ad(ξ)`.
#[inline]
pub fn right_jacobian_inverse(xi: &Twist) -> Matrix6<f64> {
    Matrix6::identity() + small_adjoint(xi) * 0.5
}

/// Pure rotation about +Z.
#[inline]
pub fn from_yaw(yaw: f64) -> Pose3D {
    Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
    )
}

/// Homogeneous 4×4 representation.
#[inline]
pub fn to_matrix(pose: &Pose3D) -> Matrix4<f64> {
    pose.to_homogeneous()
}

/// Convert a homogeneous 4×4 matrix into a pose.
///
/// The rotation block is re-orthonormalized; matrices that are not close to
/// a proper rigid transform are rejected with [`Error::InvalidInput`].
pub fn from_matrix(m: &Matrix4<f64>) -> Result<Pose3D> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("transform contains non-finite values".into()));
    }

    let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)]];
    if bottom[0].abs() > RIGID_TOLERANCE
        || bottom[1].abs() > RIGID_TOLERANCE
        || bottom[2].abs() > RIGID_TOLERANCE
        || (bottom[3] - 1.0).abs() > RIGID_TOLERANCE
    {
        return Err(Error::InvalidInput(format!(
            "bottom row {:?} is not [0, 0, 0, 1]",
            bottom
        )));
    }

    let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let orthogonality = (r.transpose() * r - Matrix3::identity()).norm();
    if orthogonality > RIGID_TOLERANCE || r.determinant() <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "rotation block is not a proper rotation (orthogonality error {:.3e})",
            orthogonality
        )));
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&r));
    let translation = Translation3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    Ok(Isometry3::from_parts(translation, rotation))
}

/// Build a pose from a translation and an `(qx, qy, qz, qw)` quaternion.
///
/// The quaternion is normalized; a zero or non-finite quaternion is rejected.
pub fn from_translation_quaternion(t: [f64; 3], q: [f64; 4]) -> Result<Pose3D> {
    let quat = Quaternion::new(q[3], q[0], q[1], q[2]);
    let norm = quat.norm();
    if !norm.is_finite() || norm < 1e-12 || t.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "invalid translation/quaternion {:?} {:?}",
            t, q
        )));
    }
    Ok(Isometry3::from_parts(
        Translation3::new(t[0], t[1], t[2]),
        UnitQuaternion::from_quaternion(quat),
    ))
}

/// Translation and `(qx, qy, qz, qw)` quaternion of a pose.
pub fn to_translation_quaternion(pose: &Pose3D) -> ([f64; 3], [f64; 4]) {
    let t = pose.translation.vector;
    let q = pose.rotation;
    ([t[0], t[1], t[2]], [q.i, q.j, q.k, q.w])
}

/// Translational and rotational distance between two poses.
pub fn pose_distance(a: &Pose3D, b: &Pose3D) -> (f64, f64) {
    let delta = a.inverse() * b;
    (delta.translation.vector.norm(), delta.rotation.angle())
}
