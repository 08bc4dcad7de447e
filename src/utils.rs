// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and spatial algebra helpers.
//!
//! Spatial vectors are stored as `[angular; linear]`. Body Jacobians supplied through
//! [`MultiBodyConfig`](`crate::multibody::MultiBodyConfig`) follow the same row order.
use nalgebra::storage::StorageMut;
use nalgebra::{DMatrix, Dyn, Matrix, Matrix3, Rotation3, Unit, Vector3, Vector6};

/// Contact frame: the rows are `(tangent1, tangent2, normal)` in body coordinates.
pub type Frame3 = Matrix3<f64>;

/// Returns the skew-symmetric matrix `[v]x` so that `[v]x * u = v.cross(u)`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0., -v.z, v.y, v.z, 0., -v.x, -v.y, v.x, 0.)
}

/// Angular part of a spatial vector.
pub fn angular(v: &Vector6<f64>) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

/// Linear part of a spatial vector.
pub fn linear(v: &Vector6<f64>) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// Rotation vector expressed in the world frame which rotates `target` onto `current`.
///
/// For small errors its time derivative is the angular velocity of `current`.
pub fn rotation_error(current: &Rotation3<f64>, target: &Rotation3<f64>) -> Vector3<f64> {
    (current * target.inverse()).scaled_axis()
}

/// Creates a right-handed contact frame with the given normal.
///
/// # Arguments
/// * `normal` - contact normal, does not need to be normalized.
/// # Return
/// Frame with the rows `(tangent1, tangent2, normal)`.
pub fn frame_from_normal(normal: &Vector3<f64>) -> Frame3 {
    let n = Unit::new_normalize(*normal).into_inner();
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = (helper - n * n.dot(&helper)).normalize();
    let t2 = n.cross(&t1);
    Matrix3::from_rows(&[t1.transpose(), t2.transpose(), n.transpose()])
}

/// Writes the 3xn linear Jacobian of a point rigidly attached to a body into `jac`.
///
/// # Arguments
/// * `body_jac` - 6xn world Jacobian of the body origin.
/// * `r` - offset from the body origin to the point in world coordinates.
/// * `jac` - 3xn output, typically a row block of a preallocated task Jacobian.
pub fn point_jacobian_to<S>(
    body_jac: &DMatrix<f64>,
    r: &Vector3<f64>,
    jac: &mut Matrix<f64, Dyn, Dyn, S>,
) where
    S: StorageMut<f64, Dyn, Dyn>,
{
    jac.copy_from(&body_jac.rows(3, 3));
    // v_p = v - [r]x w
    jac.gemm(-1., &skew(r), &body_jac.rows(0, 3), 1.);
}

/// Linear velocity of a point rigidly attached to a body.
pub fn point_velocity(body_vel: &Vector6<f64>, r: &Vector3<f64>) -> Vector3<f64> {
    linear(body_vel) + angular(body_vel).cross(r)
}

/// `Jdot * qdot` term of the linear acceleration of a point rigidly attached to a body.
///
/// # Arguments
/// * `body_normal_acc` - `Jdot * qdot` of the body origin.
/// * `body_vel` - spatial velocity of the body origin.
/// * `r` - offset from the body origin to the point in world coordinates.
pub fn point_normal_acc(
    body_normal_acc: &Vector6<f64>,
    body_vel: &Vector6<f64>,
    r: &Vector3<f64>,
) -> Vector3<f64> {
    let w = angular(body_vel);
    linear(body_normal_acc) + angular(body_normal_acc).cross(r) + w.cross(&w.cross(r))
}

/// Returns `2 * sqrt(stiffness)`, the damping of a critically damped second order system.
pub fn critical_damping(stiffness: f64) -> f64 {
    2. * stiffness.sqrt()
}

#[cfg(test)]
mod test {
    use crate::utils::{
        critical_damping, frame_from_normal, point_jacobian_to, point_normal_acc, point_velocity,
        rotation_error, skew,
    };
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector, Rotation3, Vector3, Vector6};

    #[test]
    fn skew_is_cross_product() {
        let a = Vector3::new(1., -2., 0.5);
        let b = Vector3::new(0.3, 4., -1.);
        assert_relative_eq!(skew(&a) * b, a.cross(&b), epsilon = 1e-12);
    }

    #[test]
    fn frame_is_right_handed() {
        for n in [
            Vector3::new(0., 0., 2.),
            Vector3::new(1., 0., 0.),
            Vector3::new(0.3, -0.5, 0.8),
        ]
        .iter()
        {
            let frame = frame_from_normal(n);
            assert_relative_eq!(frame.determinant(), 1., epsilon = 1e-12);
            assert_relative_eq!(
                frame.row(2).transpose(),
                n.normalize(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn small_rotation_error() {
        let target = Rotation3::identity();
        let current = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
        assert_relative_eq!(
            rotation_error(&current, &target),
            Vector3::new(0., 0., 0.1),
            epsilon = 1e-12
        );
    }

    #[test]
    fn point_kinematics_is_consistent() {
        let body_jac = DMatrix::from_fn(6, 4, |i, j| (i as f64 + 1.) * 0.1 - j as f64 * 0.2);
        let qdot = DVector::from_vec(vec![0.5, -1., 0.2, 0.7]);
        let vel = body_jac.clone() * qdot.clone();
        let body_vel = Vector6::from_column_slice(vel.as_slice());
        let r = Vector3::new(0.1, 0.2, -0.3);
        let mut jac = DMatrix::from_element(3, 4, f64::NAN);
        point_jacobian_to(&body_jac, &r, &mut jac);
        let v = jac * qdot;
        assert_relative_eq!(
            Vector3::new(v[0], v[1], v[2]),
            point_velocity(&body_vel, &r),
            epsilon = 1e-12
        );
        // pure rotation about z: centripetal acceleration points back to the axis
        let spin = Vector6::new(0., 0., 1., 0., 0., 0.);
        let acc = point_normal_acc(&Vector6::zeros(), &spin, &Vector3::new(1., 0., 0.));
        assert_relative_eq!(acc, Vector3::new(-1., 0., 0.), epsilon = 1e-12);
    }

    #[test]
    fn critical_damping_of_100() {
        assert_relative_eq!(critical_damping(100.), 20.);
    }
}
