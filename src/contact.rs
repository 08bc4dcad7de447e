// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the contact geometry: friction cones, contact identities and contact models.
//!
//! A contact is always described from the point of view of body 1. The points and cones of
//! body 2 are derived from the transform `x_b1_b2` so that both sides model the same physical
//! force pair: the force applied on body 2 is the opposite of the force applied on body 1.
pub mod bilateral_contact;
pub mod contact_id;
pub mod friction_cone;
pub mod unilateral_contact;

use crate::exception::TasksException;
use crate::TasksResult;
use nalgebra::{DMatrix, Vector3};

use self::friction_cone::FrictionCone;

/// Returns an error if `point` is not a valid index of `points`.
pub(crate) fn check_range(point: usize, points: &[Vector3<f64>]) -> TasksResult<()> {
    if point >= points.len() {
        return Err(TasksException::PointIndexError {
            index: point,
            len: points.len(),
        });
    }
    Ok(())
}

/// Returns an error if `given` coefficients are supplied for `expected` generators.
pub(crate) fn check_lambda(expected: usize, given: usize) -> TasksResult<()> {
    if expected != given {
        return Err(TasksException::LambdaSizeError { expected, given });
    }
    Ok(())
}

/// Returns an error if `cones` has no cone for `point` or if that cone does not have
/// `expected` generators.
pub(crate) fn check_cone(point: usize, cones: &[FrictionCone], expected: usize) -> TasksResult<()> {
    let cone = cones.get(point).ok_or(TasksException::PointIndexError {
        index: point,
        len: cones.len(),
    })?;
    check_lambda(expected, cone.len())
}

/// Returns an error if a contact has no points.
pub(crate) fn check_points(points: &[Vector3<f64>]) -> TasksResult<()> {
    if points.is_empty() {
        return Err(TasksException::InvalidContact {
            message: "a contact needs at least one point".to_string(),
        });
    }
    Ok(())
}

/// Writes the generators of `cone` as columns of `jac` starting at column `begin`.
pub(crate) fn fill_generators(jac: &mut DMatrix<f64>, begin: usize, cone: &FrictionCone) {
    for (i, generator) in cone.generators.iter().enumerate() {
        jac.fixed_view_mut::<3, 1>(0, begin + i).copy_from(generator);
    }
}
