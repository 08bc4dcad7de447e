// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the polyhedral friction cone generator.
use std::f64::consts::PI;

use crate::exception::TasksException;
use crate::utils::Frame3;
use crate::TasksResult;
use nalgebra::{Rotation3, Unit, Vector3};
use serde::Deserialize;
use serde::Serialize;

/// Winding direction of the generators around the cone normal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConeDirection {
    Positive,
    Negative,
}

impl ConeDirection {
    pub fn sign(&self) -> f64 {
        match self {
            ConeDirection::Positive => 1.,
            ConeDirection::Negative => -1.,
        }
    }
}

impl Default for ConeDirection {
    fn default() -> Self {
        ConeDirection::Positive
    }
}

/// Inner polyhedral approximation of a Coulomb friction cone.
///
/// The generators are the edges of a regular pyramid inscribed in the cone of half-angle
/// `atan(mu)`. Any non-negative combination of them is an admissible contact force.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrictionCone {
    /// unit force directions
    pub generators: Vec<Vector3<f64>>,
}

impl FrictionCone {
    /// Creates a cone with a positive winding direction.
    ///
    /// # Arguments
    /// * `frame` - rows are `(tangent1, tangent2, normal)`.
    /// * `nr_gen` - number of generators, must be at least 1.
    /// * `mu` - friction coefficient, must be finite and positive or zero.
    /// # Errors
    /// * InvalidFrictionCone if `nr_gen` or `mu` is invalid.
    pub fn new(frame: &Frame3, nr_gen: usize, mu: f64) -> TasksResult<Self> {
        FrictionCone::with_direction(frame, nr_gen, mu, ConeDirection::Positive)
    }

    /// Creates a cone.
    ///
    /// The seed generator is the normal rotated by `atan(mu)` about `direction * tangent1`.
    /// Generator `i` is the seed rotated by `direction * i * 2 pi / nr_gen` about the normal.
    /// # Errors
    /// * InvalidFrictionCone if `nr_gen` or `mu` is invalid.
    pub fn with_direction(
        frame: &Frame3,
        nr_gen: usize,
        mu: f64,
        direction: ConeDirection,
    ) -> TasksResult<Self> {
        if nr_gen < 1 {
            return Err(TasksException::InvalidFrictionCone {
                message: "at least one generator is needed".to_string(),
            });
        }
        if !mu.is_finite() || mu < 0. {
            return Err(TasksException::InvalidFrictionCone {
                message: format!("friction coefficient must be positive or zero, got {}", mu),
            });
        }
        let dir = direction.sign();
        let normal: Vector3<f64> = frame.row(2).transpose();
        let tangent: Vector3<f64> = frame.row(0).transpose() * dir;
        let angle = mu.atan();

        let seed = Rotation3::from_axis_angle(&Unit::new_normalize(tangent), angle) * normal;
        let normal_axis = Unit::new_normalize(normal);
        let step = (PI * 2.) / nr_gen as f64;

        let generators = (0..nr_gen)
            .map(|i| Rotation3::from_axis_angle(&normal_axis, dir * step * i as f64) * seed)
            .collect();
        Ok(FrictionCone { generators })
    }

    /// number of generators
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Computes `sum_i lambda_i * generator_i` for the first `len()` coefficients.
    pub(crate) fn combine(&self, lambda: &[f64]) -> Vector3<f64> {
        self.generators
            .iter()
            .zip(lambda.iter())
            .fold(Vector3::zeros(), |force, (g, l)| force + g * *l)
    }
}
