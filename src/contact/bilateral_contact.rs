// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the BilateralContact type.
use crate::contact::contact_id::ContactId;
use crate::contact::friction_cone::{ConeDirection, FrictionCone};
use crate::contact::unilateral_contact::UnilateralContact;
use crate::contact::{check_cone, check_lambda, check_points, check_range, fill_generators};
use crate::exception::TasksException;
use crate::utils::Frame3;
use crate::TasksResult;
use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector3};

/// Contact with one contact frame and friction cone per point.
///
/// The geometry is fixed at construction. If the contact changes it has to be replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct BilateralContact {
    contact_id: ContactId,
    r1_points: Vec<Vector3<f64>>,
    r2_points: Vec<Vector3<f64>>,
    r1_cones: Vec<FrictionCone>,
    r2_cones: Vec<FrictionCone>,
    x_b1_b2: Isometry3<f64>,
    x_b1_s1: Isometry3<f64>,
}

impl BilateralContact {
    /// Creates a new contact.
    /// # Arguments
    /// * `contact_id` - identity of the contact.
    /// * `r1_points` - contact points in body 1 coordinates.
    /// * `r1_frames` - one contact frame per point, rows are `(tangent1, tangent2, normal)`.
    /// * `x_b1_b2` - pose of body 2 in body 1.
    /// * `nr_gen` - number of generators of each friction cone.
    /// * `mu` - friction coefficient.
    /// * `x_b1_s1` - pose of the controlled surface in body 1. Defaults to identity.
    /// # Errors
    /// * InvalidContact if no point is given or the number of frames differs.
    /// * InvalidFrictionCone if `nr_gen` or `mu` is invalid.
    pub fn new<X: Into<Option<Isometry3<f64>>>>(
        contact_id: ContactId,
        r1_points: Vec<Vector3<f64>>,
        r1_frames: &[Frame3],
        x_b1_b2: Isometry3<f64>,
        nr_gen: usize,
        mu: f64,
        x_b1_s1: X,
    ) -> TasksResult<Self> {
        check_points(&r1_points)?;
        if r1_frames.len() != r1_points.len() {
            return Err(TasksException::InvalidContact {
                message: format!(
                    "{} frames given for {} points",
                    r1_frames.len(),
                    r1_points.len()
                ),
            });
        }

        let r_b1_b2 = *x_b1_b2.rotation.to_rotation_matrix().matrix();
        let mut r2_points = Vec::with_capacity(r1_points.len());
        let mut r1_cones = Vec::with_capacity(r1_points.len());
        let mut r2_cones = Vec::with_capacity(r1_points.len());
        for (point, frame) in r1_points.iter().zip(r1_frames.iter()) {
            r2_points.push(x_b1_b2.inverse_transform_point(&Point3::from(*point)).coords);
            r1_cones.push(FrictionCone::new(frame, nr_gen, mu)?);
            // rows of the frame expressed in body 2 coordinates, the force on body 2 is opposed
            let r2_frame: Frame3 = frame * r_b1_b2;
            r2_cones.push(FrictionCone::with_direction(
                &(-r2_frame),
                nr_gen,
                mu,
                ConeDirection::Negative,
            )?);
        }

        Ok(BilateralContact {
            contact_id,
            r1_points,
            r2_points,
            r1_cones,
            r2_cones,
            x_b1_b2,
            x_b1_s1: x_b1_s1.into().unwrap_or_else(Isometry3::identity),
        })
    }

    pub fn contact_id(&self) -> ContactId {
        self.contact_id
    }
    /// contact points in body 1 coordinates
    pub fn r1_points(&self) -> &[Vector3<f64>] {
        &self.r1_points
    }
    /// contact points in body 2 coordinates
    pub fn r2_points(&self) -> &[Vector3<f64>] {
        &self.r2_points
    }
    /// cones of the force applied on body 1, one per point
    pub fn r1_cones(&self) -> &[FrictionCone] {
        &self.r1_cones
    }
    /// cones of the force applied on body 2, one per point
    pub fn r2_cones(&self) -> &[FrictionCone] {
        &self.r2_cones
    }
    pub fn x_b1_b2(&self) -> &Isometry3<f64> {
        &self.x_b1_b2
    }
    pub fn x_b1_s1(&self) -> &Isometry3<f64> {
        &self.x_b1_s1
    }

    /// Force at one point: `sum_i lambda_i * cones[point].generator_i`.
    /// # Panics
    /// If `point` is not a contact point or `lambda` is too short.
    pub fn force_at(&self, lambda: &DVector<f64>, point: usize, cones: &[FrictionCone]) -> Vector3<f64> {
        let cone = &cones[point];
        cone.combine(&lambda.as_slice()[..cone.len()])
    }

    /// Net force of all points.
    /// # Panics
    /// If `lambda` has less than [`nr_lambda`](`Self::nr_lambda`) entries.
    pub fn force(&self, lambda: &DVector<f64>, cones: &[FrictionCone]) -> Vector3<f64> {
        let mut pos = 0;
        let mut force = Vector3::zeros();
        for i in 0..self.r1_points.len() {
            let n = self.nr_lambda_at(i);
            force += cones[i].combine(&lambda.as_slice()[pos..pos + n]);
            pos += n;
        }
        force
    }

    /// number of force coefficients of one point
    /// # Panics
    /// If `point` is not a contact point.
    pub fn nr_lambda_at(&self, point: usize) -> usize {
        self.r1_cones[point].len()
    }

    /// number of force coefficients of the contact
    pub fn nr_lambda(&self) -> usize {
        (0..self.r1_points.len()).map(|i| self.nr_lambda_at(i)).sum()
    }

    /// Checked version of [`force_at`](`Self::force_at`).
    /// # Errors
    /// * PointIndexError if `point` is not a contact point or `cones` has no cone for it.
    /// * LambdaSizeError if `lambda` or the cone of `point` does not have
    /// `nr_lambda_at(point)` entries.
    pub fn s_force_at(
        &self,
        lambda: &DVector<f64>,
        point: usize,
        cones: &[FrictionCone],
    ) -> TasksResult<Vector3<f64>> {
        check_range(point, &self.r1_points)?;
        let expected = self.nr_lambda_at(point);
        check_lambda(expected, lambda.len())?;
        check_cone(point, cones, expected)?;
        Ok(self.force_at(lambda, point, cones))
    }

    /// Checked version of [`force`](`Self::force`).
    /// # Errors
    /// * LambdaSizeError if `lambda` does not have `nr_lambda()` entries or a cone does not
    /// have `nr_lambda_at(point)` generators.
    /// * PointIndexError if `cones` has less cones than points.
    pub fn s_force(&self, lambda: &DVector<f64>, cones: &[FrictionCone]) -> TasksResult<Vector3<f64>> {
        check_lambda(self.nr_lambda(), lambda.len())?;
        for point in 0..self.r1_points.len() {
            check_cone(point, cones, self.nr_lambda_at(point))?;
        }
        Ok(self.force(lambda, cones))
    }

    /// Checked version of [`nr_lambda_at`](`Self::nr_lambda_at`).
    /// # Errors
    /// * PointIndexError if `point` is not a contact point.
    pub fn s_nr_lambda_at(&self, point: usize) -> TasksResult<usize> {
        check_range(point, &self.r1_points)?;
        Ok(self.nr_lambda_at(point))
    }

    /// 3 x nr_lambda matrix whose columns are the generators of every point.
    pub fn generators_jacobian(&self, cones: &[FrictionCone]) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(3, self.nr_lambda());
        let mut pos = 0;
        for (i, cone) in cones.iter().enumerate().take(self.r1_points.len()) {
            fill_generators(&mut jac, pos, cone);
            pos += self.nr_lambda_at(i);
        }
        jac
    }
}

impl From<&UnilateralContact> for BilateralContact {
    /// Replicates the single cone of the unilateral contact on every point.
    fn from(c: &UnilateralContact) -> Self {
        let nr_points = c.r1_points().len();
        BilateralContact {
            contact_id: c.contact_id(),
            r1_points: c.r1_points().to_vec(),
            r2_points: c.r2_points().to_vec(),
            r1_cones: vec![c.r1_cone().clone(); nr_points],
            r2_cones: vec![c.r2_cone().clone(); nr_points],
            x_b1_b2: *c.x_b1_b2(),
            x_b1_s1: *c.x_b1_s1(),
        }
    }
}

impl From<UnilateralContact> for BilateralContact {
    fn from(c: UnilateralContact) -> Self {
        BilateralContact::from(&c)
    }
}
