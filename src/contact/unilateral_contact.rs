// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the UnilateralContact type.
use crate::contact::contact_id::ContactId;
use crate::contact::friction_cone::{ConeDirection, FrictionCone};
use crate::contact::{check_cone, check_lambda, check_points, check_range, fill_generators};
use crate::utils::Frame3;
use crate::TasksResult;
use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector3};
use std::slice;

/// Contact whose points share a single contact frame and friction cone.
///
/// The geometry is fixed at construction. If the contact changes it has to be replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct UnilateralContact {
    contact_id: ContactId,
    r1_points: Vec<Vector3<f64>>,
    r2_points: Vec<Vector3<f64>>,
    r1_cone: FrictionCone,
    r2_cone: FrictionCone,
    x_b1_b2: Isometry3<f64>,
    x_b1_s1: Isometry3<f64>,
}

impl UnilateralContact {
    /// Creates a new contact.
    /// # Arguments
    /// * `contact_id` - identity of the contact.
    /// * `r1_points` - contact points in body 1 coordinates.
    /// * `r1_frame` - contact frame in body 1 coordinates, rows are `(tangent1, tangent2, normal)`.
    /// * `x_b1_b2` - pose of body 2 in body 1.
    /// * `nr_gen` - number of generators of the friction cone.
    /// * `mu` - friction coefficient.
    /// * `x_b1_s1` - pose of the controlled surface in body 1. Defaults to identity.
    /// # Errors
    /// * InvalidFrictionCone if `nr_gen` or `mu` is invalid.
    /// * InvalidContact if no point is given.
    pub fn new<X: Into<Option<Isometry3<f64>>>>(
        contact_id: ContactId,
        r1_points: Vec<Vector3<f64>>,
        r1_frame: &Frame3,
        x_b1_b2: Isometry3<f64>,
        nr_gen: usize,
        mu: f64,
        x_b1_s1: X,
    ) -> TasksResult<Self> {
        check_points(&r1_points)?;
        let r1_cone = FrictionCone::new(r1_frame, nr_gen, mu)?;

        let r2_points = r1_points
            .iter()
            .map(|p| x_b1_b2.inverse_transform_point(&Point3::from(*p)).coords)
            .collect();

        // rows of the frame expressed in body 2 coordinates
        let r2_frame: Frame3 = r1_frame * x_b1_b2.rotation.to_rotation_matrix().matrix();
        // the force on body 2 is opposed
        let r2_cone =
            FrictionCone::with_direction(&(-r2_frame), nr_gen, mu, ConeDirection::Negative)?;

        Ok(UnilateralContact {
            contact_id,
            r1_points,
            r2_points,
            r1_cone,
            r2_cone,
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
    /// cone of the force applied on body 1, body 1 coordinates
    pub fn r1_cone(&self) -> &FrictionCone {
        &self.r1_cone
    }
    /// cone of the force applied on body 2, body 2 coordinates
    pub fn r2_cone(&self) -> &FrictionCone {
        &self.r2_cone
    }
    pub fn x_b1_b2(&self) -> &Isometry3<f64> {
        &self.x_b1_b2
    }
    pub fn x_b1_s1(&self) -> &Isometry3<f64> {
        &self.x_b1_s1
    }

    /// Force at one point: `sum_i lambda_i * generator_i`.
    /// # Panics
    /// If `lambda` has less than [`nr_lambda_at(point)`](`Self::nr_lambda_at`) entries.
    pub fn force_at(&self, lambda: &DVector<f64>, _point: usize, cone: &FrictionCone) -> Vector3<f64> {
        cone.combine(&lambda.as_slice()[..cone.len()])
    }

    /// Net force of all points.
    /// # Panics
    /// If `lambda` has less than [`nr_lambda`](`Self::nr_lambda`) entries.
    pub fn force(&self, lambda: &DVector<f64>, cone: &FrictionCone) -> Vector3<f64> {
        let mut pos = 0;
        let mut force = Vector3::zeros();
        for i in 0..self.r1_points.len() {
            let n = self.nr_lambda_at(i);
            force += cone.combine(&lambda.as_slice()[pos..pos + n]);
            pos += n;
        }
        force
    }

    /// number of force coefficients of one point
    pub fn nr_lambda_at(&self, _point: usize) -> usize {
        self.r1_cone.len()
    }

    /// number of force coefficients of the contact
    pub fn nr_lambda(&self) -> usize {
        (0..self.r1_points.len()).map(|i| self.nr_lambda_at(i)).sum()
    }

    /// Checked version of [`force_at`](`Self::force_at`).
    /// # Errors
    /// * PointIndexError if `point` is not a contact point.
    /// * LambdaSizeError if `lambda` or `cone` does not have `nr_lambda_at(point)` entries.
    pub fn s_force_at(
        &self,
        lambda: &DVector<f64>,
        point: usize,
        cone: &FrictionCone,
    ) -> TasksResult<Vector3<f64>> {
        check_range(point, &self.r1_points)?;
        let expected = self.nr_lambda_at(point);
        check_lambda(expected, lambda.len())?;
        check_cone(0, slice::from_ref(cone), expected)?;
        Ok(self.force_at(lambda, point, cone))
    }

    /// Checked version of [`force`](`Self::force`).
    /// # Errors
    /// * LambdaSizeError if `lambda` does not have `nr_lambda()` entries or `cone` does not
    /// have the generators of the contact cone.
    pub fn s_force(&self, lambda: &DVector<f64>, cone: &FrictionCone) -> TasksResult<Vector3<f64>> {
        check_lambda(self.nr_lambda(), lambda.len())?;
        check_cone(0, slice::from_ref(cone), self.r1_cone.len())?;
        Ok(self.force(lambda, cone))
    }

    /// Checked version of [`nr_lambda_at`](`Self::nr_lambda_at`).
    /// # Errors
    /// * PointIndexError if `point` is not a contact point.
    pub fn s_nr_lambda_at(&self, point: usize) -> TasksResult<usize> {
        check_range(point, &self.r1_points)?;
        Ok(self.nr_lambda_at(point))
    }

    /// 3 x nr_lambda matrix whose columns are the generators of every point.
    ///
    /// Multiplied by the force coefficients it gives the net force.
    pub fn generators_jacobian(&self, cone: &FrictionCone) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(3, self.nr_lambda());
        let mut pos = 0;
        for i in 0..self.r1_points.len() {
            fill_generators(&mut jac, pos, cone);
            pos += self.nr_lambda_at(i);
        }
        jac
    }
}

#[cfg(test)]
mod tests {
    use crate::contact::contact_id::ContactId;
    use crate::contact::friction_cone::FrictionCone;
    use crate::contact::unilateral_contact::UnilateralContact;
    use crate::exception::TasksException;
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

    fn square_contact(x_b1_b2: Isometry3<f64>) -> UnilateralContact {
        UnilateralContact::new(
            ContactId::new(0, 1, 3, 0, 0),
            vec![
                Vector3::new(0.1, 0.05, 0.),
                Vector3::new(-0.1, 0.05, 0.),
                Vector3::new(-0.1, -0.05, 0.),
                Vector3::new(0.1, -0.05, 0.),
            ],
            &Matrix3::identity(),
            x_b1_b2,
            4,
            0.7,
            None,
        )
        .unwrap()
    }

    fn transform() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(0.2, -0.4, 1.),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        )
    }

    #[test]
    fn single_point_identity() {
        let c = UnilateralContact::new(
            ContactId::new(0, 1, 0, 0, 0),
            vec![Vector3::zeros()],
            &Matrix3::identity(),
            Isometry3::identity(),
            4,
            1.,
            None,
        )
        .unwrap();
        assert_eq!(c.r2_points(), c.r1_points());
        assert_eq!(c.r2_cone().len(), 4);
        for (g1, g2) in c.r1_cone().generators.iter().zip(c.r2_cone().generators.iter()) {
            assert_relative_eq!(*g2, -g1, epsilon = 1e-12);
        }
        assert_eq!(*c.x_b1_s1(), Isometry3::identity());
    }

    #[test]
    fn action_reaction() {
        let x_b1_b2 = transform();
        let c = square_contact(x_b1_b2);
        let rot = x_b1_b2.rotation;
        for (g1, g2) in c.r1_cone().generators.iter().zip(c.r2_cone().generators.iter()) {
            // body 2 generator mapped back into body 1 coordinates
            assert_relative_eq!(rot * g2, -g1, epsilon = 1e-12);
        }
        for (p1, p2) in c.r1_points().iter().zip(c.r2_points().iter()) {
            assert_relative_eq!(
                (x_b1_b2 * nalgebra::Point3::from(*p2)).coords,
                *p1,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn lambda_count() {
        let c = square_contact(Isometry3::identity());
        assert_eq!(c.nr_lambda(), 16);
        assert_eq!(c.nr_lambda_at(2), 4);
        assert_eq!(c.s_nr_lambda_at(3), Ok(4));
        assert_eq!(
            c.s_nr_lambda_at(4),
            Err(TasksException::PointIndexError { index: 4, len: 4 })
        );
    }

    #[test]
    fn force_reconstruction() {
        let c = square_contact(transform());
        let lambda = DVector::from_fn(16, |i, _| 0.1 * i as f64);
        let expected = (0..16).fold(Vector3::zeros(), |f, i| {
            f + c.r1_cone().generators[i % 4] * lambda[i]
        });
        assert_relative_eq!(c.force(&lambda, c.r1_cone()), expected, epsilon = 1e-12);
        assert_eq!(c.s_force(&lambda, c.r1_cone()), Ok(c.force(&lambda, c.r1_cone())));
        assert_relative_eq!(
            c.generators_jacobian(c.r1_cone()) * lambda.clone(),
            DVector::from_column_slice(expected.as_slice()),
            epsilon = 1e-12
        );
        // the reaction cancels the action
        let f2 = c.x_b1_b2().rotation * c.force(&lambda, c.r2_cone());
        assert_relative_eq!(f2, -expected, epsilon = 1e-12);
    }

    #[test]
    fn checked_force() {
        let c = square_contact(Isometry3::identity());
        let lambda = DVector::from_element(4, 1.);
        assert_eq!(
            c.s_force_at(&lambda, 1, c.r1_cone()),
            Ok(c.force_at(&lambda, 1, c.r1_cone()))
        );
        assert_eq!(
            c.s_force_at(&lambda, 7, c.r1_cone()),
            Err(TasksException::PointIndexError { index: 7, len: 4 })
        );
        assert_eq!(
            c.s_force_at(&DVector::from_element(3, 1.), 0, c.r1_cone()),
            Err(TasksException::LambdaSizeError {
                expected: 4,
                given: 3
            })
        );
        assert_eq!(
            c.s_force(&lambda, c.r1_cone()),
            Err(TasksException::LambdaSizeError {
                expected: 16,
                given: 4
            })
        );
    }

    #[test]
    fn checked_force_rejects_foreign_cone() {
        let c = square_contact(Isometry3::identity());
        let wide = FrictionCone::new(&Matrix3::identity(), 8, 0.7).unwrap();
        assert_eq!(
            c.s_force_at(&DVector::from_element(4, 1.), 0, &wide),
            Err(TasksException::LambdaSizeError {
                expected: 4,
                given: 8
            })
        );
        assert_eq!(
            c.s_force(&DVector::from_element(16, 1.), &wide),
            Err(TasksException::LambdaSizeError {
                expected: 4,
                given: 8
            })
        );
    }

    #[test]
    fn empty_contact() {
        let result = UnilateralContact::new(
            ContactId::default(),
            vec![],
            &Matrix3::identity(),
            Isometry3::identity(),
            4,
            1.,
            None,
        );
        assert!(matches!(result, Err(TasksException::InvalidContact { .. })));
    }
}
