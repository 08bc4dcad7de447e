// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the HighLevelTask and Task traits.
use crate::multibody::{MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use nalgebra::{DMatrix, DVector};

#[cfg(test)]
use mockall::automock;

/// A task space error evaluated against the current configuration of one or more robots.
///
/// After [`update`](`Self::update`) the task exposes
/// * [`eval`](`Self::eval`) - the error `e = current - target`,
/// * [`speed`](`Self::speed`) - its time derivative `J * qdot`,
/// * [`normal_acc`](`Self::normal_acc`) - the bias term `Jdot * qdot`,
/// * [`jac`](`Self::jac`) - the Jacobian `J`, `dim() x nr_dof` of the robot.
#[cfg_attr(test, automock)]
pub trait HighLevelTask {
    fn dim(&self) -> usize;
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData);
    fn jac(&self) -> &DMatrix<f64>;
    fn eval(&self) -> &DVector<f64>;
    fn speed(&self) -> &DVector<f64>;
    fn normal_acc(&self) -> &DVector<f64>;
}

/// A quadratic contribution `(Q, C)` to the shared QP.
///
/// The solver minimizes `1/2 x^T Q x - C^T x` summed over all tasks, where `Q` and `C` are
/// placed at the columns [`begin`](`Self::begin`) of the decision vector.
///
/// The references returned by [`q`](`Self::q`) and [`c`](`Self::c`) point to buffers owned by
/// the task. They are overwritten by the next call to [`update`](`Self::update`).
pub trait Task {
    fn weight(&self) -> f64;
    fn set_weight(&mut self, weight: f64);
    /// half-open column range `[lo, hi)` covered by `Q` and `C`
    fn begin(&self) -> (usize, usize);
    /// Recomputes offsets and buffer sizes.
    ///
    /// Has to be called after every change of the [`SolverData`] and before the next update.
    fn update_nr_vars(&mut self, robots: &[MultiBody], data: &SolverData);
    /// Recomputes `Q` and `C` from the current configuration.
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData);
    fn q(&self) -> &DMatrix<f64>;
    fn c(&self) -> &DVector<f64>;
}

impl<H: HighLevelTask + ?Sized> HighLevelTask for Box<H> {
    fn dim(&self) -> usize {
        (**self).dim()
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        (**self).update(robots, configs, data)
    }
    fn jac(&self) -> &DMatrix<f64> {
        (**self).jac()
    }
    fn eval(&self) -> &DVector<f64> {
        (**self).eval()
    }
    fn speed(&self) -> &DVector<f64> {
        (**self).speed()
    }
    fn normal_acc(&self) -> &DVector<f64> {
        (**self).normal_acc()
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn weight(&self) -> f64 {
        (**self).weight()
    }
    fn set_weight(&mut self, weight: f64) {
        (**self).set_weight(weight)
    }
    fn begin(&self) -> (usize, usize) {
        (**self).begin()
    }
    fn update_nr_vars(&mut self, robots: &[MultiBody], data: &SolverData) {
        (**self).update_nr_vars(robots, data)
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        (**self).update(robots, configs, data)
    }
    fn q(&self) -> &DMatrix<f64> {
        (**self).q()
    }
    fn c(&self) -> &DVector<f64> {
        (**self).c()
    }
}
