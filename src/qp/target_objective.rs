// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the TargetObjectiveTask.
use crate::exception::{check_dimension, TasksException};
use crate::multibody::{MultiBody, MultiBodyConfig};
use crate::qp::set_point::SetPointTaskCommon;
use crate::qp::solver_data::SolverData;
use crate::qp::task::{HighLevelTask, Task};
use crate::TasksResult;
use nalgebra::{DMatrix, DVector};

/// Brings the task error to zero with the task velocity `objDot` in a fixed amount of time.
///
/// The remaining time `duration` is divided into `nr_iter = ceil(duration / time_step)` ticks.
/// At tick `k` a cubic interpolation between the current state and the objective gives the
/// desired acceleration
/// ```text
/// a_des = -phi[k] * e - psi[k] * (2 * de + objDot)
/// ```
/// with `phi[k] = 6 / T_k^2`, `psi[k] = 2 / T_k` and `T_k = (nr_iter - k) * time_step`.
/// Once the last tick is reached the task keeps using the last coefficients.
pub struct TargetObjectiveTask<H: HighLevelTask> {
    common: SetPointTaskCommon<H>,
    time_step: f64,
    duration: f64,
    iter: usize,
    nr_iter: usize,
    obj_dot: DVector<f64>,
    phi: DVector<f64>,
    psi: DVector<f64>,
}

impl<H: HighLevelTask> TargetObjectiveTask<H> {
    /// # Arguments
    /// * `time_step` - duration of a control tick in seconds.
    /// * `duration` - time to reach the objective in seconds.
    /// * `obj_dot` - task velocity at the end of the motion.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if `obj_dot` does not have the task dimension.
    /// * InvalidParameter if `time_step` is not positive, `duration` is negative, one of them is
    /// not finite or the motion needs more than [`MAX_NR_ITER`] ticks.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        time_step: f64,
        duration: f64,
        obj_dot: DVector<f64>,
        weight: f64,
    ) -> TasksResult<Self> {
        Self::build(robots, robot_index, hl_task, time_step, duration, obj_dot, None, weight)
    }

    /// Same as [`new`](`Self::new`) with weights per task dimension.
    /// # Errors
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    /// * all errors of [`new`](`Self::new`).
    #[allow(clippy::too_many_arguments)]
    pub fn with_dim_weight(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        time_step: f64,
        duration: f64,
        obj_dot: DVector<f64>,
        dim_weight: DVector<f64>,
        weight: f64,
    ) -> TasksResult<Self> {
        Self::build(
            robots,
            robot_index,
            hl_task,
            time_step,
            duration,
            obj_dot,
            Some(dim_weight),
            weight,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        time_step: f64,
        duration: f64,
        obj_dot: DVector<f64>,
        dim_weight: Option<DVector<f64>>,
        weight: f64,
    ) -> TasksResult<Self> {
        if !(time_step.is_finite() && time_step > 0.) {
            return Err(TasksException::InvalidParameter {
                name: "time_step",
                message: format!("must be finite and positive, got {}", time_step),
            });
        }
        let nr_iter = nr_iterations(duration, time_step)?;
        check_dimension("objDot", hl_task.dim(), obj_dot.len())?;
        let mut task = TargetObjectiveTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, dim_weight, weight)?,
            time_step,
            duration,
            iter: 0,
            nr_iter,
            obj_dot,
            phi: DVector::zeros(0),
            psi: DVector::zeros(0),
        };
        task.compute_tables();
        Ok(task)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
    /// Sets a new duration and recomputes the interpolation tables.
    ///
    /// The tick counter is not reset.
    /// # Errors
    /// * InvalidParameter if `duration` is negative, not finite or needs more than
    /// [`MAX_NR_ITER`] ticks.
    pub fn set_duration(&mut self, duration: f64) -> TasksResult<()> {
        self.nr_iter = nr_iterations(duration, self.time_step)?;
        self.duration = duration;
        self.compute_tables();
        Ok(())
    }
    pub fn iter(&self) -> usize {
        self.iter
    }
    pub fn set_iter(&mut self, iter: usize) {
        self.iter = iter;
    }
    pub fn nr_iter(&self) -> usize {
        self.nr_iter
    }
    pub fn obj_dot(&self) -> &DVector<f64> {
        &self.obj_dot
    }
    /// # Errors
    /// * DimensionMismatch if `obj_dot` does not have the task dimension.
    pub fn set_obj_dot(&mut self, obj_dot: DVector<f64>) -> TasksResult<()> {
        check_dimension("objDot", self.obj_dot.len(), obj_dot.len())?;
        self.obj_dot = obj_dot;
        Ok(())
    }
    pub fn phi(&self) -> &DVector<f64> {
        &self.phi
    }
    pub fn psi(&self) -> &DVector<f64> {
        &self.psi
    }
    pub fn dim_weight(&self) -> &DVector<f64> {
        self.common.dim_weight()
    }
    /// # Errors
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    pub fn set_dim_weight(&mut self, dim_weight: DVector<f64>) -> TasksResult<()> {
        self.common.set_dim_weight(dim_weight)
    }
    pub fn hl_task(&self) -> &H {
        self.common.hl_task()
    }
    pub fn hl_task_mut(&mut self) -> &mut H {
        self.common.hl_task_mut()
    }

    fn compute_tables(&mut self) {
        let (nr_iter, dt) = (self.nr_iter, self.time_step);
        self.phi = DVector::from_fn(nr_iter, |k, _| {
            let t = (nr_iter - k) as f64 * dt;
            6. / (t * t)
        });
        self.psi = DVector::from_fn(nr_iter, |k, _| 2. / ((nr_iter - k) as f64 * dt));
    }

    fn compute_desired_acc(&mut self) {
        let k = self.iter.min(self.nr_iter - 1);
        let (phi, psi) = (self.phi[k], self.psi[k]);
        let hl = &self.common.hl_task;
        let acc = &mut self.common.acc;
        acc.copy_from(&self.obj_dot);
        acc.axpy(2., hl.speed(), 1.);
        *acc *= -psi;
        acc.axpy(-phi, hl.eval(), 1.);
    }
}

/// Upper bound of the number of ticks of a [`TargetObjectiveTask`] motion.
pub const MAX_NR_ITER: usize = 1_000_000;

/// Number of ticks needed to cover `duration`.
///
/// At least one tick, a zero duration asks for the objective at the next tick.
fn nr_iterations(duration: f64, time_step: f64) -> TasksResult<usize> {
    if !(duration.is_finite() && duration >= 0.) {
        return Err(TasksException::InvalidParameter {
            name: "duration",
            message: format!("must be finite and not negative, got {}", duration),
        });
    }
    let ticks = (duration / time_step).ceil();
    if !(ticks <= MAX_NR_ITER as f64) {
        return Err(TasksException::InvalidParameter {
            name: "duration",
            message: format!(
                "{} s with a time step of {} s needs more than {} ticks",
                duration, time_step, MAX_NR_ITER
            ),
        });
    }
    Ok((ticks as usize).max(1))
}

impl<H: HighLevelTask> Task for TargetObjectiveTask<H> {
    fn weight(&self) -> f64 {
        self.common.weight()
    }
    fn set_weight(&mut self, weight: f64) {
        self.common.set_weight(weight)
    }
    fn begin(&self) -> (usize, usize) {
        self.common.begin()
    }
    fn update_nr_vars(&mut self, _robots: &[MultiBody], data: &SolverData) {
        self.common.update_nr_vars(data);
        self.compute_tables();
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        self.common.update_hl(robots, configs, data);
        self.compute_desired_acc();
        self.common.compute_qc();
        self.iter += 1;
    }
    fn q(&self) -> &DMatrix<f64> {
        self.common.q()
    }
    fn c(&self) -> &DVector<f64> {
        self.common.c()
    }
}
