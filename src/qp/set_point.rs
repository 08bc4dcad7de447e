// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the gain models which turn a [`HighLevelTask`] into a [`Task`].
//!
//! All tasks of this module share the same quadratic form
//! ```text
//! Q = w * J^T * diag(dimWeight) * J
//! C = w * J^T * diag(dimWeight) * (a_des - Jdot * qdot)
//! ```
//! and only differ in the way the desired task acceleration `a_des` is computed.
use crate::exception::check_dimension;
use crate::multibody::{check_robot_index, MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::{HighLevelTask, Task};
use crate::utils::critical_damping;
use crate::TasksResult;
use nalgebra::{DMatrix, DVector};

/// Shared part of every gain model: owns the high level task and the `Q`, `C` buffers.
pub struct SetPointTaskCommon<H: HighLevelTask> {
    pub(crate) hl_task: H,
    robot_index: usize,
    alpha_d_begin: usize,
    weight: f64,
    dim_weight: DVector<f64>,
    q: DMatrix<f64>,
    c: DVector<f64>,
    // cache
    weighted_jac: DMatrix<f64>,
    weighted_acc: DVector<f64>,
    pub(crate) acc: DVector<f64>,
}

impl<H: HighLevelTask> SetPointTaskCommon<H> {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        dim_weight: Option<DVector<f64>>,
        weight: f64,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let dim = hl_task.dim();
        let dim_weight = match dim_weight {
            Some(d) => {
                check_dimension("dimWeight", dim, d.len())?;
                d
            }
            None => DVector::from_element(dim, 1.),
        };
        let nr_dof = robots[robot_index].nr_dof();
        Ok(SetPointTaskCommon {
            hl_task,
            robot_index,
            alpha_d_begin: 0,
            weight,
            dim_weight,
            q: DMatrix::zeros(nr_dof, nr_dof),
            c: DVector::zeros(nr_dof),
            weighted_jac: DMatrix::zeros(dim, nr_dof),
            weighted_acc: DVector::zeros(dim),
            acc: DVector::zeros(dim),
        })
    }

    pub fn hl_task(&self) -> &H {
        &self.hl_task
    }
    pub fn hl_task_mut(&mut self) -> &mut H {
        &mut self.hl_task
    }
    pub fn robot_index(&self) -> usize {
        self.robot_index
    }
    pub fn dim_weight(&self) -> &DVector<f64> {
        &self.dim_weight
    }
    /// # Errors
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    pub fn set_dim_weight(&mut self, dim_weight: DVector<f64>) -> TasksResult<()> {
        check_dimension("dimWeight", self.hl_task.dim(), dim_weight.len())?;
        self.dim_weight = dim_weight;
        Ok(())
    }

    pub(crate) fn weight(&self) -> f64 {
        self.weight
    }
    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
    pub(crate) fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    pub(crate) fn c(&self) -> &DVector<f64> {
        &self.c
    }
    pub(crate) fn begin(&self) -> (usize, usize) {
        (self.alpha_d_begin, self.alpha_d_begin + self.q.ncols())
    }
    pub(crate) fn update_nr_vars(&mut self, data: &SolverData) {
        let nr_dof = data.alpha_d(self.robot_index);
        self.alpha_d_begin = data.alpha_d_begin(self.robot_index);
        if self.q.ncols() != nr_dof {
            self.q = DMatrix::zeros(nr_dof, nr_dof);
            self.c = DVector::zeros(nr_dof);
            self.weighted_jac = DMatrix::zeros(self.dim_weight.len(), nr_dof);
        }
    }
    pub(crate) fn update_hl(
        &mut self,
        robots: &[MultiBody],
        configs: &[MultiBodyConfig],
        data: &SolverData,
    ) {
        self.hl_task.update(robots, configs, data);
    }

    /// Computes `Q` and `C` from `self.acc` which holds `a_des` on entry.
    pub(crate) fn compute_qc(&mut self) {
        self.acc -= self.hl_task.normal_acc();
        let jac = self.hl_task.jac();
        self.weighted_jac.copy_from(jac);
        for (mut row, w) in self
            .weighted_jac
            .row_iter_mut()
            .zip(self.dim_weight.iter())
        {
            row *= *w;
        }
        self.weighted_acc.copy_from(&self.acc);
        self.weighted_acc.component_mul_assign(&self.dim_weight);

        self.q.gemm_tr(self.weight, jac, &self.weighted_jac, 0.);
        self.c.gemv_tr(self.weight, jac, &self.weighted_acc, 0.);
    }
}

macro_rules! impl_task_for_set_point {
    ($task:ident) => {
        impl<H: HighLevelTask> Task for $task<H> {
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
                self.common.update_nr_vars(data)
            }
            fn update(
                &mut self,
                robots: &[MultiBody],
                configs: &[MultiBodyConfig],
                data: &SolverData,
            ) {
                self.common.update_hl(robots, configs, data);
                self.compute_desired_acc();
                self.common.compute_qc();
            }
            fn q(&self) -> &DMatrix<f64> {
                &self.common.q
            }
            fn c(&self) -> &DVector<f64> {
                &self.common.c
            }
        }

        impl<H: HighLevelTask> $task<H> {
            pub fn common(&self) -> &SetPointTaskCommon<H> {
                &self.common
            }
            pub fn hl_task(&self) -> &H {
                &self.common.hl_task
            }
            pub fn hl_task_mut(&mut self) -> &mut H {
                &mut self.common.hl_task
            }
            pub fn dim_weight(&self) -> &DVector<f64> {
                self.common.dim_weight()
            }
            /// # Errors
            /// * DimensionMismatch if `dim_weight` does not have the task dimension.
            pub fn set_dim_weight(&mut self, dim_weight: DVector<f64>) -> TasksResult<()> {
                self.common.set_dim_weight(dim_weight)
            }
        }
    };
}

/// Critically damped set point: `a_des = -k * e - 2 sqrt(k) * de`.
pub struct SetPointTask<H: HighLevelTask> {
    common: SetPointTaskCommon<H>,
    stiffness: f64,
    damping: f64,
}

impl<H: HighLevelTask> SetPointTask<H> {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        stiffness: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        Ok(SetPointTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, None, weight)?,
            stiffness,
            damping: critical_damping(stiffness),
        })
    }

    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    pub fn with_dim_weight(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        stiffness: f64,
        dim_weight: DVector<f64>,
        weight: f64,
    ) -> TasksResult<Self> {
        Ok(SetPointTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, Some(dim_weight), weight)?,
            stiffness,
            damping: critical_damping(stiffness),
        })
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
    pub fn damping(&self) -> f64 {
        self.damping
    }
    /// Sets the stiffness and the critical damping `2 sqrt(stiffness)`.
    pub fn set_stiffness(&mut self, stiffness: f64) {
        self.stiffness = stiffness;
        self.damping = critical_damping(stiffness);
    }
    pub fn set_gains(&mut self, stiffness: f64, damping: f64) {
        self.stiffness = stiffness;
        self.damping = damping;
    }

    fn compute_desired_acc(&mut self) {
        let hl = &self.common.hl_task;
        self.common.acc.copy_from(hl.eval());
        self.common.acc *= -self.stiffness;
        self.common.acc.axpy(-self.damping, hl.speed(), 1.);
    }
}
impl_task_for_set_point!(SetPointTask);

/// Tracking of externally computed errors: `a_des = kp * errorPos + kv * errorVel + refAccel`.
pub struct TrackingTask<H: HighLevelTask> {
    common: SetPointTaskCommon<H>,
    gain_pos: f64,
    gain_vel: f64,
    error_pos: DVector<f64>,
    error_vel: DVector<f64>,
    ref_accel: DVector<f64>,
}

impl<H: HighLevelTask> TrackingTask<H> {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        gain_pos: f64,
        gain_vel: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        let dim = hl_task.dim();
        Ok(TrackingTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, None, weight)?,
            gain_pos,
            gain_vel,
            error_pos: DVector::zeros(dim),
            error_vel: DVector::zeros(dim),
            ref_accel: DVector::zeros(dim),
        })
    }

    pub fn set_gains(&mut self, gain_pos: f64, gain_vel: f64) {
        self.gain_pos = gain_pos;
        self.gain_vel = gain_vel;
    }
    pub fn gains(&self) -> (f64, f64) {
        (self.gain_pos, self.gain_vel)
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_error_pos(&mut self, error_pos: DVector<f64>) -> TasksResult<()> {
        check_dimension("errorPos", self.error_pos.len(), error_pos.len())?;
        self.error_pos = error_pos;
        Ok(())
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_error_vel(&mut self, error_vel: DVector<f64>) -> TasksResult<()> {
        check_dimension("errorVel", self.error_vel.len(), error_vel.len())?;
        self.error_vel = error_vel;
        Ok(())
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_ref_accel(&mut self, ref_accel: DVector<f64>) -> TasksResult<()> {
        check_dimension("refAccel", self.ref_accel.len(), ref_accel.len())?;
        self.ref_accel = ref_accel;
        Ok(())
    }

    fn compute_desired_acc(&mut self) {
        let acc = &mut self.common.acc;
        acc.copy_from(&self.ref_accel);
        acc.axpy(self.gain_pos, &self.error_pos, 1.);
        acc.axpy(self.gain_vel, &self.error_vel, 1.);
    }
}
impl_task_for_set_point!(TrackingTask);

/// Trajectory tracking with per axis gains and feed-forward terms:
/// `a_des = -stiffness .* e + damping .* (refVel - de) + refAccel`.
pub struct TrajectoryTask<H: HighLevelTask> {
    common: SetPointTaskCommon<H>,
    stiffness: DVector<f64>,
    damping: DVector<f64>,
    ref_vel: DVector<f64>,
    ref_accel: DVector<f64>,
}

impl<H: HighLevelTask> TrajectoryTask<H> {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        gain_pos: f64,
        gain_vel: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        let dim = hl_task.dim();
        Ok(TrajectoryTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, None, weight)?,
            stiffness: DVector::from_element(dim, gain_pos),
            damping: DVector::from_element(dim, gain_vel),
            ref_vel: DVector::zeros(dim),
            ref_accel: DVector::zeros(dim),
        })
    }

    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if `dim_weight` does not have the task dimension.
    pub fn with_dim_weight(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        gain_pos: f64,
        gain_vel: f64,
        dim_weight: DVector<f64>,
        weight: f64,
    ) -> TasksResult<Self> {
        let mut task = TrajectoryTask::new(robots, robot_index, hl_task, gain_pos, gain_vel, weight)?;
        task.set_dim_weight(dim_weight)?;
        Ok(task)
    }

    pub fn set_gains(&mut self, gain_pos: f64, gain_vel: f64) {
        self.stiffness.fill(gain_pos);
        self.damping.fill(gain_vel);
    }
    /// # Errors
    /// * DimensionMismatch if a vector does not have the task dimension.
    pub fn set_gains_vec(&mut self, stiffness: DVector<f64>, damping: DVector<f64>) -> TasksResult<()> {
        check_dimension("stiffness", self.stiffness.len(), stiffness.len())?;
        check_dimension("damping", self.damping.len(), damping.len())?;
        self.stiffness = stiffness;
        self.damping = damping;
        Ok(())
    }
    pub fn set_stiffness(&mut self, gain_pos: f64) {
        self.stiffness.fill(gain_pos);
    }
    pub fn stiffness(&self) -> &DVector<f64> {
        &self.stiffness
    }
    pub fn set_damping(&mut self, gain_vel: f64) {
        self.damping.fill(gain_vel);
    }
    pub fn damping(&self) -> &DVector<f64> {
        &self.damping
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_ref_vel(&mut self, ref_vel: DVector<f64>) -> TasksResult<()> {
        check_dimension("refVel", self.ref_vel.len(), ref_vel.len())?;
        self.ref_vel = ref_vel;
        Ok(())
    }
    pub fn ref_vel(&self) -> &DVector<f64> {
        &self.ref_vel
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_ref_accel(&mut self, ref_accel: DVector<f64>) -> TasksResult<()> {
        check_dimension("refAccel", self.ref_accel.len(), ref_accel.len())?;
        self.ref_accel = ref_accel;
        Ok(())
    }
    pub fn ref_accel(&self) -> &DVector<f64> {
        &self.ref_accel
    }

    fn compute_desired_acc(&mut self) {
        let hl = &self.common.hl_task;
        let (eval, speed) = (hl.eval(), hl.speed());
        let acc = &mut self.common.acc;
        for i in 0..acc.len() {
            acc[i] = self.damping[i] * (self.ref_vel[i] - speed[i]) - self.stiffness[i] * eval[i]
                + self.ref_accel[i];
        }
    }
}
impl_task_for_set_point!(TrajectoryTask);

/// PID on externally integrated and differentiated errors:
/// `a_des = P * error + I * errorI + D * errorD`.
#[deprecated(note = "replaced by TrackingTask")]
pub struct PIDTask<H: HighLevelTask> {
    common: SetPointTaskCommon<H>,
    p: f64,
    i: f64,
    d: f64,
    error: DVector<f64>,
    error_i: DVector<f64>,
    error_d: DVector<f64>,
}

#[allow(deprecated)]
impl<H: HighLevelTask> PIDTask<H> {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        p: f64,
        i: f64,
        d: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        let dim = hl_task.dim();
        Ok(PIDTask {
            common: SetPointTaskCommon::new(robots, robot_index, hl_task, None, weight)?,
            p,
            i,
            d,
            error: DVector::zeros(dim),
            error_i: DVector::zeros(dim),
            error_d: DVector::zeros(dim),
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }
    pub fn set_p(&mut self, p: f64) {
        self.p = p;
    }
    pub fn i(&self) -> f64 {
        self.i
    }
    pub fn set_i(&mut self, i: f64) {
        self.i = i;
    }
    pub fn d(&self) -> f64 {
        self.d
    }
    pub fn set_d(&mut self, d: f64) {
        self.d = d;
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_error(&mut self, error: DVector<f64>) -> TasksResult<()> {
        check_dimension("error", self.error.len(), error.len())?;
        self.error = error;
        Ok(())
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_error_i(&mut self, error_i: DVector<f64>) -> TasksResult<()> {
        check_dimension("errorI", self.error_i.len(), error_i.len())?;
        self.error_i = error_i;
        Ok(())
    }
    /// # Errors
    /// * DimensionMismatch if the vector does not have the task dimension.
    pub fn set_error_d(&mut self, error_d: DVector<f64>) -> TasksResult<()> {
        check_dimension("errorD", self.error_d.len(), error_d.len())?;
        self.error_d = error_d;
        Ok(())
    }

    fn compute_desired_acc(&mut self) {
        let acc = &mut self.common.acc;
        acc.copy_from(&self.error);
        *acc *= self.p;
        acc.axpy(self.i, &self.error_i, 1.);
        acc.axpy(self.d, &self.error_d, 1.);
    }
}
#[allow(deprecated)]
mod pid_task_impl {
    use super::*;
    impl_task_for_set_point!(PIDTask);
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use crate::exception::TasksException;
    use crate::multibody::test_robots;
    use crate::multibody::{MultiBody, MultiBodyConfig};
    use crate::qp::set_point::{PIDTask, SetPointTask, TrackingTask, TrajectoryTask};
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::{MockHighLevelTask, Task};
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    fn mock_task() -> MockHighLevelTask {
        let mut hl = MockHighLevelTask::new();
        hl.expect_dim().return_const(2usize);
        hl.expect_jac()
            .return_const(DMatrix::from_row_slice(2, 3, &[1., 0., 0., 0., 2., 0.]));
        hl.expect_eval().return_const(DVector::from_vec(vec![0.5, -1.]));
        hl.expect_speed().return_const(DVector::from_vec(vec![0.1, 0.2]));
        hl.expect_normal_acc()
            .return_const(DVector::from_vec(vec![0.01, 0.02]));
        hl.expect_update().return_const(());
        hl
    }

    fn setup() -> (Vec<MultiBody>, Vec<MultiBodyConfig>, SolverData) {
        let robots = vec![test_robots::arm()];
        let configs = vec![MultiBodyConfig::new(&robots[0])];
        let data = SolverData::new(&robots, vec![], vec![], &[]).unwrap();
        (robots, configs, data)
    }

    fn run<T: Task>(task: &mut T, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        task.update_nr_vars(robots, data);
        task.update(robots, configs, data);
    }

    #[test]
    fn set_point_critical_damping() {
        let (robots, configs, data) = setup();
        let mut task = SetPointTask::new(&robots, 0, mock_task(), 100., 2.).unwrap();
        assert_relative_eq!(task.damping(), 20.);
        run(&mut task, &robots, &configs, &data);
        assert_eq!(task.begin(), (0, 3));
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![2., 8., 0.]));
        assert_relative_eq!(*task.q(), q, epsilon = 1e-12);
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![-104.02, 383.92, 0.]),
            epsilon = 1e-9
        );
    }

    #[test]
    fn set_point_gains() {
        let (robots, _, _) = setup();
        let mut task = SetPointTask::new(&robots, 0, mock_task(), 100., 1.).unwrap();
        task.set_gains(10., 3.);
        assert_eq!((task.stiffness(), task.damping()), (10., 3.));
        task.set_stiffness(25.);
        assert_relative_eq!(task.damping(), 10.);
        task.set_weight(4.);
        assert_eq!(task.weight(), 4.);
    }

    #[test]
    fn set_point_dim_weight() {
        let (robots, configs, data) = setup();
        let mut task = SetPointTask::with_dim_weight(
            &robots,
            0,
            mock_task(),
            100.,
            DVector::from_vec(vec![1., 0.5]),
            2.,
        )
        .unwrap();
        run(&mut task, &robots, &configs, &data);
        assert_relative_eq!(task.q()[(1, 1)], 4., epsilon = 1e-12);
        assert_relative_eq!(task.c()[1], 191.96, epsilon = 1e-9);
        assert_eq!(
            task.set_dim_weight(DVector::from_element(3, 1.)),
            Err(TasksException::DimensionMismatch {
                what: "dimWeight",
                expected: 2,
                given: 3
            })
        );
    }

    #[test]
    fn unknown_robot() {
        let (robots, _, _) = setup();
        let result = SetPointTask::new(&robots, 1, mock_task(), 1., 1.);
        assert!(matches!(
            result,
            Err(TasksException::RobotIndexError { index: 1, .. })
        ));
    }

    #[test]
    fn tracking() {
        let (robots, configs, data) = setup();
        let mut task = TrackingTask::new(&robots, 0, mock_task(), 10., 2., 1.).unwrap();
        task.set_error_pos(DVector::from_vec(vec![1., 2.])).unwrap();
        task.set_error_vel(DVector::from_vec(vec![0.5, 0.])).unwrap();
        task.set_ref_accel(DVector::from_vec(vec![0., 1.])).unwrap();
        run(&mut task, &robots, &configs, &data);
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![10.99, 41.96, 0.]),
            epsilon = 1e-9
        );
        assert!(task.set_error_pos(DVector::zeros(1)).is_err());
    }

    #[test]
    fn trajectory() {
        let (robots, configs, data) = setup();
        let mut task = TrajectoryTask::new(&robots, 0, mock_task(), 10., 2., 1.).unwrap();
        task.set_ref_vel(DVector::from_vec(vec![1., 0.])).unwrap();
        run(&mut task, &robots, &configs, &data);
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![-3.21, 19.16, 0.]),
            epsilon = 1e-9
        );

        task.set_gains_vec(DVector::from_vec(vec![10., 0.]), DVector::from_vec(vec![2., 0.]))
            .unwrap();
        task.set_ref_vel(DVector::zeros(2)).unwrap();
        run(&mut task, &robots, &configs, &data);
        // second axis only keeps the bias compensation
        assert_relative_eq!(task.c()[1], -0.04, epsilon = 1e-9);
        assert!(task
            .set_gains_vec(DVector::zeros(3), DVector::zeros(2))
            .is_err());
    }

    #[test]
    fn pid() {
        let (robots, configs, data) = setup();
        let mut task = PIDTask::new(&robots, 0, mock_task(), 1., 0., 0., 1.).unwrap();
        task.set_error(DVector::from_vec(vec![1., 1.])).unwrap();
        task.set_error_i(DVector::from_vec(vec![5., 5.])).unwrap();
        run(&mut task, &robots, &configs, &data);
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![0.99, 1.96, 0.]),
            epsilon = 1e-9
        );
        task.set_i(1.);
        run(&mut task, &robots, &configs, &data);
        assert_relative_eq!(task.c()[0], 5.99, epsilon = 1e-9);
        assert_eq!((task.p(), task.i(), task.d()), (1., 1., 0.));
    }
}
