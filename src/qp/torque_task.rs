// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the tasks acting on joint torques.
use crate::contact::contact_id::ContactId;
use crate::exception::{check_dimension, TasksException};
use crate::multibody::{check_robot_index, param_to_vector, MultiBody, MultiBodyConfig};
use crate::qp::contact_task::contact_block;
use crate::qp::solver_data::SolverData;
use crate::qp::task::Task;
use crate::TasksResult;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::Deserialize;
use serde::Serialize;

/// Lower and upper torque limits, one vector per joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueBound {
    pub lower: Vec<Vec<f64>>,
    pub upper: Vec<Vec<f64>>,
}

impl TorqueBound {
    pub fn new(lower: Vec<Vec<f64>>, upper: Vec<Vec<f64>>) -> Self {
        TorqueBound { lower, upper }
    }

    fn check(&self, mb: &MultiBody) -> TasksResult<()> {
        check_per_joint("torque bound", mb, [&self.lower, &self.upper])
    }

    /// middle of the bounds stacked in the velocity space
    pub fn midpoint(&self) -> DVector<f64> {
        (param_to_vector(&self.lower) + param_to_vector(&self.upper)) * 0.5
    }
}

/// Lower and upper limits of the torque derivatives, one vector per joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueDBound {
    pub lower: Vec<Vec<f64>>,
    pub upper: Vec<Vec<f64>>,
}

impl TorqueDBound {
    pub fn new(lower: Vec<Vec<f64>>, upper: Vec<Vec<f64>>) -> Self {
        TorqueDBound { lower, upper }
    }

    fn check(&self, mb: &MultiBody) -> TasksResult<()> {
        check_per_joint("torque derivative bound", mb, [&self.lower, &self.upper])
    }
}

fn check_per_joint(
    what: &'static str,
    mb: &MultiBody,
    bounds: [&Vec<Vec<f64>>; 2],
) -> TasksResult<()> {
    for bound in bounds.iter() {
        check_dimension(what, mb.nr_joints(), bound.len())?;
        for (joint, b) in mb.joints().iter().zip(bound.iter()) {
            check_dimension(what, joint.dof(), b.len())?;
        }
    }
    Ok(())
}

/// Window of torques reachable in one time step.
#[derive(Debug, Clone)]
struct RateLimit {
    d_lower: DVector<f64>,
    d_upper: DVector<f64>,
    dt: f64,
}

/// Keeps the torques of a robot close to a reference.
///
/// Acts on the torque block of the robot in the [`SolverData`]:
/// ```text
/// Q = w * diag(jointSelect)
/// C = w * diag(jointSelect) * torque_ref
/// ```
/// The reference defaults to the middle of the torque bounds and can be replaced by a
/// trajectory with [`set_reference`](`Self::set_reference`).
///
/// With a [`TorqueDBound`] the task tracks `torque_ref` clamped to the torque bounds and to
/// `[previous + dt * lower_d, previous + dt * upper_d]`, `previous` being the tracked torque of
/// the last tick. The window starts at zero torque and can be moved to a measured torque with
/// [`set_previous_torque`](`Self::set_previous_torque`).
pub struct TorqueTask {
    robot_index: usize,
    weight: f64,
    joint_select: DVector<f64>,
    reference: DVector<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
    rate_limit: Option<RateLimit>,
    target: DVector<f64>,
    begin: usize,
    q: DMatrix<f64>,
    c: DVector<f64>,
}

impl TorqueTask {
    /// Selects all joints of the robot.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if the bounds do not match the joints of the robot.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        bound: &TorqueBound,
        weight: f64,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let nr_dof = robots[robot_index].nr_dof();
        Self::with_joint_select(
            robots,
            robot_index,
            bound,
            DVector::from_element(nr_dof, 1.),
            weight,
        )
    }

    /// # Arguments
    /// * `joint_select` - weight of each dof of the robot, zero disables a dof.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if the bounds or `joint_select` do not match the robot.
    pub fn with_joint_select(
        robots: &[MultiBody],
        robot_index: usize,
        bound: &TorqueBound,
        joint_select: DVector<f64>,
        weight: f64,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let mb = &robots[robot_index];
        bound.check(mb)?;
        check_dimension("jointSelect", mb.nr_dof(), joint_select.len())?;
        Ok(TorqueTask {
            robot_index,
            weight,
            joint_select,
            reference: bound.midpoint(),
            lower: param_to_vector(&bound.lower),
            upper: param_to_vector(&bound.upper),
            rate_limit: None,
            target: DVector::zeros(mb.nr_dof()),
            begin: 0,
            q: DMatrix::zeros(0, 0),
            c: DVector::zeros(0),
        })
    }

    /// Selects the joints between the root and the body `ef_name`.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `ef_name` is not part of the robot.
    /// * DimensionMismatch if the bounds do not match the joints of the robot.
    pub fn with_end_effector(
        robots: &[MultiBody],
        robot_index: usize,
        bound: &TorqueBound,
        ef_name: &str,
        weight: f64,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let mb = &robots[robot_index];
        let body = mb.body_index_by_name(ef_name)?;
        let mut joint_select = DVector::zeros(mb.nr_dof());
        for joint in mb.joint_path(body) {
            joint_select
                .rows_mut(mb.joint_pos_in_dof(joint), mb.joint(joint).dof())
                .fill(1.);
        }
        Self::with_joint_select(robots, robot_index, bound, joint_select, weight)
    }

    /// Selects all joints and limits the change of the tracked torque per time step.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if a bound does not match the joints of the robot.
    /// * InvalidParameter if `dt` is not positive.
    pub fn with_torque_d_bound(
        robots: &[MultiBody],
        robot_index: usize,
        bound: &TorqueBound,
        d_bound: &TorqueDBound,
        dt: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        let mut task = Self::new(robots, robot_index, bound, weight)?;
        task.set_torque_d_bound(robots, d_bound, dt)?;
        Ok(task)
    }

    /// Limits the change of the tracked torque per time step, see [`TorqueTask`].
    /// # Errors
    /// * DimensionMismatch if `d_bound` does not match the joints of the robot.
    /// * InvalidParameter if `dt` is not positive.
    pub fn set_torque_d_bound(
        &mut self,
        robots: &[MultiBody],
        d_bound: &TorqueDBound,
        dt: f64,
    ) -> TasksResult<()> {
        check_robot_index(robots, self.robot_index)?;
        d_bound.check(&robots[self.robot_index])?;
        if !(dt.is_finite() && dt > 0.) {
            return Err(TasksException::InvalidParameter {
                name: "dt",
                message: format!("must be positive and finite, got {}", dt),
            });
        }
        self.rate_limit = Some(RateLimit {
            d_lower: param_to_vector(&d_bound.lower),
            d_upper: param_to_vector(&d_bound.upper),
            dt,
        });
        Ok(())
    }

    pub fn joint_select(&self) -> &DVector<f64> {
        &self.joint_select
    }
    /// torques tracked by the last update
    pub fn target(&self) -> &DVector<f64> {
        &self.target
    }
    /// Centers the next torque derivative window on `torque`.
    /// # Errors
    /// * DimensionMismatch if `torque` is not of size `nr_dof`.
    pub fn set_previous_torque(&mut self, torque: DVector<f64>) -> TasksResult<()> {
        check_dimension("previous torque", self.target.len(), torque.len())?;
        self.target = torque;
        Ok(())
    }
    pub fn reference(&self) -> &DVector<f64> {
        &self.reference
    }
    /// # Errors
    /// * DimensionMismatch if `reference` is not of size `nr_dof`.
    pub fn set_reference(&mut self, reference: DVector<f64>) -> TasksResult<()> {
        check_dimension("torque reference", self.reference.len(), reference.len())?;
        self.reference = reference;
        Ok(())
    }
}

impl Task for TorqueTask {
    fn weight(&self) -> f64 {
        self.weight
    }
    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
    fn begin(&self) -> (usize, usize) {
        (self.begin, self.begin + self.c.len())
    }
    fn update_nr_vars(&mut self, _robots: &[MultiBody], data: &SolverData) {
        let size = match data.torque_begin(self.robot_index) {
            Some(begin) => {
                debug!(
                    "TorqueTask of robot {} uses torques at {}",
                    self.robot_index, begin
                );
                self.begin = begin;
                self.joint_select.len()
            }
            None => {
                warn!(
                    "TorqueTask: robot {} has no torque variables, the task is disabled",
                    self.robot_index
                );
                self.begin = 0;
                0
            }
        };
        self.q = DMatrix::zeros(size, size);
        self.c = DVector::zeros(size);
    }
    fn update(&mut self, _robots: &[MultiBody], _configs: &[MultiBodyConfig], _data: &SolverData) {
        if self.c.is_empty() {
            return;
        }
        for i in 0..self.c.len() {
            self.target[i] = match &self.rate_limit {
                Some(limit) => {
                    let lower = self.lower[i].max(self.target[i] + limit.dt * limit.d_lower[i]);
                    let upper = self.upper[i].min(self.target[i] + limit.dt * limit.d_upper[i]);
                    self.reference[i].max(lower).min(upper)
                }
                None => self.reference[i],
            };
            let w = self.weight * self.joint_select[i];
            self.q[(i, i)] = w;
            self.c[i] = w * self.target[i];
        }
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn c(&self) -> &DVector<f64> {
        &self.c
    }
}

/// Minimizes the torque created by the forces of a contact about the axis of a gripper.
///
/// `origin` and `axis` are given in body 1 coordinates. For every generator `g_k` applied at
/// the point `p` the torque about the axis is `axis . ((p - origin) x g_k)`, so
/// `Q = 0` and `C_k = -w * axis . ((p - origin) x g_k)`.
///
/// The penalty has no threshold. A hard torque limit is a constraint of the QP, not part of
/// this objective.
pub struct GripperTorqueTask {
    contact_id: ContactId,
    origin: Vector3<f64>,
    axis: Vector3<f64>,
    weight: f64,
    begin: usize,
    torques: DVector<f64>,
    q: DMatrix<f64>,
    c: DVector<f64>,
}

impl GripperTorqueTask {
    pub fn new(contact_id: ContactId, origin: Vector3<f64>, axis: Vector3<f64>, weight: f64) -> Self {
        GripperTorqueTask {
            contact_id,
            origin,
            axis,
            weight,
            begin: 0,
            torques: DVector::zeros(0),
            q: DMatrix::zeros(0, 0),
            c: DVector::zeros(0),
        }
    }
    pub fn contact_id(&self) -> ContactId {
        self.contact_id
    }
    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }
    pub fn axis(&self) -> &Vector3<f64> {
        &self.axis
    }
}

impl Task for GripperTorqueTask {
    fn weight(&self) -> f64 {
        self.weight
    }
    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
    fn begin(&self) -> (usize, usize) {
        (self.begin, self.begin + self.c.len())
    }
    fn update_nr_vars(&mut self, _robots: &[MultiBody], data: &SolverData) {
        let points: Vec<Vector3<f64>> = data
            .unilateral_contact(&self.contact_id)
            .map(|c| c.r1_points().to_vec())
            .or_else(|| {
                data.bilateral_contact(&self.contact_id)
                    .map(|c| c.r1_points().to_vec())
            })
            .unwrap_or_default();
        let (begin, generators) = contact_block(data, &self.contact_id, "GripperTorqueTask")
            .unwrap_or_else(|| (0, DMatrix::zeros(3, 0)));
        self.begin = begin;
        let nr_lambda = generators.ncols();
        self.torques = DVector::zeros(nr_lambda);
        if !points.is_empty() {
            // every point has the same number of generators
            let per_point = nr_lambda / points.len();
            for (k, g) in generators.column_iter().enumerate() {
                let lever = points[k / per_point] - self.origin;
                self.torques[k] = self.axis.dot(&lever.cross(&Vector3::new(g[0], g[1], g[2])));
            }
        }
        self.q = DMatrix::zeros(nr_lambda, nr_lambda);
        self.c = DVector::zeros(nr_lambda);
    }
    fn update(&mut self, _robots: &[MultiBody], _configs: &[MultiBodyConfig], _data: &SolverData) {
        self.c.copy_from(&self.torques);
        self.c *= -self.weight;
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn c(&self) -> &DVector<f64> {
        &self.c
    }
}

#[cfg(test)]
mod tests {
    use crate::exception::TasksException;
    use crate::multibody::{test_robots, MultiBody, MultiBodyConfig};
    use crate::qp::solver_data::test_data::foot_contact;
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::Task;
    use crate::qp::torque_task::{GripperTorqueTask, TorqueBound, TorqueDBound, TorqueTask};
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector, Vector3};

    fn arm_bound() -> TorqueBound {
        TorqueBound::new(
            vec![vec![], vec![-10.], vec![-4.], vec![-2.]],
            vec![vec![], vec![20.], vec![4.], vec![2.]],
        )
    }

    fn setup(torque_robots: &[usize]) -> (Vec<MultiBody>, Vec<MultiBodyConfig>, SolverData) {
        let robots = vec![test_robots::arm()];
        let configs = robots.iter().map(MultiBodyConfig::new).collect();
        let data = SolverData::new(&robots, vec![], vec![], torque_robots).unwrap();
        (robots, configs, data)
    }

    #[test]
    fn midpoint_reference() {
        let (robots, configs, data) = setup(&[0]);
        let mut task = TorqueTask::new(&robots, 0, &arm_bound(), 2.).unwrap();
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        assert_eq!(task.begin(), (3, 6));
        assert_eq!(*task.q(), DMatrix::identity(3, 3) * 2.);
        assert_eq!(*task.c(), DVector::from_vec(vec![10., 0., 0.]));

        task.set_reference(DVector::from_vec(vec![1., 2., 3.])).unwrap();
        task.update(&robots, &configs, &data);
        assert_eq!(*task.c(), DVector::from_vec(vec![2., 4., 6.]));
        assert!(task.set_reference(DVector::zeros(2)).is_err());
    }

    fn arm_d_bound(rate: f64) -> TorqueDBound {
        TorqueDBound::new(
            vec![vec![], vec![-rate], vec![-rate], vec![-rate]],
            vec![vec![], vec![rate], vec![rate], vec![rate]],
        )
    }

    #[test]
    fn torque_derivative_bound() {
        let (robots, configs, data) = setup(&[0]);
        let mut task =
            TorqueTask::with_torque_d_bound(&robots, 0, &arm_bound(), &arm_d_bound(100.), 0.01, 2.)
                .unwrap();
        task.update_nr_vars(&robots, &data);
        // the midpoint reference (5, 0, 0) is reached by steps of 1 from zero torque
        task.update(&robots, &configs, &data);
        assert_eq!(*task.target(), DVector::from_vec(vec![1., 0., 0.]));
        assert_eq!(*task.c(), DVector::from_vec(vec![2., 0., 0.]));
        task.update(&robots, &configs, &data);
        assert_relative_eq!(*task.c(), DVector::from_vec(vec![4., 0., 0.]), epsilon = 1e-12);
        assert_eq!(*task.q(), DMatrix::identity(3, 3) * 2.);

        // the window around a measured torque is cut by the torque bounds
        task.set_previous_torque(DVector::from_vec(vec![19.5, 3.5, 0.]))
            .unwrap();
        task.update(&robots, &configs, &data);
        assert_relative_eq!(
            *task.target(),
            DVector::from_vec(vec![18.5, 2.5, 0.]),
            epsilon = 1e-12
        );
        assert_relative_eq!(*task.c(), DVector::from_vec(vec![37., 5., 0.]), epsilon = 1e-12);
        assert!(task.set_previous_torque(DVector::zeros(4)).is_err());
    }

    #[test]
    fn unlimited_task_tracks_the_reference() {
        let (robots, configs, data) = setup(&[0]);
        let mut task = TorqueTask::new(&robots, 0, &arm_bound(), 1.).unwrap();
        task.update_nr_vars(&robots, &data);
        task.set_previous_torque(DVector::from_vec(vec![-3., 1., 1.]))
            .unwrap();
        task.update(&robots, &configs, &data);
        assert_eq!(*task.target(), DVector::from_vec(vec![5., 0., 0.]));
    }

    #[test]
    fn invalid_torque_derivative_bound() {
        let robots = vec![test_robots::arm()];
        for dt in [0., -0.01, f64::NAN, f64::INFINITY].iter() {
            assert!(matches!(
                TorqueTask::with_torque_d_bound(&robots, 0, &arm_bound(), &arm_d_bound(1.), *dt, 1.),
                Err(TasksException::InvalidParameter { name: "dt", .. })
            ));
        }
        let short = TorqueDBound::new(vec![vec![]; 3], vec![vec![]; 3]);
        assert!(matches!(
            TorqueTask::with_torque_d_bound(&robots, 0, &arm_bound(), &short, 0.01, 1.),
            Err(TasksException::DimensionMismatch {
                what: "torque derivative bound",
                expected: 4,
                given: 3
            })
        ));
    }

    #[test]
    fn end_effector_selection() {
        let robots = vec![test_robots::floating()];
        let bound = TorqueBound::new(
            vec![vec![0.; 6], vec![-1.; 3], vec![-1.]],
            vec![vec![0.; 6], vec![1.; 3], vec![1.]],
        );
        let task = TorqueTask::with_end_effector(&robots, 0, &bound, "shoulder", 1.).unwrap();
        let mut expected = DVector::from_element(10, 1.);
        expected[9] = 0.;
        assert_eq!(*task.joint_select(), expected);
        assert!(matches!(
            TorqueTask::with_end_effector(&robots, 0, &bound, "foot", 1.),
            Err(TasksException::UnknownBody { .. })
        ));
    }

    #[test]
    fn missing_torque_block() {
        let (robots, configs, data) = setup(&[]);
        let mut task = TorqueTask::new(&robots, 0, &arm_bound(), 1.).unwrap();
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        assert_eq!(task.q().shape(), (0, 0));
        assert_eq!(task.begin(), (0, 0));
    }

    #[test]
    fn invalid_bound() {
        let robots = vec![test_robots::arm()];
        let bound = TorqueBound::new(vec![vec![]; 4], vec![vec![]; 4]);
        assert!(matches!(
            TorqueTask::new(&robots, 0, &bound, 1.),
            Err(TasksException::DimensionMismatch {
                what: "torque bound",
                ..
            })
        ));
    }

    #[test]
    fn gripper_torque() {
        let robots = vec![test_robots::floating(), test_robots::arm()];
        let configs: Vec<_> = robots.iter().map(MultiBodyConfig::new).collect();
        let contact = foot_contact(1, 2);
        let data = SolverData::new(&robots, vec![contact.clone()], vec![], &[]).unwrap();
        let origin = Vector3::zeros();
        let axis = Vector3::z();
        let mut task = GripperTorqueTask::new(contact.contact_id(), origin, axis, 3.);
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        assert_eq!(task.begin(), (13, 21));
        for k in 0..8 {
            let p = contact.r1_points()[k / 4];
            let g = contact.r1_cone().generators[k % 4];
            assert_relative_eq!(task.c()[k], -3. * axis.dot(&(p - origin).cross(&g)), epsilon = 1e-12);
        }
        assert_eq!(*task.q(), DMatrix::zeros(8, 8));
    }
}
