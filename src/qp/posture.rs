// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the PostureTask and its per joint gains.
use crate::exception::check_dimension;
use crate::multibody::{check_robot_index, JointType, MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::Task;
use crate::utils::critical_damping;
use crate::TasksResult;
use nalgebra::{DMatrix, DVector, Quaternion, UnitQuaternion};
use serde::Deserialize;
use serde::Serialize;

/// Stiffness of one joint, the damping is critical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStiffness {
    pub joint_name: String,
    pub stiffness: f64,
}

impl JointStiffness {
    pub fn new<S: Into<String>>(joint_name: S, stiffness: f64) -> Self {
        JointStiffness {
            joint_name: joint_name.into(),
            stiffness,
        }
    }
}

/// Stiffness and damping of one joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointGains {
    pub joint_name: String,
    pub stiffness: f64,
    pub damping: f64,
}

impl JointGains {
    /// Creates critically damped gains.
    pub fn new<S: Into<String>>(joint_name: S, stiffness: f64) -> Self {
        JointGains {
            joint_name: joint_name.into(),
            stiffness,
            damping: critical_damping(stiffness),
        }
    }
    pub fn with_damping<S: Into<String>>(joint_name: S, stiffness: f64, damping: f64) -> Self {
        JointGains {
            joint_name: joint_name.into(),
            stiffness,
            damping,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct JointData {
    stiffness: f64,
    damping: f64,
    start: usize,
    size: usize,
}

/// Joint space set point.
///
/// The Jacobian is the identity on all joints except a floating base, so
/// ```text
/// Q = w * diag(dimWeight)
/// C = w * diag(dimWeight) * (-k .* e + d .* (refVel - alpha) + refAccel)
/// ```
/// Spherical and free joints use the rotation vector of `q_target^-1 * q` as error.
pub struct PostureTask {
    robot_index: usize,
    alpha_d_begin: usize,
    weight: f64,
    posture: Vec<Vec<f64>>,
    stiffness: f64,
    damping: f64,
    joint_datas: Vec<JointData>,
    // first dof of the actuated part
    first_dof: usize,
    eval: DVector<f64>,
    ref_vel: DVector<f64>,
    ref_accel: DVector<f64>,
    dim_weight: DVector<f64>,
    q: DMatrix<f64>,
    c: DVector<f64>,
    // cache
    stiffness_vec: DVector<f64>,
    damping_vec: DVector<f64>,
}

impl PostureTask {
    /// # Arguments
    /// * `posture` - target configuration, one parameter vector per joint.
    /// * `stiffness` - stiffness of every joint, the damping is `2 sqrt(stiffness)`.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if `posture` does not match the joints of the robot.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        posture: Vec<Vec<f64>>,
        stiffness: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let mb = &robots[robot_index];
        check_posture(mb, &posture)?;
        let nr_dof = mb.nr_dof();
        let first_dof = match mb.joint(0).joint_type {
            JointType::Free => mb.joint(0).dof(),
            _ => 0,
        };
        Ok(PostureTask {
            robot_index,
            alpha_d_begin: 0,
            weight,
            posture,
            stiffness,
            damping: critical_damping(stiffness),
            joint_datas: Vec::new(),
            first_dof,
            eval: DVector::zeros(nr_dof),
            ref_vel: DVector::zeros(nr_dof),
            ref_accel: DVector::zeros(nr_dof),
            dim_weight: DVector::from_element(nr_dof, 1.),
            q: DMatrix::zeros(nr_dof, nr_dof),
            c: DVector::zeros(nr_dof),
            stiffness_vec: DVector::zeros(nr_dof),
            damping_vec: DVector::zeros(nr_dof),
        })
    }

    pub fn posture(&self) -> &[Vec<f64>] {
        &self.posture
    }
    /// # Errors
    /// * DimensionMismatch if `posture` does not match the joints of the robot.
    pub fn set_posture(&mut self, robots: &[MultiBody], posture: Vec<Vec<f64>>) -> TasksResult<()> {
        check_robot_index(robots, self.robot_index)?;
        check_posture(&robots[self.robot_index], &posture)?;
        self.posture = posture;
        Ok(())
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
    pub fn damping(&self) -> f64 {
        self.damping
    }
    /// Sets the stiffness of all joints without specific gains, damping is critical.
    pub fn set_stiffness(&mut self, stiffness: f64) {
        self.set_gains(stiffness, critical_damping(stiffness));
    }
    pub fn set_gains(&mut self, stiffness: f64, damping: f64) {
        self.stiffness = stiffness;
        self.damping = damping;
    }

    /// Replaces the specific joint gains by critically damped stiffnesses.
    /// # Errors
    /// * UnknownJoint if a joint name is not part of the robot.
    pub fn set_joints_stiffness(
        &mut self,
        robots: &[MultiBody],
        joints: &[JointStiffness],
    ) -> TasksResult<()> {
        let gains: Vec<JointGains> = joints
            .iter()
            .map(|j| JointGains::new(j.joint_name.clone(), j.stiffness))
            .collect();
        self.set_joints_gains(robots, &gains)
    }

    /// Replaces the specific joint gains.
    /// # Errors
    /// * UnknownJoint if a joint name is not part of the robot.
    pub fn set_joints_gains(&mut self, robots: &[MultiBody], joints: &[JointGains]) -> TasksResult<()> {
        check_robot_index(robots, self.robot_index)?;
        let mb = &robots[self.robot_index];
        let mut joint_datas = Vec::with_capacity(joints.len());
        for gains in joints {
            let index = mb.joint_index_by_name(&gains.joint_name)?;
            joint_datas.push(JointData {
                stiffness: gains.stiffness,
                damping: gains.damping,
                start: mb.joint_pos_in_dof(index),
                size: mb.joint(index).dof(),
            });
        }
        self.joint_datas = joint_datas;
        Ok(())
    }

    /// error `q - q_target` in the velocity space of the robot
    pub fn eval(&self) -> &DVector<f64> {
        &self.eval
    }
    pub fn ref_vel(&self) -> &DVector<f64> {
        &self.ref_vel
    }
    /// # Errors
    /// * DimensionMismatch if `ref_vel` is not of size `nr_dof`.
    pub fn set_ref_vel(&mut self, ref_vel: DVector<f64>) -> TasksResult<()> {
        check_dimension("refVel", self.ref_vel.len(), ref_vel.len())?;
        self.ref_vel = ref_vel;
        Ok(())
    }
    pub fn ref_accel(&self) -> &DVector<f64> {
        &self.ref_accel
    }
    /// # Errors
    /// * DimensionMismatch if `ref_accel` is not of size `nr_dof`.
    pub fn set_ref_accel(&mut self, ref_accel: DVector<f64>) -> TasksResult<()> {
        check_dimension("refAccel", self.ref_accel.len(), ref_accel.len())?;
        self.ref_accel = ref_accel;
        Ok(())
    }
    pub fn dim_weight(&self) -> &DVector<f64> {
        &self.dim_weight
    }
    /// # Errors
    /// * DimensionMismatch if `dim_weight` is not of size `nr_dof`.
    pub fn set_dim_weight(&mut self, dim_weight: DVector<f64>) -> TasksResult<()> {
        check_dimension("dimWeight", self.dim_weight.len(), dim_weight.len())?;
        self.dim_weight = dim_weight;
        Ok(())
    }

    fn compute_eval(&mut self, mb: &MultiBody, config: &MultiBodyConfig) {
        for (index, joint) in mb.joints().iter().enumerate() {
            let start = mb.joint_pos_in_dof(index);
            let error = joint_error(
                joint.joint_type,
                &config.q[index],
                &self.posture[index],
            );
            if !error.is_empty() {
                self.eval.rows_mut(start, error.len()).copy_from_slice(&error);
            }
        }
    }
}

fn check_posture(mb: &MultiBody, posture: &[Vec<f64>]) -> TasksResult<()> {
    check_dimension("posture", mb.nr_joints(), posture.len())?;
    for (joint, q) in mb.joints().iter().zip(posture.iter()) {
        check_dimension("posture", joint.params(), q.len())?;
    }
    Ok(())
}

fn quaternion(q: &[f64]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// error of one joint in its velocity space
fn joint_error(joint_type: JointType, q: &[f64], target: &[f64]) -> Vec<f64> {
    match joint_type {
        JointType::Fixed => vec![],
        JointType::Revolute | JointType::Prismatic => vec![q[0] - target[0]],
        JointType::Spherical => {
            let e = (quaternion(target).inverse() * quaternion(q)).scaled_axis();
            vec![e.x, e.y, e.z]
        }
        JointType::Free => {
            let e = (quaternion(target).inverse() * quaternion(q)).scaled_axis();
            vec![
                e.x,
                e.y,
                e.z,
                q[4] - target[4],
                q[5] - target[5],
                q[6] - target[6],
            ]
        }
    }
}

impl Task for PostureTask {
    fn weight(&self) -> f64 {
        self.weight
    }
    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
    fn begin(&self) -> (usize, usize) {
        (self.alpha_d_begin, self.alpha_d_begin + self.q.ncols())
    }
    fn update_nr_vars(&mut self, _robots: &[MultiBody], data: &SolverData) {
        self.alpha_d_begin = data.alpha_d_begin(self.robot_index);
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let mb = &robots[self.robot_index];
        let config = &configs[self.robot_index];
        self.compute_eval(mb, config);

        self.stiffness_vec.fill(self.stiffness);
        self.damping_vec.fill(self.damping);
        for jd in self.joint_datas.iter() {
            self.stiffness_vec.rows_mut(jd.start, jd.size).fill(jd.stiffness);
            self.damping_vec.rows_mut(jd.start, jd.size).fill(jd.damping);
        }

        let alpha = config.alpha.iter().flat_map(|a| a.iter());
        self.q.fill(0.);
        self.c.fill(0.);
        for (i, a) in alpha.enumerate().skip(self.first_dof) {
            let w = self.weight * self.dim_weight[i];
            self.q[(i, i)] = w;
            self.c[i] = w
                * (-self.stiffness_vec[i] * self.eval[i]
                    + self.damping_vec[i] * (self.ref_vel[i] - a)
                    + self.ref_accel[i]);
        }
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
    use crate::qp::posture::{JointGains, JointStiffness, PostureTask};
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::Task;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};

    fn arm_setup() -> (Vec<MultiBody>, Vec<MultiBodyConfig>, PostureTask) {
        let robots = vec![test_robots::arm()];
        let mut config = MultiBodyConfig::new(&robots[0]);
        config.q = vec![vec![], vec![0.5], vec![0.2], vec![0.]];
        config.alpha = vec![vec![], vec![1.], vec![0.], vec![0.]];
        let target = vec![vec![], vec![0.1], vec![0.2], vec![0.3]];
        let task = PostureTask::new(&robots, 0, target, 4., 1.).unwrap();
        (robots, vec![config], task)
    }

    fn run(task: &mut PostureTask, robots: &[MultiBody], configs: &[MultiBodyConfig]) {
        let data = SolverData::new(robots, vec![], vec![], &[]).unwrap();
        task.update_nr_vars(robots, &data);
        task.update(robots, configs, &data);
    }

    #[test]
    fn critical_damping() {
        let (robots, configs, mut task) = arm_setup();
        assert_relative_eq!(task.damping(), 4.);
        run(&mut task, &robots, &configs);
        assert_relative_eq!(
            *task.eval(),
            DVector::from_vec(vec![0.4, 0., -0.3]),
            epsilon = 1e-12
        );
        assert_eq!(*task.q(), DMatrix::identity(3, 3));
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![-5.6, 0., 1.2]),
            epsilon = 1e-12
        );
        assert_eq!(task.begin(), (0, 3));
    }

    #[test]
    fn joint_gains() {
        let (robots, configs, mut task) = arm_setup();
        task.set_joints_stiffness(&robots, &[JointStiffness::new("j3", 9.)])
            .unwrap();
        run(&mut task, &robots, &configs);
        assert_relative_eq!(task.c()[2], 2.7, epsilon = 1e-12);
        assert_relative_eq!(task.c()[0], -5.6, epsilon = 1e-12);

        task.set_joints_gains(&robots, &[JointGains::with_damping("j1", 1., 0.)])
            .unwrap();
        run(&mut task, &robots, &configs);
        assert_relative_eq!(task.c()[0], -0.4, epsilon = 1e-12);
        // the previous specific gains were replaced
        assert_relative_eq!(task.c()[2], 1.2, epsilon = 1e-12);

        assert!(matches!(
            task.set_joints_gains(&robots, &[JointGains::new("knee", 1.)]),
            Err(TasksException::UnknownJoint { .. })
        ));
    }

    #[test]
    fn references_and_dim_weight() {
        let (robots, configs, mut task) = arm_setup();
        task.set_gains(4., 2.);
        task.set_ref_vel(DVector::from_vec(vec![1., 0., 0.])).unwrap();
        task.set_ref_accel(DVector::from_vec(vec![0., 3., 0.])).unwrap();
        task.set_dim_weight(DVector::from_vec(vec![1., 2., 0.5]))
            .unwrap();
        run(&mut task, &robots, &configs);
        assert_relative_eq!(
            *task.c(),
            DVector::from_vec(vec![-1.6, 6., 0.6]),
            epsilon = 1e-12
        );
        assert_relative_eq!(task.q()[(1, 1)], 2.);
        assert!(task.set_ref_vel(DVector::zeros(4)).is_err());
    }

    #[test]
    fn floating_base_is_excluded() {
        let robots = vec![test_robots::floating()];
        let mut config = MultiBodyConfig::new(&robots[0]);
        config.q[0] = vec![1., 0., 0., 0., 1., 2., 3.];
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.2);
        config.q[1] = vec![rot.w, rot.i, rot.j, rot.k];
        config.q[2] = vec![0.1];
        let target = robots[0]
            .joints()
            .iter()
            .map(|j| j.joint_type.zero_param())
            .collect();
        let mut task = PostureTask::new(&robots, 0, target, 1., 1.).unwrap();
        run(&mut task, &robots, &[config]);
        assert_relative_eq!(task.eval()[3], 1., epsilon = 1e-12);
        assert_relative_eq!(task.eval()[8], 0.2, epsilon = 1e-12);
        assert_eq!(task.q().view((0, 0), (6, 6)).sum(), 0.);
        assert_eq!(task.c().rows(0, 6).sum(), 0.);
        assert_relative_eq!(task.c()[8], -0.2, epsilon = 1e-12);
        assert_relative_eq!(task.c()[9], -0.1, epsilon = 1e-12);
        assert_eq!(task.q()[(9, 9)], 1.);
    }

    #[test]
    fn invalid_posture() {
        let robots = vec![test_robots::arm()];
        let result = PostureTask::new(&robots, 0, vec![vec![], vec![0.]], 1., 1.);
        assert!(matches!(
            result,
            Err(TasksException::DimensionMismatch {
                what: "posture",
                expected: 4,
                given: 2
            })
        ));
    }
}
