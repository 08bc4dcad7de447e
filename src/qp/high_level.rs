// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the high level tasks computed from a [`MultiBodyConfig`].
//!
//! All quantities are expressed in the world frame unless stated otherwise. Spatial vectors
//! are `[angular; linear]`.
use crate::exception::TasksException;
use crate::multibody::{check_robot_index, MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::HighLevelTask;
use crate::utils::{
    angular, linear, point_jacobian_to, point_normal_acc, point_velocity, rotation_error, skew,
};
use crate::TasksResult;
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix2x3, Rotation3, UnitQuaternion, Vector2, Vector3, Vector6,
};

fn body_index(robots: &[MultiBody], robot_index: usize, body_name: &str) -> TasksResult<usize> {
    check_robot_index(robots, robot_index)?;
    robots[robot_index].body_index_by_name(body_name)
}

/// Buffers shared by all high level tasks of dimension `dim`.
#[derive(Debug, Clone)]
struct TaskBuffers {
    eval: DVector<f64>,
    speed: DVector<f64>,
    normal_acc: DVector<f64>,
    jac: DMatrix<f64>,
    /// 3 x nr_dof scratch for Jacobians projected after their computation
    scratch: DMatrix<f64>,
}

impl TaskBuffers {
    fn new(dim: usize, nr_dof: usize) -> Self {
        TaskBuffers {
            eval: DVector::zeros(dim),
            speed: DVector::zeros(dim),
            normal_acc: DVector::zeros(dim),
            jac: DMatrix::zeros(dim, nr_dof),
            scratch: DMatrix::zeros(3, nr_dof),
        }
    }
}

macro_rules! impl_buffer_access {
    () => {
        fn dim(&self) -> usize {
            self.buffers.eval.len()
        }
        fn jac(&self) -> &DMatrix<f64> {
            &self.buffers.jac
        }
        fn eval(&self) -> &DVector<f64> {
            &self.buffers.eval
        }
        fn speed(&self) -> &DVector<f64> {
            &self.buffers.speed
        }
        fn normal_acc(&self) -> &DVector<f64> {
            &self.buffers.normal_acc
        }
    };
}

/// Position of a point rigidly attached to a body.
#[derive(Debug, Clone)]
pub struct PositionTask {
    robot_index: usize,
    body_index: usize,
    position: Vector3<f64>,
    body_point: Vector3<f64>,
    buffers: TaskBuffers,
}

impl PositionTask {
    /// # Arguments
    /// * `position` - target position in world frame.
    /// * `body_point` - controlled point in body coordinates. Defaults to the body origin.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new<P: Into<Option<Vector3<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        position: Vector3<f64>,
        body_point: P,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(PositionTask {
            robot_index,
            body_index,
            position,
            body_point: body_point.into().unwrap_or_else(Vector3::zeros),
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }
    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }
    pub fn body_point(&self) -> &Vector3<f64> {
        &self.body_point
    }
    pub fn set_body_point(&mut self, body_point: Vector3<f64>) {
        self.body_point = body_point;
    }
}

impl HighLevelTask for PositionTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let x_0_b = &config.body_pos_w[b];
        let r = x_0_b.rotation * self.body_point;
        let buffers = &mut self.buffers;
        buffers
            .eval
            .copy_from(&(x_0_b.translation.vector + r - self.position));
        buffers
            .speed
            .copy_from(&point_velocity(&config.body_vel_w[b], &r));
        buffers.normal_acc.copy_from(&point_normal_acc(
            &config.body_normal_acc_w[b],
            &config.body_vel_w[b],
            &r,
        ));
        point_jacobian_to(&config.body_jac_w[b], &r, &mut buffers.jac);
    }
}

/// Orientation of a body.
#[derive(Debug, Clone)]
pub struct OrientationTask {
    robot_index: usize,
    body_index: usize,
    orientation: Rotation3<f64>,
    buffers: TaskBuffers,
}

impl OrientationTask {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        orientation: UnitQuaternion<f64>,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(OrientationTask {
            robot_index,
            body_index,
            orientation: orientation.to_rotation_matrix(),
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.orientation)
    }
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.orientation = orientation.to_rotation_matrix();
    }
}

impl HighLevelTask for OrientationTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let current = config.body_pos_w[b].rotation.to_rotation_matrix();
        let buffers = &mut self.buffers;
        buffers
            .eval
            .copy_from(&rotation_error(&current, &self.orientation));
        buffers.speed.copy_from(&angular(&config.body_vel_w[b]));
        buffers
            .normal_acc
            .copy_from(&angular(&config.body_normal_acc_w[b]));
        buffers.jac.copy_from(&config.body_jac_w[b].rows(0, 3));
    }
}

/// Selects the frame in which a [`TransformTaskCommon`] expresses its error.
pub trait TransformFrame {
    /// rotation from world to the error frame for the controlled frame pose `x_0_p`
    fn world_to_frame(&self, x_0_p: &Isometry3<f64>) -> Rotation3<f64>;
    /// `true` if the error frame rotates with the controlled body
    fn is_moving(&self) -> bool;
}

/// Fixed frame given by its orientation `e_0_c` in world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldFrame {
    pub e_0_c: Rotation3<f64>,
}

impl TransformFrame for WorldFrame {
    fn world_to_frame(&self, _x_0_p: &Isometry3<f64>) -> Rotation3<f64> {
        self.e_0_c.inverse()
    }
    fn is_moving(&self) -> bool {
        false
    }
}

/// The controlled frame itself.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceFrame;

impl TransformFrame for SurfaceFrame {
    fn world_to_frame(&self, x_0_p: &Isometry3<f64>) -> Rotation3<f64> {
        x_0_p.rotation.to_rotation_matrix().inverse()
    }
    fn is_moving(&self) -> bool {
        true
    }
}

/// Pose of a frame rigidly attached to a body, as a 6d error `[rotation; translation]`.
///
/// The controlled frame is `x_b_p` in body coordinates, the target is the world pose `x_0_t`.
/// The error frame is chosen by `F`, see [`TransformTask`] and [`SurfaceTransformTask`].
#[derive(Debug, Clone)]
pub struct TransformTaskCommon<F: TransformFrame> {
    robot_index: usize,
    body_index: usize,
    x_0_t: Isometry3<f64>,
    x_b_p: Isometry3<f64>,
    frame: F,
    buffers: TaskBuffers,
}

/// Transform task with the error expressed in a fixed frame, world by default.
pub type TransformTask = TransformTaskCommon<WorldFrame>;
/// Transform task with the error expressed in the controlled frame.
pub type SurfaceTransformTask = TransformTaskCommon<SurfaceFrame>;

impl<F: TransformFrame> TransformTaskCommon<F> {
    fn build(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        x_0_t: Isometry3<f64>,
        x_b_p: Option<Isometry3<f64>>,
        frame: F,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(TransformTaskCommon {
            robot_index,
            body_index,
            x_0_t,
            x_b_p: x_b_p.unwrap_or_else(Isometry3::identity),
            frame,
            buffers: TaskBuffers::new(6, robots[robot_index].nr_dof()),
        })
    }

    pub fn target(&self) -> &Isometry3<f64> {
        &self.x_0_t
    }
    pub fn set_target(&mut self, x_0_t: Isometry3<f64>) {
        self.x_0_t = x_0_t;
    }
    pub fn x_b_p(&self) -> &Isometry3<f64> {
        &self.x_b_p
    }
    pub fn set_x_b_p(&mut self, x_b_p: Isometry3<f64>) {
        self.x_b_p = x_b_p;
    }
    pub fn frame(&self) -> &F {
        &self.frame
    }
}

impl TransformTaskCommon<WorldFrame> {
    /// # Arguments
    /// * `x_0_t` - target pose in world.
    /// * `x_b_p` - controlled frame in body coordinates. Defaults to the body frame.
    /// * `e_0_c` - orientation of the error frame in world. Defaults to identity.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new<X: Into<Option<Isometry3<f64>>>, E: Into<Option<Rotation3<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        x_0_t: Isometry3<f64>,
        x_b_p: X,
        e_0_c: E,
    ) -> TasksResult<Self> {
        let frame = WorldFrame {
            e_0_c: e_0_c.into().unwrap_or_else(Rotation3::identity),
        };
        Self::build(robots, robot_index, body_name, x_0_t, x_b_p.into(), frame)
    }
    pub fn e_0_c(&self) -> &Rotation3<f64> {
        &self.frame.e_0_c
    }
    pub fn set_e_0_c(&mut self, e_0_c: Rotation3<f64>) {
        self.frame.e_0_c = e_0_c;
    }
}

impl TransformTaskCommon<SurfaceFrame> {
    /// # Arguments
    /// * `x_0_t` - target pose in world.
    /// * `x_b_p` - controlled frame in body coordinates. Defaults to the body frame.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new<X: Into<Option<Isometry3<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        x_0_t: Isometry3<f64>,
        x_b_p: X,
    ) -> TasksResult<Self> {
        Self::build(robots, robot_index, body_name, x_0_t, x_b_p.into(), SurfaceFrame)
    }
}

impl<F: TransformFrame> HighLevelTask for TransformTaskCommon<F> {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let x_0_b = &config.body_pos_w[b];
        let x_0_p = x_0_b * self.x_b_p;
        let r = x_0_b.rotation * self.x_b_p.translation.vector;
        let body_vel = &config.body_vel_w[b];
        let w = angular(body_vel);
        let v = point_velocity(body_vel, &r);

        let rot_err = rotation_error(
            &x_0_p.rotation.to_rotation_matrix(),
            &self.x_0_t.rotation.to_rotation_matrix(),
        );
        let pos_err = x_0_p.translation.vector - self.x_0_t.translation.vector;
        let mut bias_ang = angular(&config.body_normal_acc_w[b]);
        let mut bias_lin = point_normal_acc(&config.body_normal_acc_w[b], body_vel, &r);

        let to_frame = self.frame.world_to_frame(&x_0_p);
        if self.frame.is_moving() {
            // derivative of the rotating projection
            bias_lin -= w.cross(&v);
            bias_ang -= w.cross(&w);
        }
        let m = to_frame.matrix();
        let buffers = &mut self.buffers;
        buffers.eval.copy_from(&stack(&(m * rot_err), &(m * pos_err)));
        buffers.speed.copy_from(&stack(&(m * w), &(m * v)));
        buffers
            .normal_acc
            .copy_from(&stack(&(m * bias_ang), &(m * bias_lin)));
        let body_jac = &config.body_jac_w[b];
        buffers.jac.rows_mut(0, 3).gemm(1., m, &body_jac.rows(0, 3), 0.);
        point_jacobian_to(body_jac, &r, &mut buffers.scratch);
        buffers.jac.rows_mut(3, 3).gemm(1., m, &buffers.scratch, 0.);
    }
}

fn stack(ang: &Vector3<f64>, lin: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(ang.x, ang.y, ang.z, lin.x, lin.y, lin.z)
}

/// Center of mass of a robot.
#[derive(Debug, Clone)]
pub struct CoMTask {
    robot_index: usize,
    com: Vector3<f64>,
    buffers: TaskBuffers,
}

impl CoMTask {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(robots: &[MultiBody], robot_index: usize, com: Vector3<f64>) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        Ok(CoMTask {
            robot_index,
            com,
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn com(&self) -> &Vector3<f64> {
        &self.com
    }
    pub fn set_com(&mut self, com: Vector3<f64>) {
        self.com = com;
    }
}

impl HighLevelTask for CoMTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let buffers = &mut self.buffers;
        buffers.eval.copy_from(&(config.com - self.com));
        buffers.speed.copy_from(&config.com_vel);
        buffers.normal_acc.copy_from(&config.com_normal_acc);
        buffers.jac.copy_from(&config.com_jac);
    }
}

/// Linear velocity of a point rigidly attached to a body.
///
/// The error is the velocity error itself, so the speed is zero and the stiffness of the gain
/// model acts as a velocity gain.
#[derive(Debug, Clone)]
pub struct LinVelocityTask {
    robot_index: usize,
    body_index: usize,
    velocity: Vector3<f64>,
    body_point: Vector3<f64>,
    buffers: TaskBuffers,
}

impl LinVelocityTask {
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new<P: Into<Option<Vector3<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        velocity: Vector3<f64>,
        body_point: P,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(LinVelocityTask {
            robot_index,
            body_index,
            velocity,
            body_point: body_point.into().unwrap_or_else(Vector3::zeros),
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn velocity(&self) -> &Vector3<f64> {
        &self.velocity
    }
    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
    }
    pub fn body_point(&self) -> &Vector3<f64> {
        &self.body_point
    }
    pub fn set_body_point(&mut self, body_point: Vector3<f64>) {
        self.body_point = body_point;
    }
}

impl HighLevelTask for LinVelocityTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let r = config.body_pos_w[b].rotation * self.body_point;
        let body_vel = &config.body_vel_w[b];
        let buffers = &mut self.buffers;
        buffers
            .eval
            .copy_from(&(point_velocity(body_vel, &r) - self.velocity));
        buffers.normal_acc.copy_from(&point_normal_acc(
            &config.body_normal_acc_w[b],
            body_vel,
            &r,
        ));
        point_jacobian_to(&config.body_jac_w[b], &r, &mut buffers.jac);
    }
}

/// Aligns a vector attached to a body with a target direction in world.
#[derive(Debug, Clone)]
pub struct VectorOrientationTask {
    robot_index: usize,
    body_index: usize,
    body_vector: Vector3<f64>,
    target: Vector3<f64>,
    buffers: TaskBuffers,
}

impl VectorOrientationTask {
    /// # Arguments
    /// * `body_vector` - controlled vector in body coordinates, normalized.
    /// * `target` - target direction in world, normalized.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        body_vector: Vector3<f64>,
        target: Vector3<f64>,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(VectorOrientationTask {
            robot_index,
            body_index,
            body_vector: body_vector.normalize(),
            target: target.normalize(),
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn body_vector(&self) -> &Vector3<f64> {
        &self.body_vector
    }
    pub fn set_body_vector(&mut self, body_vector: Vector3<f64>) {
        self.body_vector = body_vector.normalize();
    }
    pub fn target(&self) -> &Vector3<f64> {
        &self.target
    }
    pub fn set_target(&mut self, target: Vector3<f64>) {
        self.target = target.normalize();
    }
    /// controlled vector in world of the last update
    pub fn actual(&self) -> Vector3<f64> {
        self.buffers.eval.fixed_rows::<3>(0) + self.target
    }
}

impl HighLevelTask for VectorOrientationTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let a = config.body_pos_w[b].rotation * self.body_vector;
        let w = angular(&config.body_vel_w[b]);
        let bias = angular(&config.body_normal_acc_w[b]);
        let buffers = &mut self.buffers;
        buffers.eval.copy_from(&(a - self.target));
        buffers.speed.copy_from(&w.cross(&a));
        buffers
            .normal_acc
            .copy_from(&(bias.cross(&a) + w.cross(&w.cross(&a))));
        // d/dt a = w x a = -[a]x w
        buffers
            .jac
            .gemm(-1., &skew(&a), &config.body_jac_w[b].rows(0, 3), 0.);
    }
}

/// Centroidal momentum of a robot.
#[derive(Debug, Clone)]
pub struct MomentumTask {
    robot_index: usize,
    momentum: Vector6<f64>,
    buffers: TaskBuffers,
}

impl MomentumTask {
    /// # Arguments
    /// * `momentum` - target centroidal momentum `[angular; linear]`.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    pub fn new(robots: &[MultiBody], robot_index: usize, momentum: Vector6<f64>) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        Ok(MomentumTask {
            robot_index,
            momentum,
            buffers: TaskBuffers::new(6, robots[robot_index].nr_dof()),
        })
    }
    pub fn momentum(&self) -> &Vector6<f64> {
        &self.momentum
    }
    pub fn set_momentum(&mut self, momentum: Vector6<f64>) {
        self.momentum = momentum;
    }
}

impl HighLevelTask for MomentumTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let buffers = &mut self.buffers;
        buffers.eval.copy_from(&(config.momentum - self.momentum));
        buffers.speed.copy_from(&config.momentum);
        buffers.normal_acc.copy_from(&config.momentum_normal_acc);
        buffers.jac.copy_from(&config.momentum_jac);
    }
}


/// Orientation of a frame rigidly attached to a body, with the error expressed in that frame.
#[derive(Debug, Clone)]
pub struct SurfaceOrientationTask {
    robot_index: usize,
    body_index: usize,
    orientation: Rotation3<f64>,
    x_b_s: Isometry3<f64>,
    buffers: TaskBuffers,
}

impl SurfaceOrientationTask {
    /// # Arguments
    /// * `orientation` - target orientation of the surface frame in world.
    /// * `x_b_s` - surface frame in body coordinates.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        orientation: UnitQuaternion<f64>,
        x_b_s: Isometry3<f64>,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        Ok(SurfaceOrientationTask {
            robot_index,
            body_index,
            orientation: orientation.to_rotation_matrix(),
            x_b_s,
            buffers: TaskBuffers::new(3, robots[robot_index].nr_dof()),
        })
    }
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.orientation)
    }
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.orientation = orientation.to_rotation_matrix();
    }
    pub fn x_b_s(&self) -> &Isometry3<f64> {
        &self.x_b_s
    }
}

impl HighLevelTask for SurfaceOrientationTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let x_0_s = config.body_pos_w[b] * self.x_b_s;
        let current = x_0_s.rotation.to_rotation_matrix();
        let to_surface = current.inverse();
        let m = to_surface.matrix();
        let buffers = &mut self.buffers;
        buffers
            .eval
            .copy_from(&(m * rotation_error(&current, &self.orientation)));
        buffers
            .speed
            .copy_from(&(m * angular(&config.body_vel_w[b])));
        buffers
            .normal_acc
            .copy_from(&(m * angular(&config.body_normal_acc_w[b])));
        buffers
            .jac
            .gemm(1., m, &config.body_jac_w[b].rows(0, 3), 0.);
    }
}

fn check_in_front(point: &Vector3<f64>) -> TasksResult<()> {
    if point.iter().all(|x| x.is_finite()) && point.z > 0. {
        Ok(())
    } else {
        Err(TasksException::InvalidParameter {
            name: "point",
            message: format!("the point must lie in front of the camera, got {:?}", point),
        })
    }
}

/// Keeps a point at a reference position of the image plane of a camera attached to a body.
///
/// The point is fixed in world and given in camera coordinates, usually by a vision system.
/// Its normalized image coordinates are `s = (x / z, y / z)` and the error is
/// `s - point2d_ref`.
#[derive(Debug, Clone)]
pub struct GazeTask {
    robot_index: usize,
    body_index: usize,
    x_b_gaze: Isometry3<f64>,
    point: Vector3<f64>,
    point2d_ref: Vector2<f64>,
    buffers: TaskBuffers,
}

impl GazeTask {
    /// # Arguments
    /// * `point` - observed point in camera coordinates.
    /// * `x_b_gaze` - camera frame in body coordinates, looking along its z axis.
    /// * `point2d_ref` - reference image coordinates. Defaults to the image center.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if `body_name` is not part of the robot.
    /// * InvalidParameter if the point is not in front of the camera.
    pub fn new<R: Into<Option<Vector2<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        point: Vector3<f64>,
        x_b_gaze: Isometry3<f64>,
        point2d_ref: R,
    ) -> TasksResult<Self> {
        let body_index = body_index(robots, robot_index, body_name)?;
        check_in_front(&point)?;
        Ok(GazeTask {
            robot_index,
            body_index,
            x_b_gaze,
            point,
            point2d_ref: point2d_ref.into().unwrap_or_else(Vector2::zeros),
            buffers: TaskBuffers::new(2, robots[robot_index].nr_dof()),
        })
    }

    /// Creates the task from image coordinates and an estimate of the depth of the point.
    /// # Errors
    /// See [`new`](`Self::new`).
    pub fn from_image_point<R: Into<Option<Vector2<f64>>>>(
        robots: &[MultiBody],
        robot_index: usize,
        body_name: &str,
        point2d: Vector2<f64>,
        depth: f64,
        x_b_gaze: Isometry3<f64>,
        point2d_ref: R,
    ) -> TasksResult<Self> {
        let point = Vector3::new(point2d.x * depth, point2d.y * depth, depth);
        Self::new(robots, robot_index, body_name, point, x_b_gaze, point2d_ref)
    }

    pub fn point(&self) -> &Vector3<f64> {
        &self.point
    }
    /// # Errors
    /// * InvalidParameter if the point is not in front of the camera. The task keeps its point.
    pub fn set_point(&mut self, point: Vector3<f64>) -> TasksResult<()> {
        check_in_front(&point)?;
        self.point = point;
        Ok(())
    }
    /// # Errors
    /// * InvalidParameter if `depth` does not put the point in front of the camera.
    pub fn set_image_point(&mut self, point2d: Vector2<f64>, depth: f64) -> TasksResult<()> {
        self.set_point(Vector3::new(point2d.x * depth, point2d.y * depth, depth))
    }
    pub fn point2d_ref(&self) -> &Vector2<f64> {
        &self.point2d_ref
    }
    pub fn set_point2d_ref(&mut self, point2d_ref: Vector2<f64>) {
        self.point2d_ref = point2d_ref;
    }
    pub fn x_b_gaze(&self) -> &Isometry3<f64> {
        &self.x_b_gaze
    }
}

impl HighLevelTask for GazeTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let b = self.body_index;
        let x_0_b = &config.body_pos_w[b];
        let r = x_0_b.rotation * self.x_b_gaze.translation.vector;
        let to_camera = (x_0_b.rotation * self.x_b_gaze.rotation)
            .to_rotation_matrix()
            .inverse();
        let m = to_camera.matrix();
        let body_vel = &config.body_vel_w[b];
        let body_bias = &config.body_normal_acc_w[b];

        // camera motion in camera coordinates
        let w = m * angular(body_vel);
        let v = m * point_velocity(body_vel, &r);
        let w_bias = m * angular(body_bias);
        let v_bias = m * point_normal_acc(body_bias, body_vel, &r);

        // the point is fixed in world, so it moves opposite to the camera
        let p = &self.point;
        let p_dot = -v - w.cross(p);
        let p_bias = -v_bias - w_bias.cross(p) - w.cross(&p_dot) + w.cross(&v);

        let z = p.z;
        let proj = Matrix2x3::new(1. / z, 0., -p.x / (z * z), 0., 1. / z, -p.y / (z * z));
        let z_dot = p_dot.z;
        let proj_dot_p_dot = Vector2::new(
            2. * z_dot * (p.x * z_dot / z - p_dot.x) / (z * z),
            2. * z_dot * (p.y * z_dot / z - p_dot.y) / (z * z),
        );

        let buffers = &mut self.buffers;
        buffers
            .eval
            .copy_from(&(Vector2::new(p.x / z, p.y / z) - self.point2d_ref));
        buffers.speed.copy_from(&(proj * p_dot));
        buffers
            .normal_acc
            .copy_from(&(proj * p_bias + proj_dot_p_dot));
        // p_dot = -m J_lin + [p]x m J_ang
        let body_jac = &config.body_jac_w[b];
        point_jacobian_to(body_jac, &r, &mut buffers.scratch);
        buffers.jac.gemm(-1., &(proj * m), &buffers.scratch, 0.);
        buffers
            .jac
            .gemm(1., &(proj * skew(p) * m), &body_jac.rows(0, 3), 1.);
    }
}

/// Distance between two points rigidly attached to two bodies of a robot.
///
/// The error is `|p1 - p2| - distance`. While the points coincide the direction of the last
/// update is kept, starting with the z axis.
#[derive(Debug, Clone)]
pub struct RelativeDistTask {
    robot_index: usize,
    body_indexes: [usize; 2],
    body_points: [Vector3<f64>; 2],
    distance: f64,
    direction: Vector3<f64>,
    buffers: TaskBuffers,
}

fn check_distance(distance: f64) -> TasksResult<()> {
    if distance.is_finite() && distance >= 0. {
        Ok(())
    } else {
        Err(TasksException::InvalidParameter {
            name: "distance",
            message: format!("must be finite and not negative, got {}", distance),
        })
    }
}

impl RelativeDistTask {
    /// # Arguments
    /// * `body_point1`, `body_point2` - the points in the coordinates of their bodies.
    /// * `distance` - target distance between the points.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownBody if a body is not part of the robot.
    /// * InvalidParameter if `distance` is negative or not finite.
    pub fn new(
        robots: &[MultiBody],
        robot_index: usize,
        body1_name: &str,
        body_point1: Vector3<f64>,
        body2_name: &str,
        body_point2: Vector3<f64>,
        distance: f64,
    ) -> TasksResult<Self> {
        let body1 = body_index(robots, robot_index, body1_name)?;
        let body2 = body_index(robots, robot_index, body2_name)?;
        check_distance(distance)?;
        Ok(RelativeDistTask {
            robot_index,
            body_indexes: [body1, body2],
            body_points: [body_point1, body_point2],
            distance,
            direction: Vector3::z(),
            buffers: TaskBuffers::new(1, robots[robot_index].nr_dof()),
        })
    }
    pub fn distance(&self) -> f64 {
        self.distance
    }
    /// # Errors
    /// * InvalidParameter if `distance` is negative or not finite.
    pub fn set_distance(&mut self, distance: f64) -> TasksResult<()> {
        check_distance(distance)?;
        self.distance = distance;
        Ok(())
    }
    pub fn body_points(&self) -> &[Vector3<f64>; 2] {
        &self.body_points
    }
    /// Unit vector from point 2 to point 1 of the last update.
    pub fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }
}

impl HighLevelTask for RelativeDistTask {
    impl_buffer_access!();
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], _data: &SolverData) {
        let config = &configs[self.robot_index];
        let mut pos = [Vector3::zeros(); 2];
        let mut vel = [Vector3::zeros(); 2];
        let mut bias = [Vector3::zeros(); 2];
        let mut offsets = [Vector3::zeros(); 2];
        for i in 0..2 {
            let b = self.body_indexes[i];
            let x_0_b = &config.body_pos_w[b];
            let r = x_0_b.rotation * self.body_points[i];
            pos[i] = x_0_b.translation.vector + r;
            vel[i] = point_velocity(&config.body_vel_w[b], &r);
            bias[i] = point_normal_acc(&config.body_normal_acc_w[b], &config.body_vel_w[b], &r);
            offsets[i] = r;
        }
        let diff = pos[0] - pos[1];
        let dist = diff.norm();
        let separated = dist > f64::EPSILON;
        if separated {
            self.direction = diff / dist;
        }
        let u = self.direction;
        let dv = vel[0] - vel[1];
        // derivative of the direction
        let curvature = if separated {
            (dv.norm_squared() - u.dot(&dv).powi(2)) / dist
        } else {
            0.
        };

        let buffers = &mut self.buffers;
        buffers.eval[0] = dist - self.distance;
        buffers.speed[0] = u.dot(&dv);
        buffers.normal_acc[0] = u.dot(&(bias[0] - bias[1])) + curvature;
        let ut = u.transpose();
        point_jacobian_to(
            &config.body_jac_w[self.body_indexes[0]],
            &offsets[0],
            &mut buffers.scratch,
        );
        buffers.jac.gemm(1., &ut, &buffers.scratch, 0.);
        point_jacobian_to(
            &config.body_jac_w[self.body_indexes[1]],
            &offsets[1],
            &mut buffers.scratch,
        );
        buffers.jac.gemm(-1., &ut, &buffers.scratch, 1.);
    }
}
