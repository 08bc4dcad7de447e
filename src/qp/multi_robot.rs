// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the tasks spanning several robots.
use crate::exception::TasksException;
use crate::multibody::{check_robot_index, MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::Task;
use crate::utils::critical_damping;
use crate::TasksResult;
use log::debug;
use nalgebra::{DMatrix, DVector, Vector3};

/// Critically damped set point on the center of mass of several robots.
///
/// The task spans the joint accelerations of all robots. The Jacobian of robot `r` is its CoM
/// Jacobian scaled by `m_r / M`, `M` being the total mass of the selected robots.
pub struct MultiCoMTask {
    robot_indexes: Vec<usize>,
    masses: Vec<f64>,
    total_mass: f64,
    com: Vector3<f64>,
    stiffness: f64,
    damping: f64,
    weight: f64,
    dim_weight: Vector3<f64>,
    eval: Vector3<f64>,
    speed: Vector3<f64>,
    normal_acc: Vector3<f64>,
    jac: DMatrix<f64>,
    weighted_jac: DMatrix<f64>,
    q: DMatrix<f64>,
    c: DVector<f64>,
}

impl MultiCoMTask {
    /// # Arguments
    /// * `robot_indexes` - robots taking part in the CoM.
    /// * `com` - target center of mass in world.
    /// # Errors
    /// * RobotIndexError if an index is not part of `robots`.
    /// * InvalidParameter if no robot is given or the robots have no mass.
    pub fn new(
        robots: &[MultiBody],
        robot_indexes: Vec<usize>,
        com: Vector3<f64>,
        stiffness: f64,
        weight: f64,
    ) -> TasksResult<Self> {
        let mut masses = Vec::with_capacity(robot_indexes.len());
        for &r in robot_indexes.iter() {
            check_robot_index(robots, r)?;
            masses.push(robots[r].total_mass());
        }
        let total_mass: f64 = masses.iter().sum();
        if !(total_mass > 0.) {
            return Err(TasksException::InvalidParameter {
                name: "robot_indexes",
                message: "the selected robots must have a positive mass".to_string(),
            });
        }
        Ok(MultiCoMTask {
            robot_indexes,
            masses,
            total_mass,
            com,
            stiffness,
            damping: critical_damping(stiffness),
            weight,
            dim_weight: Vector3::from_element(1.),
            eval: Vector3::zeros(),
            speed: Vector3::zeros(),
            normal_acc: Vector3::zeros(),
            jac: DMatrix::zeros(3, 0),
            weighted_jac: DMatrix::zeros(3, 0),
            q: DMatrix::zeros(0, 0),
            c: DVector::zeros(0),
        })
    }

    pub fn robot_indexes(&self) -> &[usize] {
        &self.robot_indexes
    }
    pub fn com(&self) -> &Vector3<f64> {
        &self.com
    }
    pub fn set_com(&mut self, com: Vector3<f64>) {
        self.com = com;
    }
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
    pub fn damping(&self) -> f64 {
        self.damping
    }
    pub fn set_stiffness(&mut self, stiffness: f64) {
        self.stiffness = stiffness;
        self.damping = critical_damping(stiffness);
    }
    pub fn set_gains(&mut self, stiffness: f64, damping: f64) {
        self.stiffness = stiffness;
        self.damping = damping;
    }
    pub fn dim_weight(&self) -> &Vector3<f64> {
        &self.dim_weight
    }
    pub fn set_dim_weight(&mut self, dim_weight: Vector3<f64>) {
        self.dim_weight = dim_weight;
    }
    /// CoM error of the last update
    pub fn eval(&self) -> &Vector3<f64> {
        &self.eval
    }
    pub fn speed(&self) -> &Vector3<f64> {
        &self.speed
    }
    /// 3 x total_alpha_d Jacobian of the last update
    pub fn jac(&self) -> &DMatrix<f64> {
        &self.jac
    }
}

impl Task for MultiCoMTask {
    fn weight(&self) -> f64 {
        self.weight
    }
    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
    fn begin(&self) -> (usize, usize) {
        (0, self.jac.ncols())
    }
    fn update_nr_vars(&mut self, _robots: &[MultiBody], data: &SolverData) {
        let n = data.total_alpha_d();
        debug!("MultiCoMTask of robots {:?} spans [0, {}[", self.robot_indexes, n);
        self.jac = DMatrix::zeros(3, n);
        self.weighted_jac = DMatrix::zeros(3, n);
        self.q = DMatrix::zeros(n, n);
        self.c = DVector::zeros(n);
    }
    fn update(&mut self, _robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        let mut com = Vector3::zeros();
        self.speed.fill(0.);
        self.normal_acc.fill(0.);
        for (&r, &m) in self.robot_indexes.iter().zip(self.masses.iter()) {
            let ratio = m / self.total_mass;
            let config = &configs[r];
            com += config.com * ratio;
            self.speed += config.com_vel * ratio;
            self.normal_acc += config.com_normal_acc * ratio;
            let mut block = self.jac.columns_mut(data.alpha_d_begin(r), data.alpha_d(r));
            block.copy_from(&config.com_jac);
            block *= ratio;
        }
        self.eval = com - self.com;

        let acc = -self.eval * self.stiffness - self.speed * self.damping - self.normal_acc;
        let weighted_acc = acc.component_mul(&self.dim_weight);
        self.weighted_jac.copy_from(&self.jac);
        for (mut row, w) in self.weighted_jac.row_iter_mut().zip(self.dim_weight.iter()) {
            row *= *w;
        }
        self.q.gemm_tr(self.weight, &self.jac, &self.weighted_jac, 0.);
        self.c.gemv_tr(self.weight, &self.jac, &weighted_acc, 0.);
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn c(&self) -> &DVector<f64> {
        &self.c
    }
}
