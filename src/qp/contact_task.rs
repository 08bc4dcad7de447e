// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the tasks acting on the force coefficients of a contact.
use crate::contact::contact_id::ContactId;
use crate::multibody::{MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::Task;
use crate::utils::critical_damping;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::Deserialize;
use serde::Serialize;

/// Column range and generator matrix of a contact in the current layout.
///
/// Returns `None` and logs a warning if the contact is not part of the layout.
pub(crate) fn contact_block(
    data: &SolverData,
    contact_id: &ContactId,
    task: &str,
) -> Option<(usize, DMatrix<f64>)> {
    let begin = data.lambda_begin_of(contact_id);
    let generators = data
        .unilateral_contact(contact_id)
        .map(|c| c.generators_jacobian(c.r1_cone()))
        .or_else(|| {
            data.bilateral_contact(contact_id)
                .map(|c| c.generators_jacobian(c.r1_cones()))
        });
    match (begin, generators) {
        (Some(begin), Some(generators)) => {
            debug!(
                "{} on contact {} uses lambda [{}, {}[",
                task,
                contact_id,
                begin,
                begin + generators.ncols()
            );
            Some((begin, generators))
        }
        _ => {
            warn!(
                "{}: contact {} is not part of the solver data, the task is disabled",
                task, contact_id
            );
            None
        }
    }
}

/// Whether a [`ContactTask`] favours or discourages the separation of a contact.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactObjective {
    /// decreases the force coefficients, the contact can be released smoothly
    Min,
    /// increases the force coefficients, the contact is kept
    Max,
}

/// Linear objective on all force coefficients of a contact.
///
/// `Q` is zero and `C = -w` for [`ContactObjective::Min`], `C = w` for [`ContactObjective::Max`].
pub struct ContactTask {
    contact_id: ContactId,
    objective: ContactObjective,
    weight: f64,
    begin: usize,
    q: DMatrix<f64>,
    c: DVector<f64>,
}

impl ContactTask {
    pub fn new(contact_id: ContactId, objective: ContactObjective, weight: f64) -> Self {
        ContactTask {
            contact_id,
            objective,
            weight,
            begin: 0,
            q: DMatrix::zeros(0, 0),
            c: DVector::zeros(0),
        }
    }
    pub fn contact_id(&self) -> ContactId {
        self.contact_id
    }
    pub fn objective(&self) -> ContactObjective {
        self.objective
    }
    pub fn set_objective(&mut self, objective: ContactObjective) {
        self.objective = objective;
    }
}

impl Task for ContactTask {
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
        let (begin, nr_lambda) = contact_block(data, &self.contact_id, "ContactTask")
            .map(|(begin, generators)| (begin, generators.ncols()))
            .unwrap_or((0, 0));
        self.begin = begin;
        self.q = DMatrix::zeros(nr_lambda, nr_lambda);
        self.c = DVector::zeros(nr_lambda);
    }
    fn update(&mut self, _robots: &[MultiBody], _configs: &[MultiBodyConfig], _data: &SolverData) {
        let value = match self.objective {
            ContactObjective::Min => -self.weight,
            ContactObjective::Max => self.weight,
        };
        self.c.fill(value);
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn c(&self) -> &DVector<f64> {
        &self.c
    }
}

/// Tracks a force applied on body 1 of a contact, expressed in body 1 coordinates.
///
/// With `G` the generator matrix of the contact, the task minimizes `w/2 |G lambda - f_des|^2`
/// where `f_des = force - k * error - d * errorD`. `error` and `errorD` are measured force
/// errors supplied by the caller, the damping defaults to `2 sqrt(k)`.
pub struct ContactForceTask {
    contact_id: ContactId,
    weight: f64,
    stiffness: f64,
    damping: f64,
    force: Vector3<f64>,
    error: Vector3<f64>,
    error_d: Vector3<f64>,
    begin: usize,
    generators: DMatrix<f64>,
    q: DMatrix<f64>,
    c: DVector<f64>,
}

impl ContactForceTask {
    pub fn new(contact_id: ContactId, force: Vector3<f64>, stiffness: f64, weight: f64) -> Self {
        ContactForceTask {
            contact_id,
            weight,
            stiffness,
            damping: critical_damping(stiffness),
            force,
            error: Vector3::zeros(),
            error_d: Vector3::zeros(),
            begin: 0,
            generators: DMatrix::zeros(3, 0),
            q: DMatrix::zeros(0, 0),
            c: DVector::zeros(0),
        }
    }
    pub fn contact_id(&self) -> ContactId {
        self.contact_id
    }
    pub fn force(&self) -> &Vector3<f64> {
        &self.force
    }
    pub fn set_force(&mut self, force: Vector3<f64>) {
        self.force = force;
    }
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
    pub fn damping(&self) -> f64 {
        self.damping
    }
    /// Sets the stiffness and the critical damping.
    pub fn set_stiffness(&mut self, stiffness: f64) {
        self.stiffness = stiffness;
        self.damping = critical_damping(stiffness);
    }
    pub fn set_gains(&mut self, stiffness: f64, damping: f64) {
        self.stiffness = stiffness;
        self.damping = damping;
    }
    pub fn set_error(&mut self, error: Vector3<f64>) {
        self.error = error;
    }
    pub fn set_error_d(&mut self, error_d: Vector3<f64>) {
        self.error_d = error_d;
    }
}

impl Task for ContactForceTask {
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
        let (begin, generators) = contact_block(data, &self.contact_id, "ContactForceTask")
            .unwrap_or_else(|| (0, DMatrix::zeros(3, 0)));
        let nr_lambda = generators.ncols();
        self.begin = begin;
        self.generators = generators;
        self.q = DMatrix::zeros(nr_lambda, nr_lambda);
        self.c = DVector::zeros(nr_lambda);
    }
    fn update(&mut self, _robots: &[MultiBody], _configs: &[MultiBodyConfig], _data: &SolverData) {
        let desired = self.force - self.error * self.stiffness - self.error_d * self.damping;
        self.q
            .gemm_tr(self.weight, &self.generators, &self.generators, 0.);
        self.c.gemv_tr(self.weight, &self.generators, &desired, 0.);
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
    use crate::contact::contact_id::ContactId;
    use crate::multibody::{test_robots, MultiBody, MultiBodyConfig};
    use crate::qp::contact_task::{ContactForceTask, ContactObjective, ContactTask};
    use crate::qp::solver_data::test_data::foot_contact;
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::Task;
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Vector3};

    fn setup() -> (Vec<MultiBody>, Vec<MultiBodyConfig>, SolverData) {
        let robots = vec![test_robots::floating(), test_robots::arm()];
        let configs = robots.iter().map(MultiBodyConfig::new).collect();
        let data = SolverData::new(
            &robots,
            vec![foot_contact(2, 4), foot_contact(1, 2)],
            vec![],
            &[],
        )
        .unwrap();
        (robots, configs, data)
    }

    #[test]
    fn min_max() {
        let (robots, configs, data) = setup();
        let id = foot_contact(2, 4).contact_id();
        let mut task = ContactTask::new(id, ContactObjective::Min, 2.);
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        // the contact on body 1 comes first
        assert_eq!(task.begin(), (21, 37));
        assert_eq!(*task.c(), DVector::from_element(16, -2.));
        assert_eq!(task.q().shape(), (16, 16));

        task.set_objective(ContactObjective::Max);
        task.update(&robots, &configs, &data);
        assert_eq!(*task.c(), DVector::from_element(16, 2.));
    }

    #[test]
    fn missing_contact_is_empty() {
        let (robots, configs, data) = setup();
        let mut task = ContactTask::new(ContactId::new(0, 1, 7, 0, 0), ContactObjective::Max, 1.);
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        assert_eq!(task.c().len(), 0);
        assert_eq!(task.begin(), (0, 0));
    }

    #[test]
    fn force_tracking() {
        let (robots, configs, data) = setup();
        let contact = foot_contact(1, 2);
        let mut task = ContactForceTask::new(contact.contact_id(), Vector3::new(0., 0., 10.), 4., 1.);
        assert_relative_eq!(task.damping(), 4.);
        task.update_nr_vars(&robots, &data);
        task.update(&robots, &configs, &data);
        assert_eq!(task.begin(), (13, 21));

        let g = contact.generators_jacobian(contact.r1_cone());
        assert_relative_eq!(*task.q(), g.transpose() * &g, epsilon = 1e-12);
        let expected = g.transpose() * Vector3::new(0., 0., 10.);
        assert_relative_eq!(*task.c(), expected, epsilon = 1e-12);

        let c_buffer = task.c().as_ptr();
        task.set_error(Vector3::new(0., 0., 1.));
        task.update(&robots, &configs, &data);
        let expected = g.transpose() * Vector3::new(0., 0., 6.);
        assert_relative_eq!(*task.c(), expected, epsilon = 1e-12);
        assert_eq!(task.c().as_ptr(), c_buffer);
    }
}
