// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the LinWeightTask.
use crate::multibody::{MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::Task;
use nalgebra::{DMatrix, DVector};

/// Wraps a task and changes its weight by a fixed step at every update until the objective
/// weight is reached.
///
/// The wrapped task starts with a zero weight, which avoids a jump of the QP solution when a
/// task is added.
pub struct LinWeightTask<T: Task> {
    task: T,
    step: f64,
    obj_weight: f64,
}

impl<T: Task> LinWeightTask<T> {
    /// # Arguments
    /// * `task` - wrapped task, its weight is set to zero.
    /// * `step` - weight change per update, its sign is ignored.
    /// * `obj_weight` - final weight.
    pub fn new(mut task: T, step: f64, obj_weight: f64) -> Self {
        task.set_weight(0.);
        LinWeightTask {
            task,
            step: step.abs(),
            obj_weight,
        }
    }
    pub fn task(&self) -> &T {
        &self.task
    }
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }
    pub fn obj_weight(&self) -> f64 {
        self.obj_weight
    }
    pub fn into_inner(self) -> T {
        self.task
    }
}

impl<T: Task> Task for LinWeightTask<T> {
    /// current weight of the wrapped task
    fn weight(&self) -> f64 {
        self.task.weight()
    }
    /// Sets the objective weight, the current weight keeps moving by steps.
    fn set_weight(&mut self, weight: f64) {
        self.obj_weight = weight;
    }
    fn begin(&self) -> (usize, usize) {
        self.task.begin()
    }
    fn update_nr_vars(&mut self, robots: &[MultiBody], data: &SolverData) {
        self.task.update_nr_vars(robots, data)
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        let current = self.task.weight();
        let next = if current < self.obj_weight {
            (current + self.step).min(self.obj_weight)
        } else {
            (current - self.step).max(self.obj_weight)
        };
        self.task.set_weight(next);
        self.task.update(robots, configs, data);
    }
    fn q(&self) -> &DMatrix<f64> {
        self.task.q()
    }
    fn c(&self) -> &DVector<f64> {
        self.task.c()
    }
}

#[cfg(test)]
mod tests {
    use crate::contact::contact_id::ContactId;
    use crate::multibody::{test_robots, MultiBodyConfig};
    use crate::qp::contact_task::{ContactObjective, ContactTask};
    use crate::qp::lin_weight::LinWeightTask;
    use crate::qp::solver_data::test_data::foot_contact;
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::Task;
    use approx::assert_relative_eq;

    #[test]
    fn weight_ramp() {
        let robots = vec![test_robots::floating(), test_robots::arm()];
        let configs: Vec<_> = robots.iter().map(MultiBodyConfig::new).collect();
        let contact = foot_contact(1, 1);
        let id: ContactId = contact.contact_id();
        let data = SolverData::new(&robots, vec![contact], vec![], &[]).unwrap();

        let mut task = LinWeightTask::new(ContactTask::new(id, ContactObjective::Max, 5.), 0.4, 1.);
        assert_eq!(task.weight(), 0.);
        task.update_nr_vars(&robots, &data);
        assert_eq!(task.begin(), (13, 17));

        task.update(&robots, &configs, &data);
        assert_relative_eq!(task.weight(), 0.4);
        assert_relative_eq!(task.c()[0], 0.4);
        task.update(&robots, &configs, &data);
        task.update(&robots, &configs, &data);
        assert_relative_eq!(task.weight(), 1.);
        task.update(&robots, &configs, &data);
        assert_relative_eq!(task.weight(), 1.);

        // ramps down to a lower objective
        task.set_weight(0.5);
        task.update(&robots, &configs, &data);
        assert_relative_eq!(task.weight(), 0.6);
        task.update(&robots, &configs, &data);
        assert_relative_eq!(task.weight(), 0.5);
        assert_relative_eq!(task.task().weight(), 0.5);
    }
}
