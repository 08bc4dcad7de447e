// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the SolverData type describing the layout of the decision vector.
use crate::contact::bilateral_contact::BilateralContact;
use crate::contact::contact_id::ContactId;
use crate::contact::unilateral_contact::UnilateralContact;
use crate::exception::TasksException;
use crate::multibody::{check_robot_index, MultiBody};
use crate::TasksResult;
use log::debug;
use std::collections::BTreeSet;

/// Partition of the decision vector of the QP.
///
/// The decision vector is stacked as
/// ```text
/// [ alphaD robot 0 | ... | alphaD robot n | lambda unilateral | lambda bilateral | torque ]
/// ```
/// Unilateral and bilateral contacts are each sorted by [`ContactId`], torque blocks follow the
/// robot order. The layout is rebuilt from scratch whenever the set of robots, contacts or torque
/// variables changes. Afterwards every task has to be told with
/// [`Task::update_nr_vars`](`crate::qp::task::Task::update_nr_vars`).
#[derive(Debug, Clone, Default)]
pub struct SolverData {
    alpha_d: Vec<usize>,
    alpha_d_begin: Vec<usize>,
    total_alpha_d: usize,

    uni_cont: Vec<UnilateralContact>,
    bi_cont: Vec<BilateralContact>,
    lambda_begin: Vec<usize>,
    nr_uni_lambda: usize,
    nr_bi_lambda: usize,
    total_lambda: usize,

    torque_begin: Vec<Option<usize>>,
    total_torque: usize,

    nr_vars: usize,
}

impl SolverData {
    /// Computes the layout.
    /// # Arguments
    /// * `robots` - every robot of the controller.
    /// * `uni_cont` - active unilateral contacts.
    /// * `bi_cont` - active bilateral contacts.
    /// * `torque_robots` - robots whose joint torques are decision variables.
    /// # Errors
    /// * InvalidContact if a contact id is used twice or refers to an unknown robot.
    /// * RobotIndexError if a torque robot is not part of `robots`.
    pub fn new(
        robots: &[MultiBody],
        mut uni_cont: Vec<UnilateralContact>,
        mut bi_cont: Vec<BilateralContact>,
        torque_robots: &[usize],
    ) -> TasksResult<Self> {
        uni_cont.sort_by_key(|c| c.contact_id());
        bi_cont.sort_by_key(|c| c.contact_id());

        let mut ids = BTreeSet::new();
        for id in uni_cont
            .iter()
            .map(|c| c.contact_id())
            .chain(bi_cont.iter().map(|c| c.contact_id()))
        {
            check_contact_robots(robots, &id)?;
            if !ids.insert(id) {
                return Err(TasksException::InvalidContact {
                    message: format!("contact {} is declared twice", id),
                });
            }
        }
        for robot in torque_robots.iter() {
            check_robot_index(robots, *robot)?;
        }

        let alpha_d: Vec<usize> = robots.iter().map(|mb| mb.nr_dof()).collect();
        let mut alpha_d_begin = Vec::with_capacity(robots.len());
        let mut pos = 0;
        for dof in alpha_d.iter() {
            alpha_d_begin.push(pos);
            pos += dof;
        }
        let total_alpha_d = pos;

        let mut lambda_begin = Vec::with_capacity(uni_cont.len() + bi_cont.len());
        let mut nr_uni_lambda = 0;
        for c in uni_cont.iter() {
            lambda_begin.push(pos);
            pos += c.nr_lambda();
            nr_uni_lambda += c.nr_lambda();
        }
        let mut nr_bi_lambda = 0;
        for c in bi_cont.iter() {
            lambda_begin.push(pos);
            pos += c.nr_lambda();
            nr_bi_lambda += c.nr_lambda();
        }

        let mut torque_begin = vec![None; robots.len()];
        let mut total_torque = 0;
        for (r, mb) in robots.iter().enumerate() {
            if torque_robots.contains(&r) {
                torque_begin[r] = Some(pos);
                pos += mb.nr_dof();
                total_torque += mb.nr_dof();
            }
        }

        debug!(
            "solver data: {} robots, {} unilateral and {} bilateral contacts, {} variables",
            robots.len(),
            uni_cont.len(),
            bi_cont.len(),
            pos
        );

        Ok(SolverData {
            alpha_d,
            alpha_d_begin,
            total_alpha_d,
            uni_cont,
            bi_cont,
            lambda_begin,
            nr_uni_lambda,
            nr_bi_lambda,
            total_lambda: nr_uni_lambda + nr_bi_lambda,
            torque_begin,
            total_torque,
            nr_vars: pos,
        })
    }

    /// size of the decision vector
    pub fn nr_vars(&self) -> usize {
        self.nr_vars
    }
    pub fn nr_robots(&self) -> usize {
        self.alpha_d.len()
    }
    /// number of joint acceleration variables of one robot
    pub fn alpha_d(&self, robot_index: usize) -> usize {
        self.alpha_d[robot_index]
    }
    /// first column of the joint accelerations of one robot
    pub fn alpha_d_begin(&self, robot_index: usize) -> usize {
        self.alpha_d_begin[robot_index]
    }
    pub fn total_alpha_d(&self) -> usize {
        self.total_alpha_d
    }
    /// first column of the force coefficients
    pub fn lambda_begin(&self) -> usize {
        self.total_alpha_d
    }
    pub fn total_lambda(&self) -> usize {
        self.total_lambda
    }
    pub fn nr_uni_lambda(&self) -> usize {
        self.nr_uni_lambda
    }
    pub fn nr_bi_lambda(&self) -> usize {
        self.nr_bi_lambda
    }
    pub fn unilateral_contacts(&self) -> &[UnilateralContact] {
        &self.uni_cont
    }
    pub fn bilateral_contacts(&self) -> &[BilateralContact] {
        &self.bi_cont
    }
    pub fn nr_contacts(&self) -> usize {
        self.uni_cont.len() + self.bi_cont.len()
    }
    /// ids of all contacts in decision vector order
    pub fn all_contacts(&self) -> Vec<ContactId> {
        self.uni_cont
            .iter()
            .map(|c| c.contact_id())
            .chain(self.bi_cont.iter().map(|c| c.contact_id()))
            .collect()
    }
    /// first column of the force coefficients of the contact at `index` of [`all_contacts`](`Self::all_contacts`)
    pub fn lambda_begin_at(&self, index: usize) -> usize {
        self.lambda_begin[index]
    }
    /// first column of the force coefficients of a contact
    pub fn lambda_begin_of(&self, id: &ContactId) -> Option<usize> {
        self.contact_index(id).map(|i| self.lambda_begin[i])
    }
    /// position of a contact in [`all_contacts`](`Self::all_contacts`)
    pub fn contact_index(&self, id: &ContactId) -> Option<usize> {
        if let Ok(i) = self.uni_cont.binary_search_by_key(id, |c| c.contact_id()) {
            return Some(i);
        }
        self.bi_cont
            .binary_search_by_key(id, |c| c.contact_id())
            .ok()
            .map(|i| i + self.uni_cont.len())
    }
    pub fn unilateral_contact(&self, id: &ContactId) -> Option<&UnilateralContact> {
        self.uni_cont
            .binary_search_by_key(id, |c| c.contact_id())
            .ok()
            .map(|i| &self.uni_cont[i])
    }
    pub fn bilateral_contact(&self, id: &ContactId) -> Option<&BilateralContact> {
        self.bi_cont
            .binary_search_by_key(id, |c| c.contact_id())
            .ok()
            .map(|i| &self.bi_cont[i])
    }
    /// first column of the torques of a robot, `None` if they are not decision variables
    pub fn torque_begin(&self, robot_index: usize) -> Option<usize> {
        self.torque_begin.get(robot_index).copied().flatten()
    }
    pub fn total_torque(&self) -> usize {
        self.total_torque
    }
}

fn check_contact_robots(robots: &[MultiBody], id: &ContactId) -> TasksResult<()> {
    let valid = |index: i32| index >= 0 && (index as usize) < robots.len();
    if !valid(id.r1_index) || !valid(id.r2_index) {
        return Err(TasksException::InvalidContact {
            message: format!("contact {} refers to an unknown robot", id),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use crate::contact::bilateral_contact::BilateralContact;
    use crate::contact::contact_id::ContactId;
    use crate::exception::TasksException;
    use crate::multibody::test_robots::{arm, floating};
    use crate::qp::solver_data::test_data::foot_contact;
    use crate::qp::solver_data::SolverData;

    #[test]
    fn layout_order() {
        let robots = vec![floating(), arm()];
        let data = SolverData::new(
            &robots,
            vec![foot_contact(2, 4), foot_contact(1, 2)],
            vec![BilateralContact::from(foot_contact(0, 1))],
            &[0],
        )
        .unwrap();
        assert_eq!(data.alpha_d(0), 10);
        assert_eq!(data.alpha_d(1), 3);
        assert_eq!(data.alpha_d_begin(1), 10);
        assert_eq!(data.total_alpha_d(), 13);
        assert_eq!(data.lambda_begin(), 13);
        // sorted by contact id
        assert_eq!(
            data.all_contacts(),
            vec![
                ContactId::new(0, 1, 1, 0, 0),
                ContactId::new(0, 1, 2, 0, 0),
                ContactId::new(0, 1, 0, 0, 0)
            ]
        );
        assert_eq!(data.lambda_begin_at(0), 13);
        assert_eq!(data.lambda_begin_at(1), 21);
        assert_eq!(data.lambda_begin_at(2), 37);
        assert_eq!(data.nr_uni_lambda(), 24);
        assert_eq!(data.nr_bi_lambda(), 4);
        assert_eq!(data.torque_begin(0), Some(41));
        assert_eq!(data.torque_begin(1), None);
        assert_eq!(data.nr_vars(), 51);
        assert_eq!(
            data.lambda_begin_of(&ContactId::new(0, 1, 0, 0, 0)),
            Some(37)
        );
        assert_eq!(data.lambda_begin_of(&ContactId::new(0, 1, 9, 0, 0)), None);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let robots = vec![floating(), arm()];
        let a = SolverData::new(
            &robots,
            vec![foot_contact(2, 4), foot_contact(1, 2)],
            vec![],
            &[1],
        )
        .unwrap();
        let b = SolverData::new(
            &robots,
            vec![foot_contact(1, 2), foot_contact(2, 4)],
            vec![],
            &[1],
        )
        .unwrap();
        assert_eq!(a.all_contacts(), b.all_contacts());
        for i in 0..a.nr_contacts() {
            assert_eq!(a.lambda_begin_at(i), b.lambda_begin_at(i));
        }
        assert_eq!(a.torque_begin(1), b.torque_begin(1));
        assert_eq!(a.nr_vars(), b.nr_vars());
    }

    #[test]
    fn duplicated_contact() {
        let robots = vec![floating(), arm()];
        let result = SolverData::new(
            &robots,
            vec![foot_contact(1, 2)],
            vec![BilateralContact::from(foot_contact(1, 1))],
            &[],
        );
        assert!(matches!(result, Err(TasksException::InvalidContact { .. })));
    }

    #[test]
    fn unknown_robot() {
        let robots = vec![floating()];
        assert!(matches!(
            SolverData::new(&robots, vec![foot_contact(1, 2)], vec![], &[]),
            Err(TasksException::InvalidContact { .. })
        ));
        assert_eq!(
            SolverData::new(&robots, vec![], vec![], &[3]).unwrap_err(),
            TasksException::RobotIndexError {
                index: 3,
                nr_robots: 1
            }
        );
    }
}
