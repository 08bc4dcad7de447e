// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the JointsSelector which restricts a task to a subset of the joints.
use crate::exception::TasksException;
use crate::multibody::{check_robot_index, MultiBody, MultiBodyConfig};
use crate::qp::solver_data::SolverData;
use crate::qp::task::HighLevelTask;
use crate::TasksResult;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Dof ranges `(start, count)` relative to the first dof of a joint, indexed by joint name.
pub type DofRanges = BTreeMap<String, Vec<(usize, usize)>>;

/// Contiguous block of selected velocity variables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SelectedData {
    pub pos_in_dof: usize,
    pub dof: usize,
}

/// Wraps a [`HighLevelTask`] and zeroes the Jacobian columns of the joints which are not selected.
///
/// The Jacobian keeps the `dim x nr_dof` shape of the wrapped task so it can be used by every
/// gain model. Error, speed and normal acceleration are forwarded unchanged.
pub struct JointsSelector<H: HighLevelTask> {
    hl_task: H,
    jac: DMatrix<f64>,
    selected_joints: Vec<SelectedData>,
}

impl<H: HighLevelTask> JointsSelector<H> {
    /// Selects the listed joints.
    /// # Arguments
    /// * `active_joints_name` - names of the joints the task may use.
    /// * `active_dofs` - restricts a listed joint to some of its dofs. Joints without entry keep
    /// all of their dofs.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownJoint if a name is not a joint of the robot.
    /// * InvalidDofRange if a range exceeds the dof of its joint.
    pub fn active_joints<'a, S: AsRef<str>, D: Into<Option<&'a DofRanges>>>(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        active_joints_name: &[S],
        active_dofs: D,
    ) -> TasksResult<Self> {
        JointsSelector::new(robots, robot_index, hl_task, active_joints_name, active_dofs)
    }

    /// Selects every joint except the listed ones.
    /// # Arguments
    /// * `unactive_joints_name` - names of the joints the task must not use.
    /// * `unactive_dofs` - only deactivates some dofs of a listed joint, the other dofs of the
    /// joint stay selected.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * UnknownJoint if a name is not a joint of the robot.
    /// * InvalidDofRange if a range exceeds the dof of its joint.
    pub fn unactive_joints<'a, S: AsRef<str>, D: Into<Option<&'a DofRanges>>>(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        unactive_joints_name: &[S],
        unactive_dofs: D,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let mb = &robots[robot_index];
        let unactive_dofs = unactive_dofs.into();
        let mut unactive = Vec::with_capacity(unactive_joints_name.len());
        for name in unactive_joints_name {
            unactive.push(mb.joint_index_by_name(name.as_ref())?);
        }

        let mut selected = Vec::new();
        for (index, joint) in mb.joints().iter().enumerate() {
            let pos_in_dof = mb.joint_pos_in_dof(index);
            if !unactive.contains(&index) {
                selected.push(SelectedData {
                    pos_in_dof,
                    dof: joint.dof(),
                });
                continue;
            }
            if let Some(ranges) = unactive_dofs.and_then(|d| d.get(&joint.name)) {
                check_ranges(&joint.name, joint.dof(), ranges)?;
                for (start, count) in complement(joint.dof(), ranges) {
                    selected.push(SelectedData {
                        pos_in_dof: pos_in_dof + start,
                        dof: count,
                    });
                }
            }
        }
        Ok(JointsSelector::from_selection(mb, hl_task, selected))
    }

    /// Same as [`active_joints`](`Self::active_joints`).
    /// # Errors
    /// See [`active_joints`](`Self::active_joints`).
    pub fn new<'a, S: AsRef<str>, D: Into<Option<&'a DofRanges>>>(
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
        selected_joints_name: &[S],
        active_dofs: D,
    ) -> TasksResult<Self> {
        check_robot_index(robots, robot_index)?;
        let mb = &robots[robot_index];
        let active_dofs = active_dofs.into();
        let mut selected = Vec::new();
        for name in selected_joints_name {
            let index = mb.joint_index_by_name(name.as_ref())?;
            let joint = mb.joint(index);
            let pos_in_dof = mb.joint_pos_in_dof(index);
            match active_dofs.and_then(|d| d.get(&joint.name)) {
                Some(ranges) => {
                    check_ranges(&joint.name, joint.dof(), ranges)?;
                    selected.extend(ranges.iter().map(|(start, count)| SelectedData {
                        pos_in_dof: pos_in_dof + start,
                        dof: *count,
                    }));
                }
                None => selected.push(SelectedData {
                    pos_in_dof,
                    dof: joint.dof(),
                }),
            }
        }
        Ok(JointsSelector::from_selection(mb, hl_task, selected))
    }

    fn from_selection(mb: &MultiBody, hl_task: H, mut selected: Vec<SelectedData>) -> Self {
        selected.retain(|s| s.dof > 0);
        selected.sort_by_key(|s| s.pos_in_dof);
        JointsSelector {
            jac: DMatrix::zeros(hl_task.dim(), mb.nr_dof()),
            hl_task,
            selected_joints: selected,
        }
    }

    /// selected blocks ordered by `pos_in_dof`
    pub fn selected_joints(&self) -> &[SelectedData] {
        &self.selected_joints
    }
    pub fn hl_task(&self) -> &H {
        &self.hl_task
    }
    pub fn hl_task_mut(&mut self) -> &mut H {
        &mut self.hl_task
    }
}

fn check_ranges(joint: &str, dof: usize, ranges: &[(usize, usize)]) -> TasksResult<()> {
    for &(start, count) in ranges {
        if start + count > dof {
            return Err(TasksException::InvalidDofRange {
                joint: joint.to_string(),
                start,
                count,
                dof,
            });
        }
    }
    Ok(())
}

/// ranges of `[0, dof[` not covered by `ranges`
fn complement(dof: usize, ranges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable();
    let mut cursor = 0;
    let mut out = Vec::new();
    for (start, count) in sorted {
        if start > cursor {
            out.push((cursor, start - cursor));
        }
        cursor = cursor.max(start + count);
    }
    if cursor < dof {
        out.push((cursor, dof - cursor));
    }
    out
}

impl<H: HighLevelTask> HighLevelTask for JointsSelector<H> {
    fn dim(&self) -> usize {
        self.hl_task.dim()
    }
    fn update(&mut self, robots: &[MultiBody], configs: &[MultiBodyConfig], data: &SolverData) {
        self.hl_task.update(robots, configs, data);
        let full = self.hl_task.jac();
        self.jac.fill(0.);
        for s in self.selected_joints.iter() {
            self.jac
                .columns_mut(s.pos_in_dof, s.dof)
                .copy_from(&full.columns(s.pos_in_dof, s.dof));
        }
    }
    fn jac(&self) -> &DMatrix<f64> {
        &self.jac
    }
    fn eval(&self) -> &DVector<f64> {
        self.hl_task.eval()
    }
    fn speed(&self) -> &DVector<f64> {
        self.hl_task.speed()
    }
    fn normal_acc(&self) -> &DVector<f64> {
        self.hl_task.normal_acc()
    }
}

#[cfg(test)]
mod tests {
    use crate::exception::TasksException;
    use crate::multibody::{test_robots, MultiBody, MultiBodyConfig};
    use crate::qp::joints_selector::{DofRanges, JointsSelector, SelectedData};
    use crate::qp::solver_data::SolverData;
    use crate::qp::task::{HighLevelTask, MockHighLevelTask};
    use nalgebra::{DMatrix, DVector};

    fn mock_task(nr_dof: usize) -> MockHighLevelTask {
        let mut hl = MockHighLevelTask::new();
        hl.expect_dim().return_const(2usize);
        hl.expect_jac()
            .return_const(DMatrix::from_fn(2, nr_dof, |r, c| (r * nr_dof + c + 1) as f64));
        hl.expect_eval().return_const(DVector::from_vec(vec![0.5, -1.]));
        hl.expect_update().return_const(());
        hl
    }

    fn update<H: HighLevelTask>(sel: &mut JointsSelector<H>, robots: &[MultiBody]) {
        let configs: Vec<_> = robots.iter().map(MultiBodyConfig::new).collect();
        let data = SolverData::new(robots, vec![], vec![], &[]).unwrap();
        sel.update(robots, &configs, &data);
    }

    #[test]
    fn active_joints_are_sorted() {
        let robots = vec![test_robots::arm()];
        let mut sel =
            JointsSelector::active_joints(&robots, 0, mock_task(3), &["j3", "j1"], None).unwrap();
        assert_eq!(
            sel.selected_joints(),
            &[
                SelectedData {
                    pos_in_dof: 0,
                    dof: 1
                },
                SelectedData {
                    pos_in_dof: 2,
                    dof: 1
                }
            ]
        );
        update(&mut sel, &robots);
        assert_eq!(
            *sel.jac(),
            DMatrix::from_row_slice(2, 3, &[1., 0., 3., 4., 0., 6.])
        );
        assert_eq!(*sel.eval(), DVector::from_vec(vec![0.5, -1.]));
        assert_eq!(sel.dim(), 2);
    }

    #[test]
    fn unactive_joints() {
        let robots = vec![test_robots::arm()];
        let mut sel =
            JointsSelector::unactive_joints(&robots, 0, mock_task(3), &["j2"], None).unwrap();
        update(&mut sel, &robots);
        assert_eq!(
            *sel.jac(),
            DMatrix::from_row_slice(2, 3, &[1., 0., 3., 4., 0., 6.])
        );
    }

    #[test]
    fn dof_ranges() {
        let robots = vec![test_robots::floating()];
        let mut dofs = DofRanges::new();
        dofs.insert("ball".to_string(), vec![(1, 1)]);
        let sel =
            JointsSelector::unactive_joints(&robots, 0, mock_task(10), &["ball"], &dofs).unwrap();
        let blocks: Vec<_> = sel
            .selected_joints()
            .iter()
            .map(|s| (s.pos_in_dof, s.dof))
            .collect();
        assert_eq!(blocks, vec![(0, 6), (6, 1), (8, 1), (9, 1)]);

        let mut sel =
            JointsSelector::active_joints(&robots, 0, mock_task(10), &["ball"], &dofs).unwrap();
        update(&mut sel, &robots);
        let jac = sel.jac();
        assert_eq!(jac[(0, 7)], 8.);
        assert_eq!(jac.column(6).sum() + jac.column(8).sum(), 0.);
    }

    #[test]
    fn invalid_selection() {
        let robots = vec![test_robots::floating()];
        let mut dofs = DofRanges::new();
        dofs.insert("ball".to_string(), vec![(2, 2)]);
        assert_eq!(
            JointsSelector::active_joints(&robots, 0, mock_task(10), &["ball"], &dofs).err(),
            Some(TasksException::InvalidDofRange {
                joint: "ball".to_string(),
                start: 2,
                count: 2,
                dof: 3
            })
        );
        assert!(matches!(
            JointsSelector::unactive_joints(&robots, 0, mock_task(10), &["knee"], None),
            Err(TasksException::UnknownJoint { .. })
        ));
    }
}
