// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the rigid-body model types which are shared with the external kinematics.
//!
//! This library does not compute kinematics or dynamics. A [`MultiBody`] describes the
//! topology of a robot (bodies, joints and how the joint velocities are stacked in the
//! decision vector) and a [`MultiBodyConfig`] is the kinematic snapshot that the external
//! rigid-body model fills once per control tick.
use crate::exception::{create_model_exception, TasksException};
use crate::TasksResult;
use nalgebra::{DMatrix, DVector, Isometry3, Vector3, Vector6};
use serde::Deserialize;
use serde::Serialize;

/// Type of a joint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointType {
    Fixed,
    Revolute,
    Prismatic,
    /// Ball joint, parameterized by a unit quaternion `[w, x, y, z]`.
    Spherical,
    /// Floating base, parameterized by `[w, x, y, z, px, py, pz]`.
    Free,
}

impl JointType {
    /// number of velocity variables
    pub fn dof(&self) -> usize {
        match self {
            JointType::Fixed => 0,
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Spherical => 3,
            JointType::Free => 6,
        }
    }
    /// number of configuration parameters
    pub fn params(&self) -> usize {
        match self {
            JointType::Fixed => 0,
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Spherical => 4,
            JointType::Free => 7,
        }
    }
    /// neutral configuration of the joint
    pub fn zero_param(&self) -> Vec<f64> {
        match self {
            JointType::Spherical => vec![1., 0., 0., 0.],
            JointType::Free => vec![1., 0., 0., 0., 0., 0., 0.],
            _ => vec![0.; self.params()],
        }
    }
}

/// A joint moving the body with the same index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    pub joint_type: JointType,
}

impl Joint {
    pub fn new<S: Into<String>>(name: S, joint_type: JointType) -> Self {
        Joint {
            name: name.into(),
            joint_type,
        }
    }
    pub fn dof(&self) -> usize {
        self.joint_type.dof()
    }
    pub fn params(&self) -> usize {
        self.joint_type.params()
    }
}

/// A rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    /// mass in \[kg\]
    pub mass: f64,
}

impl Body {
    pub fn new<S: Into<String>>(name: S, mass: f64) -> Self {
        Body {
            name: name.into(),
            mass,
        }
    }
}

/// Topology of an articulated robot.
///
/// Joint `i` connects the parent body `parent(i)` to body `i`. Body `0` is the root, its joint
/// is either fixed (fixed base) or free (floating base).
#[derive(Debug, Clone)]
pub struct MultiBody {
    name: String,
    bodies: Vec<Body>,
    joints: Vec<Joint>,
    parents: Vec<Option<usize>>,
    joint_pos_in_dof: Vec<usize>,
    joint_pos_in_param: Vec<usize>,
    nr_dof: usize,
    nr_params: usize,
}

impl MultiBody {
    /// Creates a new robot description.
    /// # Arguments
    /// * `name` - name of the robot, used in error messages.
    /// * `bodies` - bodies of the tree.
    /// * `joints` - joint `i` moves body `i`.
    /// * `parents` - parent body of each body, `None` only for the root.
    /// # Errors
    /// * ModelException if the sizes differ or the parents do not describe a tree in
    /// topological order.
    pub fn new<S: Into<String>>(
        name: S,
        bodies: Vec<Body>,
        joints: Vec<Joint>,
        parents: Vec<Option<usize>>,
    ) -> TasksResult<Self> {
        if bodies.is_empty() {
            return Err(create_model_exception("a robot needs at least one body"));
        }
        if bodies.len() != joints.len() || bodies.len() != parents.len() {
            return Err(create_model_exception(
                "bodies, joints and parents must have the same size",
            ));
        }
        for (i, parent) in parents.iter().enumerate() {
            match (i, parent) {
                (0, None) => {}
                (0, Some(_)) => {
                    return Err(create_model_exception("the root body can not have a parent"))
                }
                (_, Some(p)) if *p < i => {}
                _ => {
                    return Err(create_model_exception(
                        "every body except the root needs a parent with a lower index",
                    ))
                }
            }
        }
        let mut joint_pos_in_dof = Vec::with_capacity(joints.len());
        let mut joint_pos_in_param = Vec::with_capacity(joints.len());
        let mut nr_dof = 0;
        let mut nr_params = 0;
        for joint in joints.iter() {
            joint_pos_in_dof.push(nr_dof);
            joint_pos_in_param.push(nr_params);
            nr_dof += joint.dof();
            nr_params += joint.params();
        }
        Ok(MultiBody {
            name: name.into(),
            bodies,
            joints,
            parents,
            joint_pos_in_dof,
            joint_pos_in_param,
            nr_dof,
            nr_params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }
    pub fn joint(&self, index: usize) -> &Joint {
        &self.joints[index]
    }
    pub fn nr_bodies(&self) -> usize {
        self.bodies.len()
    }
    pub fn nr_joints(&self) -> usize {
        self.joints.len()
    }
    /// size of the joint velocity vector
    pub fn nr_dof(&self) -> usize {
        self.nr_dof
    }
    /// size of the joint configuration vector
    pub fn nr_params(&self) -> usize {
        self.nr_params
    }
    pub fn parent(&self, body_index: usize) -> Option<usize> {
        self.parents[body_index]
    }
    /// position of the first velocity variable of a joint
    pub fn joint_pos_in_dof(&self, joint_index: usize) -> usize {
        self.joint_pos_in_dof[joint_index]
    }
    /// position of the first configuration parameter of a joint
    pub fn joint_pos_in_param(&self, joint_index: usize) -> usize {
        self.joint_pos_in_param[joint_index]
    }
    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(|b| b.mass).sum()
    }

    /// # Errors
    /// * UnknownBody if no body has this name.
    pub fn body_index_by_name(&self, name: &str) -> TasksResult<usize> {
        self.bodies
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| TasksException::UnknownBody {
                robot: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// # Errors
    /// * UnknownJoint if no joint has this name.
    pub fn joint_index_by_name(&self, name: &str) -> TasksResult<usize> {
        self.joints
            .iter()
            .position(|j| j.name == name)
            .ok_or_else(|| TasksException::UnknownJoint {
                robot: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Joints between the root and a body, root first.
    pub fn joint_path(&self, body_index: usize) -> Vec<usize> {
        let mut path = vec![body_index];
        let mut current = body_index;
        while let Some(parent) = self.parents[current] {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }
}

/// Returns an error if `index` is not a robot of the collection.
pub(crate) fn check_robot_index(robots: &[MultiBody], index: usize) -> TasksResult<()> {
    if index >= robots.len() {
        return Err(TasksException::RobotIndexError {
            index,
            nr_robots: robots.len(),
        });
    }
    Ok(())
}

/// Kinematic snapshot of a robot for one control tick.
///
/// All quantities are computed by the external rigid-body model and are read-only while the
/// tasks update. World quantities are expressed in the world frame at the body origin, spatial
/// vectors and Jacobian rows are ordered `[angular; linear]`.
#[derive(Debug, Clone)]
pub struct MultiBodyConfig {
    /// joint configuration, one entry per joint
    pub q: Vec<Vec<f64>>,
    /// joint velocities, one entry per joint
    pub alpha: Vec<Vec<f64>>,
    /// pose of each body in world frame
    pub body_pos_w: Vec<Isometry3<f64>>,
    /// spatial velocity of each body
    pub body_vel_w: Vec<Vector6<f64>>,
    /// 6 x nr_dof Jacobian of each body
    pub body_jac_w: Vec<DMatrix<f64>>,
    /// `Jdot * qdot` of each body
    pub body_normal_acc_w: Vec<Vector6<f64>>,
    pub com: Vector3<f64>,
    pub com_vel: Vector3<f64>,
    /// 3 x nr_dof
    pub com_jac: DMatrix<f64>,
    pub com_normal_acc: Vector3<f64>,
    /// centroidal momentum `[angular; linear]`
    pub momentum: Vector6<f64>,
    /// 6 x nr_dof centroidal momentum matrix
    pub momentum_jac: DMatrix<f64>,
    pub momentum_normal_acc: Vector6<f64>,
}

impl MultiBodyConfig {
    /// Creates a configuration at rest in the neutral pose with all bodies at the origin.
    pub fn new(mb: &MultiBody) -> Self {
        let nr_bodies = mb.nr_bodies();
        let nr_dof = mb.nr_dof();
        MultiBodyConfig {
            q: mb.joints().iter().map(|j| j.joint_type.zero_param()).collect(),
            alpha: mb.joints().iter().map(|j| vec![0.; j.dof()]).collect(),
            body_pos_w: vec![Isometry3::identity(); nr_bodies],
            body_vel_w: vec![Vector6::zeros(); nr_bodies],
            body_jac_w: vec![DMatrix::zeros(6, nr_dof); nr_bodies],
            body_normal_acc_w: vec![Vector6::zeros(); nr_bodies],
            com: Vector3::zeros(),
            com_vel: Vector3::zeros(),
            com_jac: DMatrix::zeros(3, nr_dof),
            com_normal_acc: Vector3::zeros(),
            momentum: Vector6::zeros(),
            momentum_jac: DMatrix::zeros(6, nr_dof),
            momentum_normal_acc: Vector6::zeros(),
        }
    }

    /// joint velocities stacked in a single vector
    pub fn alpha_vector(&self) -> DVector<f64> {
        param_to_vector(&self.alpha)
    }
}

/// Stacks per-joint values in a single vector.
pub fn param_to_vector(params: &[Vec<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        params.iter().map(|p| p.len()).sum(),
        params.iter().flat_map(|p| p.iter().copied()),
    )
}
