// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # tasks-rs
//! tasks-rs assembles the quadratic objective of a task-space whole-body controller and models
//! the contacts between robots with linearized friction cones.
//!
//! ## Design
//! The decision vector of the QP stacks the joint accelerations of every robot, the force
//! coefficients of every contact and optionally joint torques. Its layout is computed by
//! [`SolverData`]. The library is divided into the following modules:
//! * [contact](`crate::contact`) - friction cones, contact identities, unilateral and bilateral
//! contacts.
//! * [multibody](`crate::multibody`) - robot topology and the per tick kinematic snapshot
//! supplied by an external rigid-body model.
//! * [qp](`crate::qp`) - the task space errors ([`HighLevelTask`]) and the objective
//! contributions ([`Task`]).
//! * [config](`crate::config`) - parameter sets loaded from TOML files.
//!
//! # Example:
//!```no_run
//! use nalgebra::Vector3;
//! use tasks::{MultiBody, MultiBodyConfig, PositionTask, SetPointTask, SolverData, Task, TasksResult};
//! fn control_tick(robots: &[MultiBody], configs: &[MultiBodyConfig]) -> TasksResult<()> {
//!     let data = SolverData::new(robots, vec![], vec![], &[])?;
//!     let hand = PositionTask::new(robots, 0, "hand", Vector3::new(0.5, 0., 1.), None)?;
//!     let mut task = SetPointTask::new(robots, 0, hand, 10., 100.)?;
//!     task.update_nr_vars(robots, &data);
//!     task.update(robots, configs, &data);
//!     let (begin, end) = task.begin();
//!     println!("Q {:?} C {:?} at [{}, {}[", task.q().shape(), task.c().len(), begin, end);
//!     Ok(())
//! }
//! ```
//!
//! All fallible constructors return a [`TasksResult`]. Precondition violations are reported
//! with a [`TasksException`] and must not be retried with the same arguments.
//!
//! The library logs through the [`log`](https://docs.rs/log) facade: layout changes are logged
//! at debug level, tasks disabled because their contact or torque block is missing are logged
//! as warnings.

pub mod config;
pub mod contact;
pub mod exception;
pub mod multibody;
pub mod qp;
pub mod utils;

pub use config::ControllerConfig;
pub use contact::bilateral_contact::BilateralContact;
pub use contact::contact_id::ContactId;
pub use contact::friction_cone::{ConeDirection, FrictionCone};
pub use contact::unilateral_contact::UnilateralContact;
pub use exception::{TasksException, TasksResult};
pub use multibody::{Body, Joint, JointType, MultiBody, MultiBodyConfig};
pub use qp::contact_task::{ContactForceTask, ContactObjective, ContactTask};
pub use qp::high_level::{
    CoMTask, GazeTask, LinVelocityTask, MomentumTask, OrientationTask, PositionTask,
    RelativeDistTask, SurfaceOrientationTask, SurfaceTransformTask, TransformTask,
    VectorOrientationTask,
};
pub use qp::joints_selector::JointsSelector;
pub use qp::lin_weight::LinWeightTask;
pub use qp::multi_robot::MultiCoMTask;
pub use qp::posture::{JointGains, JointStiffness, PostureTask};
#[allow(deprecated)]
pub use qp::set_point::PIDTask;
pub use qp::set_point::{SetPointTask, TrackingTask, TrajectoryTask};
pub use qp::solver_data::SolverData;
pub use qp::target_objective::TargetObjectiveTask;
pub use qp::task::{HighLevelTask, Task};
pub use qp::torque_task::{GripperTorqueTask, TorqueBound, TorqueDBound, TorqueTask};
pub use utils::*;
