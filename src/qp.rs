// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the tasks which contribute to the objective of the shared QP.
//!
//! A [`Task`](`task::Task`) owns a quadratic block `(Q, C)` placed at the columns
//! [`begin`](`task::Task::begin`) of the decision vector described by
//! [`SolverData`](`solver_data::SolverData`). Most tasks wrap a
//! [`HighLevelTask`](`task::HighLevelTask`) which provides the task space error and Jacobian.
pub mod contact_task;
pub mod high_level;
pub mod joints_selector;
pub mod lin_weight;
pub mod multi_robot;
pub mod posture;
pub mod set_point;
pub mod solver_data;
pub mod target_objective;
pub mod task;
pub mod torque_task;
