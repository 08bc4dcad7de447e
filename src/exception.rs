// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors which can occur while building contacts, layouts and tasks.
///
/// Precondition violations (wrong point index, wrong number of force coefficients) are
/// programming errors of the caller: they are reported immediately and must not be retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TasksException {
    /// PointIndexError is returned if a contact point index is outside of the point list.
    #[error("invalid point index {index}: must be in the range [0,{len}[")]
    PointIndexError {
        /// requested point index.
        index: usize,
        /// number of points of the contact.
        len: usize,
    },

    /// LambdaSizeError is returned if the number of force coefficients does not match
    /// the number of generators.
    #[error("number of lambda and generator mismatch: expected ({expected}) given ({given})")]
    LambdaSizeError {
        /// expected number of coefficients.
        expected: usize,
        /// number of coefficients supplied by the caller.
        given: usize,
    },

    /// InvalidFrictionCone is returned for a negative friction coefficient or an empty cone.
    #[error("invalid friction cone: {message}")]
    InvalidFrictionCone { message: String },

    /// InvalidContact is returned if the contact geometry is inconsistent.
    #[error("invalid contact: {message}")]
    InvalidContact { message: String },

    /// RobotIndexError is returned if a robot index is not part of the robot collection.
    #[error("invalid robot index {index}: only {nr_robots} robots available")]
    RobotIndexError { index: usize, nr_robots: usize },

    /// UnknownBody is returned if a body name can not be found in the robot.
    #[error("body {name:?} does not exist in robot {robot:?}")]
    UnknownBody { robot: String, name: String },

    /// UnknownJoint is returned if a joint name can not be found in the robot.
    #[error("joint {name:?} does not exist in robot {robot:?}")]
    UnknownJoint { robot: String, name: String },

    /// InvalidDofRange is returned if a dof range exceeds the joint dof.
    #[error("invalid dof range [{start},{start}+{count}[ for joint {joint:?} with {dof} dof")]
    InvalidDofRange {
        joint: String,
        start: usize,
        count: usize,
        dof: usize,
    },

    /// DimensionMismatch is returned if a supplied vector does not have the task dimension.
    #[error("{what}: expected dimension {expected} given {given}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        given: usize,
    },

    /// InvalidParameter is returned for a non-physical task parameter such as a negative time step.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// ModelException is returned if the robot model description is inconsistent.
    #[error("{message:?}")]
    ModelException { message: String },

    /// ConfigException is returned if a parameter file can not be read or is invalid.
    #[error("{message:?}")]
    ConfigException { message: String },
}

/// creates a ModelException from a static string slice
pub(crate) fn create_model_exception(message: &'static str) -> TasksException {
    TasksException::ModelException {
        message: message.to_string(),
    }
}

/// checks that `given` equals `expected`
pub(crate) fn check_dimension(what: &'static str, expected: usize, given: usize) -> TasksResult<()> {
    if expected != given {
        return Err(TasksException::DimensionMismatch {
            what,
            expected,
            given,
        });
    }
    Ok(())
}

/// Result type which can have TasksException as Error
pub type TasksResult<T> = Result<T, TasksException>;
