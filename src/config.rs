// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains parameter sets which can be loaded from TOML files.
//!
//! ```
//! use tasks::config::ControllerConfig;
//! let config = ControllerConfig::from_toml_str(
//!     r#"
//!     [friction.foot]
//!     nr_gen = 4
//!     mu = 0.7
//!
//!     [tasks.hand]
//!     weight = 100.0
//!     gains = { stiffness = 25.0 }
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.task("hand").unwrap().gains.damping(), 10.);
//! ```
use crate::contact::friction_cone::FrictionCone;
use crate::exception::{check_dimension, TasksException};
use crate::multibody::MultiBody;
use crate::qp::set_point::SetPointTask;
use crate::qp::task::HighLevelTask;
use crate::utils::{critical_damping, Frame3};
use crate::TasksResult;
use log::debug;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

fn config_exception(message: String) -> TasksException {
    TasksException::ConfigException { message }
}

/// Parameters of the friction cones of a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionParameters {
    /// number of generators of each cone
    pub nr_gen: usize,
    /// friction coefficient
    pub mu: f64,
}

impl FrictionParameters {
    /// Creates the friction cone of a contact frame.
    /// # Errors
    /// * InvalidFrictionCone if the parameters are invalid.
    pub fn cone(&self, frame: &Frame3) -> TasksResult<FrictionCone> {
        FrictionCone::new(frame, self.nr_gen, self.mu)
    }

    fn validate(&self, name: &str) -> TasksResult<()> {
        if self.nr_gen < 1 {
            return Err(config_exception(format!(
                "friction {}: nr_gen must be at least 1",
                name
            )));
        }
        if !self.mu.is_finite() || self.mu < 0. {
            return Err(config_exception(format!(
                "friction {}: mu must be finite and not negative, got {}",
                name, self.mu
            )));
        }
        Ok(())
    }
}

/// Stiffness and optional damping of a gain model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub stiffness: f64,
    /// defaults to `2 sqrt(stiffness)`
    #[serde(default)]
    pub damping: Option<f64>,
}

impl Gains {
    pub fn damping(&self) -> f64 {
        self.damping
            .unwrap_or_else(|| critical_damping(self.stiffness))
    }
}

/// Parameters of a set point task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskParameters {
    pub gains: Gains,
    pub weight: f64,
    /// weight of each task dimension, all ones if missing
    #[serde(default)]
    pub dim_weight: Option<Vec<f64>>,
}

impl TaskParameters {
    /// Returns the dimension weights for a task of dimension `dim`.
    /// # Errors
    /// * DimensionMismatch if the configured weights do not have `dim` entries.
    pub fn dim_weight(&self, dim: usize) -> TasksResult<DVector<f64>> {
        match &self.dim_weight {
            Some(w) => {
                check_dimension("dimWeight", dim, w.len())?;
                Ok(DVector::from_column_slice(w))
            }
            None => Ok(DVector::from_element(dim, 1.)),
        }
    }

    /// Creates a [`SetPointTask`] with these parameters.
    /// # Errors
    /// * RobotIndexError if `robot_index` is not part of `robots`.
    /// * DimensionMismatch if the dimension weights do not match the task.
    pub fn set_point_task<H: HighLevelTask>(
        &self,
        robots: &[MultiBody],
        robot_index: usize,
        hl_task: H,
    ) -> TasksResult<SetPointTask<H>> {
        let dim_weight = self.dim_weight(hl_task.dim())?;
        let mut task = SetPointTask::with_dim_weight(
            robots,
            robot_index,
            hl_task,
            self.gains.stiffness,
            dim_weight,
            self.weight,
        )?;
        task.set_gains(self.gains.stiffness, self.gains.damping());
        Ok(task)
    }

    fn validate(&self, name: &str) -> TasksResult<()> {
        let non_negative = |value: f64, what: &str| {
            if !value.is_finite() || value < 0. {
                Err(config_exception(format!(
                    "task {}: {} must be finite and not negative, got {}",
                    name, what, value
                )))
            } else {
                Ok(())
            }
        };
        non_negative(self.weight, "weight")?;
        non_negative(self.gains.stiffness, "stiffness")?;
        if let Some(damping) = self.gains.damping {
            non_negative(damping, "damping")?;
        }
        for w in self.dim_weight.iter().flatten() {
            non_negative(*w, "dim_weight")?;
        }
        Ok(())
    }
}

/// Named parameter tables of a controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub friction: BTreeMap<String, FrictionParameters>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskParameters>,
}

impl ControllerConfig {
    /// Parses and validates a TOML document.
    /// # Errors
    /// * ConfigException if the document can not be parsed or contains invalid values.
    pub fn from_toml_str(toml_str: &str) -> TasksResult<Self> {
        let config: ControllerConfig = toml::from_str(toml_str)
            .map_err(|e| config_exception(format!("can not parse configuration: {}", e)))?;
        config.validate()?;
        debug!(
            "loaded {} friction and {} task parameter sets",
            config.friction.len(),
            config.tasks.len()
        );
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    /// # Errors
    /// * ConfigException if the file can not be read or parsed or contains invalid values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TasksResult<Self> {
        let path = path.as_ref();
        let toml_str = read_to_string(path).map_err(|e| {
            config_exception(format!("can not read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&toml_str)
    }

    /// Checks every parameter set.
    /// # Errors
    /// * ConfigException naming the first invalid entry.
    pub fn validate(&self) -> TasksResult<()> {
        for (name, friction) in self.friction.iter() {
            friction.validate(name)?;
        }
        for (name, task) in self.tasks.iter() {
            task.validate(name)?;
        }
        Ok(())
    }

    /// # Errors
    /// * ConfigException if no friction parameters have this name.
    pub fn friction(&self, name: &str) -> TasksResult<&FrictionParameters> {
        self.friction
            .get(name)
            .ok_or_else(|| config_exception(format!("no friction parameters named {:?}", name)))
    }

    /// # Errors
    /// * ConfigException if no task parameters have this name.
    pub fn task(&self, name: &str) -> TasksResult<&TaskParameters> {
        self.tasks
            .get(name)
            .ok_or_else(|| config_exception(format!("no task parameters named {:?}", name)))
    }
}
