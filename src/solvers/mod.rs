#[cfg(feature = "gurobi")]
pub mod gurobi;
#[cfg(feature = "microlp")]
pub mod microlp;

use derive_more::Display;
use serde::Serialize;
use std::time::Duration;

use crate::models::{IrpModel, Values};

/// Termination status reported by a solver
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[display(fmt = "optimal")]
    Optimal,
    #[display(fmt = "infeasible")]
    Infeasible,
    #[display(fmt = "unbounded")]
    Unbounded,
    #[display(fmt = "time limit reached")]
    TimeLimit,
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum SolverError {
    #[display(fmt = "the model is infeasible")]
    Infeasible,
    #[display(fmt = "the model is unbounded")]
    Unbounded,
    #[display(fmt = "solver failure: {}", _0)]
    Backend(String),
}

impl std::error::Error for SolverError {}

/// What a solver hands back: a status and, when one exists, a value for every declared variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    status: Status,
    values: Option<Values>,
}

impl Solution {
    pub fn new(status: Status, values: Option<Values>) -> Solution {
        // infeasible and unbounded results never carry an assignment
        let values = match status {
            Status::Optimal | Status::TimeLimit => values,
            Status::Infeasible | Status::Unbounded => None,
        };
        Solution { status, values }
    }

    pub fn optimal(values: Values) -> Solution {
        Solution::new(Status::Optimal, Some(values))
    }

    pub fn infeasible() -> Solution {
        Solution::new(Status::Infeasible, None)
    }

    pub fn unbounded() -> Solution {
        Solution::new(Status::Unbounded, None)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The assignment, if the solver found one
    pub fn values(&self) -> Option<&Values> {
        self.values.as_ref()
    }

    /// Surfaces infeasible and unbounded results as errors
    pub fn check(&self) -> Result<(), SolverError> {
        match self.status {
            Status::Infeasible => Err(SolverError::Infeasible),
            Status::Unbounded => Err(SolverError::Unbounded),
            Status::Optimal | Status::TimeLimit => Ok(()),
        }
    }
}

/// A mixed-integer linear programming engine that can solve an [`IrpModel`].
///
/// Exceeding `time_limit` is not an error: the solver reports [`Status::TimeLimit`], with the
/// incumbent if it has one.
pub trait MilpSolver {
    fn solve(&self, model: &IrpModel, time_limit: Option<Duration>) -> Result<Solution, SolverError>;
}
