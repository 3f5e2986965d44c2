pub mod chance;
pub mod coefficients;
pub mod generator;
pub mod models;
pub mod problem;
pub mod report;
pub mod solvers;

pub use models::{IrpModel, ModelConstructionError};
pub use problem::{ConfigurationError, ParameterFile, Parameters};
pub use report::{Report, ReportError, SolutionReporter};
pub use solvers::{MilpSolver, Solution, SolverError, Status};
