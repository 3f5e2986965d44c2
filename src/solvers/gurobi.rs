use grb::prelude::*;
use grb::Status;
use log::{info, warn};
use std::time::Duration;
use typed_index_collections::TiVec;

use super::{MilpSolver, Solution, SolverError, Status as SolveStatus};
use crate::models::{Domain, IrpModel, LinExpr, Sense, VarId, Values};

/// Solves the model with Gurobi through `grb`.
#[derive(Debug, Clone, Default)]
pub struct Gurobi {
    /// Show Gurobi's own console output
    pub verbose: bool,
    /// Number of threads, `None` leaves the choice to Gurobi
    pub threads: Option<i32>,
}

/// Trait that converts gurobi variables to f64
pub trait ConvertVars {
    type Out;
    fn convert(&self, model: &Model) -> grb::Result<Self::Out>;
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, model: &Model) -> grb::Result<Self::Out> {
        model.get_obj_attr(attr::X, self)
    }
}

impl<T: ConvertVars> ConvertVars for TiVec<VarId, T> {
    type Out = TiVec<VarId, T::Out>;

    fn convert(&self, model: &Model) -> grb::Result<Self::Out> {
        let mut out = TiVec::with_capacity(self.len());
        for e in self.iter() {
            out.push(e.convert(model)?);
        }
        Ok(out)
    }
}

fn grb_expr(expr: &LinExpr, vars: &TiVec<VarId, Var>) -> Expr {
    expr.terms()
        .iter()
        .map(|(var, coeff)| *coeff * vars[*var])
        .grb_sum()
}

fn backend(e: grb::Error) -> SolverError {
    SolverError::Backend(e.to_string())
}

impl Gurobi {
    /// Translates `model` into a Gurobi model.
    pub fn build(&self, model: &IrpModel) -> grb::Result<(Model, TiVec<VarId, Var>)> {
        info!("Building gurobi model {}.", model.name());

        let mut grb_model = Model::new(model.name())?;
        if !self.verbose {
            grb_model.set_param(param::OutputFlag, 0)?;
        }
        if let Some(threads) = self.threads {
            grb_model.set_param(param::Threads, threads)?;
        }

        let mut vars = TiVec::with_capacity(model.variables().len());
        for (_, key) in model.variables().iter() {
            let domain = key.domain();
            let vtype = match domain {
                Domain::Binary => VarType::Binary,
                Domain::NonNegative | Domain::Free => VarType::Continuous,
            };
            let (lb, ub) = domain.bounds();
            vars.push(grb_model.add_var(
                &key.to_string(),
                vtype,
                0.0,
                lb,
                ub,
                std::iter::empty(),
            )?);
        }

        grb_model.update()?;

        for c in model.constraints() {
            let lhs = grb_expr(&c.lhs, &vars);
            let rhs = c.rhs;
            match c.sense {
                Sense::LessEqual => grb_model.add_constr(&c.name, c!(lhs <= rhs))?,
                Sense::GreaterEqual => grb_model.add_constr(&c.name, c!(lhs >= rhs))?,
                Sense::Equal => grb_model.add_constr(&c.name, c!(lhs == rhs))?,
            };
        }

        grb_model.set_objective(grb_expr(&model.objective().total(), &vars), Minimize)?;
        grb_model.update()?;

        info!("Successfully built gurobi model {}", model.name());
        Ok((grb_model, vars))
    }
}

impl MilpSolver for Gurobi {
    fn solve(&self, model: &IrpModel, time_limit: Option<Duration>) -> Result<Solution, SolverError> {
        let (mut grb_model, vars) = self.build(model).map_err(backend)?;
        if let Some(limit) = time_limit {
            grb_model
                .set_param(param::TimeLimit, limit.as_secs_f64())
                .map_err(backend)?;
        }

        grb_model.optimize().map_err(backend)?;

        let status = grb_model.status().map_err(backend)?;
        let incumbents = grb_model.get_attr(attr::SolCount).map_err(backend)?;
        info!("gurobi finished with status {:?} and {} solution(s)", status, incumbents);

        let values = || -> Result<Values, SolverError> { vars.convert(&grb_model).map_err(backend) };

        match status {
            Status::Optimal => Ok(Solution::optimal(values()?)),
            Status::Infeasible => Ok(Solution::infeasible()),
            Status::Unbounded => Ok(Solution::unbounded()),
            Status::InfOrUnbd => {
                warn!("gurobi could not tell infeasible from unbounded, reporting infeasible");
                Ok(Solution::infeasible())
            }
            Status::TimeLimit if incumbents > 0 => {
                Ok(Solution::new(SolveStatus::TimeLimit, Some(values()?)))
            }
            Status::TimeLimit => Ok(Solution::new(SolveStatus::TimeLimit, None)),
            other => Err(SolverError::Backend(format!(
                "unexpected gurobi status {:?}",
                other
            ))),
        }
    }
}
