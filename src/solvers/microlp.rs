use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution as _,
    SolverModel, Variable,
};
use log::{info, warn};
use std::time::Duration;
use typed_index_collections::TiVec;

use super::{MilpSolver, Solution, SolverError};
use crate::models::{Constraint, Domain, IrpModel, LinExpr, Sense, VarId, Values};

/// Pure-Rust branch and bound through `good_lp`. Suitable for small instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLp;

fn expression(expr: &LinExpr, vars: &TiVec<VarId, Variable>) -> Expression {
    expr.terms()
        .iter()
        .map(|(var, coeff)| *coeff * vars[*var])
        .sum::<Expression>()
        + expr.constant()
}

fn row(c: &Constraint, vars: &TiVec<VarId, Variable>) -> good_lp::Constraint {
    let lhs = expression(&c.lhs, vars);
    match c.sense {
        Sense::LessEqual => constraint::leq(lhs, c.rhs),
        Sense::GreaterEqual => constraint::geq(lhs, c.rhs),
        Sense::Equal => constraint::eq(lhs, c.rhs),
    }
}

impl MilpSolver for MicroLp {
    fn solve(&self, model: &IrpModel, time_limit: Option<Duration>) -> Result<Solution, SolverError> {
        if time_limit.is_some() {
            warn!("microlp does not support time limits, solving to optimality");
        }

        info!("Solving {} with microlp.", model.name());

        let mut problem = ProblemVariables::new();
        let vars: TiVec<VarId, Variable> = model
            .variables()
            .iter()
            .map(|(_, key)| {
                let definition = match key.domain() {
                    Domain::Binary => variable().integer().min(0.0).max(1.0),
                    Domain::NonNegative => variable().min(0.0),
                    Domain::Free => variable(),
                };
                problem.add(definition.name(key.to_string()))
            })
            .collect();

        let objective = expression(&model.objective().total(), &vars);
        let mut lp = problem.minimise(objective).using(default_solver);
        for c in model.constraints() {
            lp = lp.with(row(c, &vars));
        }

        match lp.solve() {
            Ok(solution) => {
                let values: Values = vars.iter().map(|v| solution.value(*v)).collect();
                info!("microlp found an optimal solution.");
                Ok(Solution::optimal(values))
            }
            Err(ResolutionError::Infeasible) => Ok(Solution::infeasible()),
            Err(ResolutionError::Unbounded) => Ok(Solution::unbounded()),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }
}
