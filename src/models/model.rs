use log::info;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use typed_index_collections::TiSlice;

use super::constraints::ConstraintAssembler;
use super::expr::{Constraint, LinExpr};
use super::objective::Objective;
use super::variables::{Domain, VarId, Variables};
use super::ModelConstructionError;
use crate::chance::SafetyStock;
use crate::coefficients::FuelCoefficients;
use crate::problem::Parameters;

/// A complete, solver-ready mixed-integer linear program. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct IrpModel {
    name: String,
    variables: Variables,
    objective: Objective,
    constraints: Vec<Constraint>,
}

/// One violated constraint or variable domain of an assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub name: String,
    pub amount: f64,
}

impl IrpModel {
    /// Builds the model, deriving the fuel coefficients and safety stock from `parameters`.
    pub fn build(parameters: &Parameters) -> Result<IrpModel, ModelConstructionError> {
        let coefficients = FuelCoefficients::from_parameters(parameters);
        let safety_stock = SafetyStock::new(parameters);
        IrpModel::assemble(parameters, &coefficients, &safety_stock)
    }

    /// Builds the model from precomputed coefficients and bounds.
    pub fn assemble(
        parameters: &Parameters,
        coefficients: &FuelCoefficients,
        safety_stock: &SafetyStock,
    ) -> Result<IrpModel, ModelConstructionError> {
        info!("Building perishable inventory routing model.");

        let expected = (parameters.nodes(), parameters.periods() + 1);
        if safety_stock.dim() != expected {
            return Err(ModelConstructionError::BoundsSizeMismatch {
                expected,
                actual: safety_stock.dim(),
            });
        }

        let variables = Variables::new(
            parameters.nodes(),
            parameters.vehicles(),
            parameters.periods(),
        );
        let objective = Objective::new(parameters, coefficients, &variables);
        let constraints = ConstraintAssembler::new(parameters, &variables, safety_stock).assemble();

        info!(
            "Successfully built model with {} variables and {} constraints",
            variables.len(),
            constraints.len()
        );

        Ok(IrpModel {
            name: format!(
                "irp_v{}_k{}_t{}",
                parameters.nodes(),
                parameters.vehicles(),
                parameters.periods()
            ),
            variables,
            objective,
            constraints,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Every constraint, bound or integrality requirement that `values` violates by more than
    /// `tolerance`.
    pub fn violations(&self, values: &TiSlice<VarId, f64>, tolerance: f64) -> Vec<Violation> {
        let mut violations = Vec::new();
        if values.len() != self.variables.len() {
            violations.push(Violation {
                name: "dimension".to_string(),
                amount: (values.len() as f64 - self.variables.len() as f64).abs(),
            });
            return violations;
        }

        for (var, key) in self.variables.iter() {
            let value = values[var];
            let (lb, ub) = key.domain().bounds();
            let mut amount = (lb - value).max(0.0) + (value - ub).max(0.0);
            if key.domain().is_integer() {
                amount += (value - value.round()).abs();
            }
            if amount > tolerance {
                violations.push(Violation {
                    name: key.to_string(),
                    amount,
                });
            }
        }

        for c in &self.constraints {
            let amount = c.violation(values);
            if amount > tolerance {
                violations.push(Violation {
                    name: c.name.clone(),
                    amount,
                });
            }
        }

        violations
    }

    /// Writes the model in CPLEX LP format
    pub fn write_lp<W: Write>(&self, out: W) -> io::Result<()> {
        let mut out = BufWriter::new(out);
        writeln!(out, "\\ {}", self.name)?;
        writeln!(out, "Minimize")?;
        write!(out, " obj:")?;
        self.write_expr(&mut out, &self.objective.total())?;
        writeln!(out)?;

        writeln!(out, "Subject To")?;
        for c in &self.constraints {
            write!(out, " {}:", c.name)?;
            self.write_expr(&mut out, &c.lhs)?;
            writeln!(out, " {} {}", c.sense, c.rhs)?;
        }

        writeln!(out, "Bounds")?;
        for (_, key) in self.variables.iter() {
            match key.domain() {
                Domain::Free => writeln!(out, " {} free", key)?,
                Domain::Binary => writeln!(out, " 0 <= {} <= 1", key)?,
                Domain::NonNegative => {}
            }
        }

        writeln!(out, "Binaries")?;
        for (_, key) in self.variables.iter().filter(|(_, k)| k.domain().is_integer()) {
            writeln!(out, " {}", key)?;
        }

        writeln!(out, "End")?;
        out.flush()
    }

    /// Writes the model in CPLEX LP format to `path`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_lp(file)
    }

    fn write_expr<W: Write>(&self, out: &mut W, expr: &LinExpr) -> io::Result<()> {
        if expr.is_empty() {
            // LP format needs at least one term per row
            return match self.variables.iter().next() {
                Some((_, key)) => write!(out, " 0 {}", key),
                None => Ok(()),
            };
        }

        for (n, (var, coeff)) in expr.terms().iter().enumerate() {
            if n > 0 && n % 8 == 0 {
                write!(out, "\n   ")?;
            }
            let sign = if *coeff < 0.0 { '-' } else { '+' };
            write!(out, " {} {} {}", sign, coeff.abs(), self.variables.key(*var))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstraintFamily, Family};
    use crate::problem::tests::file;
    use typed_index_collections::TiVec;

    #[test]
    fn building_twice_gives_identical_models() {
        let params = Parameters::new(file(4, 2, 3, 12.0)).unwrap();
        let one = IrpModel::build(&params).unwrap();
        let two = IrpModel::build(&params).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.objective().total(), two.objective().total());
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        let params = Parameters::new(file(4, 1, 3, 12.0)).unwrap();
        let other = Parameters::new(file(3, 1, 3, 12.0)).unwrap();
        let result = IrpModel::assemble(
            &params,
            &FuelCoefficients::from_parameters(&params),
            &SafetyStock::new(&other),
        );
        assert!(matches!(
            result,
            Err(ModelConstructionError::BoundsSizeMismatch {
                expected: (4, 4),
                actual: (3, 4)
            })
        ));
    }

    #[test]
    fn constraint_counts_per_family() {
        let params = Parameters::new(file(3, 2, 2, 1.0)).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let count = |family: ConstraintFamily| model.constraints().iter().filter(|c| c.family == family).count();
        let (customers, nodes, k, t) = (2, 3, 2, 2);
        assert_eq!(count(ConstraintFamily::InventoryBalance), customers * t);
        assert_eq!(count(ConstraintFamily::PositiveInventory), customers * t);
        assert_eq!(count(ConstraintFamily::Spoilage), customers * t);
        assert_eq!(count(ConstraintFamily::FlowConservation), customers * k * t);
        assert_eq!(count(ConstraintFamily::SingleVisit), nodes * k * t);
        assert_eq!(count(ConstraintFamily::LoadConservation), customers * k * t);
        assert_eq!(count(ConstraintFamily::Capacity), nodes * (nodes - 1) * k * t);
        assert_eq!(count(ConstraintFamily::ServiceLevel), customers * t);
    }

    #[test]
    fn all_zero_assignment_of_empty_instance_is_feasible_at_zero_cost() {
        let mut f = file(3, 1, 1, 0.0);
        for row in f.distances.iter_mut() {
            row.iter_mut().for_each(|d| *d = 0.0);
        }
        let model = IrpModel::build(&Parameters::new(f).unwrap()).unwrap();
        let zeros: TiVec<VarId, f64> = vec![0.0; model.variables().len()].into();
        assert!(model.violations(&zeros, 1e-9).is_empty());
        assert_eq!(model.objective().total().eval(&zeros), 0.0);
    }

    #[test]
    fn violations_report_domains_and_rows() {
        let params = Parameters::new(file(2, 1, 1, 50.0)).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let mut values: TiVec<VarId, f64> = vec![0.0; model.variables().len()].into();
        let x = model.variables().family(Family::Route).next().unwrap();
        values[x] = 0.5;

        let violations = model.violations(&values, 1e-6);
        let names: Vec<_> = violations.iter().map(|v| v.name.as_str()).collect();
        assert!(names.contains(&"X_0_1_1_1"));
        assert!(names.contains(&"service_level_1_1"));

        let short: TiVec<VarId, f64> = vec![0.0; 3].into();
        assert_eq!(model.violations(&short, 1e-6)[0].name, "dimension");
    }

    #[test]
    fn lp_export_lists_every_section() {
        let params = Parameters::new(file(3, 1, 2, 5.0)).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let mut buffer = Vec::new();
        model.write_lp(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        for section in ["Minimize", "Subject To", "Bounds", "Binaries", "End"] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains(" I_1_1 free"));
        assert!(text.contains(" X_1_2_1_2\n"));
        assert!(text.contains(" capacity_0_1_1_1:"));
        assert!(!text.contains("X_1_1_"));
    }
}
