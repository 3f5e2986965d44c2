use derive_more::Display;
use itertools::Itertools;
use serde::Serialize;
use typed_index_collections::TiSlice;

use super::variables::VarId;

/// A linear expression `sum(coeff * var) + constant` over the declared variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    pub fn add_term(&mut self, coeff: f64, var: VarId) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn add_constant(&mut self, constant: f64) -> &mut Self {
        self.constant += constant;
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merges repeated variables, drops zero coefficients and orders the terms by variable.
    pub fn compact(mut self) -> LinExpr {
        self.terms = self
            .terms
            .into_iter()
            .sorted_by_key(|(var, _)| *var)
            .coalesce(|(v1, c1), (v2, c2)| {
                if v1 == v2 {
                    Ok((v1, c1 + c2))
                } else {
                    Err(((v1, c1), (v2, c2)))
                }
            })
            .filter(|(_, coeff)| *coeff != 0.0)
            .collect();
        self
    }

    /// The value of the expression under `values`, indexed by variable
    pub fn eval(&self, values: &TiSlice<VarId, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[*var])
            .sum::<f64>()
            + self.constant
    }
}

impl std::ops::AddAssign<&LinExpr> for LinExpr {
    fn add_assign(&mut self, rhs: &LinExpr) {
        self.terms.extend_from_slice(&rhs.terms);
        self.constant += rhs.constant;
    }
}

impl FromIterator<(VarId, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinExpr {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sense {
    #[display(fmt = "<=")]
    LessEqual,
    #[display(fmt = ">=")]
    GreaterEqual,
    #[display(fmt = "=")]
    Equal,
}

/// The constraint families of the model, in the order they are emitted
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConstraintFamily {
    #[display(fmt = "inventory_balance")]
    InventoryBalance,
    #[display(fmt = "positive_inventory")]
    PositiveInventory,
    #[display(fmt = "spoilage")]
    Spoilage,
    #[display(fmt = "flow_conservation")]
    FlowConservation,
    #[display(fmt = "single_visit")]
    SingleVisit,
    #[display(fmt = "load_conservation")]
    LoadConservation,
    #[display(fmt = "capacity")]
    Capacity,
    #[display(fmt = "service_level")]
    ServiceLevel,
}

/// `lhs sense rhs`, where every constant has been moved to `rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub family: ConstraintFamily,
    pub lhs: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(
        name: String,
        family: ConstraintFamily,
        lhs: LinExpr,
        sense: Sense,
        rhs: f64,
    ) -> Constraint {
        let rhs = rhs - lhs.constant();
        let lhs = LinExpr {
            constant: 0.0,
            ..lhs
        }
        .compact();

        Constraint {
            name,
            family,
            lhs,
            sense,
            rhs,
        }
    }

    /// By how much `values` violates the constraint; zero when satisfied
    pub fn violation(&self, values: &TiSlice<VarId, f64>) -> f64 {
        let lhs = self.lhs.eval(values);
        match self.sense {
            Sense::LessEqual => (lhs - self.rhs).max(0.0),
            Sense::GreaterEqual => (self.rhs - lhs).max(0.0),
            Sense::Equal => (lhs - self.rhs).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typed_index_collections::TiVec;

    #[test]
    fn compact_merges_and_orders_terms() {
        let mut e = LinExpr::new();
        e.add_term(2.0, VarId::from(3))
            .add_term(1.0, VarId::from(1))
            .add_term(-2.0, VarId::from(3))
            .add_term(4.0, VarId::from(1));
        let e = e.compact();
        assert_eq!(e.terms(), &[(VarId::from(1), 5.0)]);
    }

    #[test]
    fn constants_move_to_the_right_hand_side() {
        let mut lhs = LinExpr::new();
        lhs.add_term(1.0, VarId::from(0)).add_constant(-7.0);
        let c = Constraint::new(
            "c".into(),
            ConstraintFamily::ServiceLevel,
            lhs,
            Sense::GreaterEqual,
            3.0,
        );
        assert_eq!(c.rhs, 10.0);
        assert_eq!(c.lhs.constant(), 0.0);

        let values: TiVec<VarId, f64> = vec![8.0].into();
        assert_eq!(c.violation(&values), 2.0);
        let values: TiVec<VarId, f64> = vec![12.0].into();
        assert_eq!(c.violation(&values), 0.0);
    }

    #[test]
    fn equality_violation_is_two_sided() {
        let lhs: LinExpr = [(VarId::from(0), 1.0), (VarId::from(1), -1.0)]
            .into_iter()
            .collect();
        let c = Constraint::new("eq".into(), ConstraintFamily::FlowConservation, lhs, Sense::Equal, 0.0);
        let values: TiVec<VarId, f64> = vec![1.0, 0.0].into();
        assert_eq!(c.violation(&values), 1.0);
        let values: TiVec<VarId, f64> = vec![0.0, 1.0].into();
        assert_eq!(c.violation(&values), 1.0);
    }
}
