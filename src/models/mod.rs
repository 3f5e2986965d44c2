pub mod constraints;
pub mod expr;
pub mod model;
pub mod objective;
pub mod variables;

pub use expr::{Constraint, ConstraintFamily, LinExpr, Sense};
pub use model::{IrpModel, Violation};
pub use objective::{CostBreakdown, CostTerm, Objective};
pub use variables::{Arc, Domain, Family, VarId, VarKey, Variables};

use derive_more::Display;
use typed_index_collections::TiVec;

/// A value for every declared variable, indexed by [`VarId`]
pub type Values = TiVec<VarId, f64>;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ModelConstructionError {
    /// The safety-stock table does not match the problem sizes
    #[display(fmt = "safety stock table must be {:?}, got {:?}", expected, actual)]
    BoundsSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// A variable was addressed outside its family's index domain
    #[display(fmt = "{} is outside the index domain of family {}", index, family)]
    IndexOutOfDomain { family: Family, index: String },
}

impl std::error::Error for ModelConstructionError {}
