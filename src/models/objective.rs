use derive_more::Display;
use itertools::iproduct;
use log::debug;
use serde::Serialize;
use typed_index_collections::TiSlice;

use super::expr::LinExpr;
use super::variables::{VarId, Variables};
use crate::coefficients::FuelCoefficients;
use crate::problem::{Cost, Parameters};

/// The four additive cost terms of the objective
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CostTerm {
    #[display(fmt = "inventory")]
    Inventory,
    #[display(fmt = "waste")]
    Waste,
    #[display(fmt = "fuel")]
    Fuel,
    #[display(fmt = "driver")]
    Driver,
}

impl CostTerm {
    pub const ALL: [CostTerm; 4] = [
        CostTerm::Inventory,
        CostTerm::Waste,
        CostTerm::Fuel,
        CostTerm::Driver,
    ];
}

/// Numeric value of each cost term under some assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub inventory: Cost,
    pub waste: Cost,
    pub fuel: Cost,
    pub driver: Cost,
}

impl CostBreakdown {
    pub fn total(&self) -> Cost {
        self.inventory + self.waste + self.fuel + self.driver
    }

    pub fn get(&self, term: CostTerm) -> Cost {
        match term {
            CostTerm::Inventory => self.inventory,
            CostTerm::Waste => self.waste,
            CostTerm::Fuel => self.fuel,
            CostTerm::Driver => self.driver,
        }
    }
}

/// The minimisation objective, kept as four separately retrievable linear terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    inventory: LinExpr,
    waste: LinExpr,
    fuel: LinExpr,
    driver: LinExpr,
    holding_cost: Cost,
    spoilage_cost: Cost,
    shelf_life: usize,
}

impl Objective {
    pub fn new(
        parameters: &Parameters,
        coefficients: &FuelCoefficients,
        vars: &Variables,
    ) -> Objective {
        let h = parameters.holding_cost();
        let p = parameters.spoilage_cost();
        let m = parameters.shelf_life();

        // h * sum Ip[i][t]
        let inventory = iproduct!(vars.customers(), vars.periods())
            .map(|(i, t)| (vars.positive_inventory(i, t), h))
            .collect::<LinExpr>()
            .compact();

        // p * sum_{t >= m} W[i][t]
        let waste = iproduct!(vars.customers(), vars.periods())
            .filter(|(_, t)| *t >= m)
            .map(|(i, t)| (vars.waste(i, t), p))
            .collect::<LinExpr>()
            .compact();

        // l * (lambda * y * a * X + lambda * gamma * beta * a * f^2 * X + lambda * gamma * s' * (mu * X + F) * a)
        let fuel = iproduct!(vars.periods(), vars.vehicle_indices(), vars.arcs())
            .flat_map(|(t, k, arc)| {
                let (i, j) = (arc.from(), arc.to());
                [
                    (vars.route(arc, k, t), coefficients.traversal_cost(parameters, i, j)),
                    (vars.load(arc, k, t), coefficients.load_cost(parameters, i, j)),
                ]
            })
            .collect::<LinExpr>()
            .compact();

        // r * a / f * X
        let r = parameters.wage();
        let driver = iproduct!(vars.periods(), vars.vehicle_indices(), vars.arcs())
            .map(|(t, k, arc)| {
                let time = parameters.travel_time(arc.from(), arc.to());
                (vars.route(arc, k, t), r * time)
            })
            .collect::<LinExpr>()
            .compact();

        debug!(
            "objective terms: inventory {}, waste {}, fuel {}, driver {}",
            inventory.terms().len(),
            waste.terms().len(),
            fuel.terms().len(),
            driver.terms().len()
        );

        Objective {
            inventory,
            waste,
            fuel,
            driver,
            holding_cost: h,
            spoilage_cost: p,
            shelf_life: m,
        }
    }

    pub fn term(&self, term: CostTerm) -> &LinExpr {
        match term {
            CostTerm::Inventory => &self.inventory,
            CostTerm::Waste => &self.waste,
            CostTerm::Fuel => &self.fuel,
            CostTerm::Driver => &self.driver,
        }
    }

    /// The sum of all four terms
    pub fn total(&self) -> LinExpr {
        let mut total = LinExpr::new();
        for term in CostTerm::ALL {
            total += self.term(term);
        }
        total.compact()
    }

    pub fn evaluate(&self, values: &TiSlice<VarId, f64>) -> CostBreakdown {
        CostBreakdown {
            inventory: self.inventory.eval(values),
            waste: self.waste.eval(values),
            fuel: self.fuel.eval(values),
            driver: self.driver.eval(values),
        }
    }

    /// Unit holding cost h
    pub fn holding_cost(&self) -> Cost {
        self.holding_cost
    }

    /// Unit spoilage cost p
    pub fn spoilage_cost(&self) -> Cost {
        self.spoilage_cost
    }

    /// Waste is only charged from this period on
    pub fn shelf_life(&self) -> usize {
        self.shelf_life
    }
}
