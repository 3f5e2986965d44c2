use derive_more::Display;
use itertools::iproduct;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{CostBreakdown, IrpModel, Values};
use crate::problem::{Cost, NodeIndex, PeriodIndex, VehicleIndex};
use crate::solvers::{Solution, Status};

/// Route indicators within this distance of 1 count as selected
pub const EPSILON: f64 = 1e-5;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ReportError {
    /// The solver produced no assignment to report on
    #[display(fmt = "no solution to report, solver status: {}", status)]
    NoSolution { status: Status },
    #[display(fmt = "period {} is outside 1..={}", period, periods)]
    UnknownPeriod { period: PeriodIndex, periods: usize },
}

impl std::error::Error for ReportError {}

/// An arc driven by a vehicle in some period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RouteEdge {
    pub period: PeriodIndex,
    pub vehicle: VehicleIndex,
    pub from: NodeIndex,
    pub to: NodeIndex,
}

/// The cost contributions of one customer in one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CustomerCosts {
    pub customer: NodeIndex,
    pub waste: Cost,
    pub inventory: Cost,
}

/// Everything the reporter extracts from a solution, ready to be serialised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: Status,
    pub total: Cost,
    pub costs: CostBreakdown,
    pub routes: Vec<RouteEdge>,
    pub period: PeriodIndex,
    pub customers: Vec<CustomerCosts>,
}

/// Interprets a solver's assignment in terms of the model it solved.
pub struct SolutionReporter<'a> {
    model: &'a IrpModel,
    values: &'a Values,
    status: Status,
}

impl<'a> SolutionReporter<'a> {
    pub fn new(model: &'a IrpModel, solution: &'a Solution) -> Result<SolutionReporter<'a>, ReportError> {
        let values = solution.values().ok_or(ReportError::NoSolution {
            status: solution.status(),
        })?;

        Ok(SolutionReporter {
            model,
            values,
            status: solution.status(),
        })
    }

    pub fn costs(&self) -> CostBreakdown {
        self.model.objective().evaluate(self.values)
    }

    fn selected(&self, value: f64) -> bool {
        (value - 1.0).abs() <= EPSILON
    }

    /// Every selected arc, ordered by period, vehicle, origin and destination
    pub fn routes(&self) -> Vec<RouteEdge> {
        let vars = self.model.variables();
        iproduct!(vars.periods(), vars.vehicle_indices(), vars.arcs())
            .filter(|(t, k, arc)| self.selected(self.values[vars.route(*arc, *k, *t)]))
            .map(|(period, vehicle, arc)| RouteEdge {
                period,
                vehicle,
                from: arc.from(),
                to: arc.to(),
            })
            .collect()
    }

    /// The selected arcs grouped by period
    pub fn routes_by_period(&self) -> BTreeMap<PeriodIndex, Vec<RouteEdge>> {
        let mut grouped: BTreeMap<PeriodIndex, Vec<RouteEdge>> = BTreeMap::new();
        for edge in self.routes() {
            grouped.entry(edge.period).or_default().push(edge);
        }
        grouped
    }

    /// Waste and inventory cost of every customer in `period`.
    ///
    /// Waste before the shelf life has elapsed is not charged, matching the objective.
    pub fn customer_costs(&self, period: PeriodIndex) -> Result<Vec<CustomerCosts>, ReportError> {
        let vars = self.model.variables();
        if !vars.periods().contains(&period) {
            return Err(ReportError::UnknownPeriod {
                period,
                periods: *vars.periods().end(),
            });
        }

        let objective = self.model.objective();
        let waste_rate = if period >= objective.shelf_life() {
            objective.spoilage_cost()
        } else {
            0.0
        };

        Ok(vars
            .customers()
            .map(|i| CustomerCosts {
                customer: i,
                waste: waste_rate * self.values[vars.waste(i, period)],
                inventory: objective.holding_cost() * self.values[vars.positive_inventory(i, period)],
            })
            .collect())
    }

    pub fn report(&self, period: PeriodIndex) -> Result<Report, ReportError> {
        let costs = self.costs();
        Ok(Report {
            status: self.status,
            total: costs.total(),
            costs,
            routes: self.routes(),
            period,
            customers: self.customer_costs(period)?,
        })
    }
}


#[cfg(all(test, feature = "microlp"))]
mod solved {
    use super::*;
    use crate::chance::SafetyStock;
    use crate::coefficients::FuelCoefficients;
    use crate::models::Family;
    use crate::problem::tests::file;
    use crate::problem::Parameters;
    use crate::solvers::microlp::MicroLp;
    use crate::solvers::MilpSolver;

    const TOL: f64 = 1e-5;

    #[test]
    fn single_customer_is_served_by_one_round_trip() {
        let mut f = file(2, 1, 1, 100.0);
        f.uncertainty = 0.0;
        let params = Parameters::new(f).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let solution = MicroLp.solve(&model, None).unwrap();
        assert_eq!(solution.status(), Status::Optimal);

        let vars = model.variables();
        let values = solution.values().unwrap();
        assert!(values[vars.delivery(1, 1, 1)] >= 100.0 - TOL);
        assert!(model.violations(values, 1e-6).is_empty());

        let reporter = SolutionReporter::new(&model, &solution).unwrap();
        let edges: Vec<(NodeIndex, NodeIndex)> = reporter.routes().iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(edges, vec![(0, 1), (1, 0)]);

        let coefficients = FuelCoefficients::from_parameters(&params);
        let fuel = coefficients.traversal_cost(&params, 0, 1)
            + coefficients.traversal_cost(&params, 1, 0)
            + 100.0 * coefficients.load_cost(&params, 0, 1);
        let driver = params.wage() * (params.travel_time(0, 1) + params.travel_time(1, 0));

        let costs = reporter.costs();
        assert!((costs.inventory - 0.5 * 100.0).abs() < 1e-4);
        assert!(costs.waste.abs() < 1e-6);
        assert!((costs.fuel - fuel).abs() < 1e-4);
        assert!((costs.driver - driver).abs() < 1e-4);
    }

    #[test]
    fn stock_carried_past_its_shelf_life_is_wasted() {
        // one expensive trip in period 1 must cover both periods
        let mut f = file(2, 1, 2, 0.0);
        f.demand[1] = vec![0.0, 30.0, 12.0];
        f.distances = vec![vec![0.0, 1e6], vec![1e6, 0.0]];
        let params = Parameters::new(f).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let solution = MicroLp.solve(&model, None).unwrap();
        assert_eq!(solution.status(), Status::Optimal);

        let vars = model.variables();
        let values = solution.values().unwrap();
        assert!(model.violations(values, 1e-6).is_empty());

        let delivered = values[vars.delivery(1, 1, 1)];
        let carried = values[vars.inventory(1, 1)];
        let wasted = values[vars.waste(1, 2)];
        let bound = SafetyStock::new(&params).rhs(1, 2);

        assert!((delivered - bound).abs() < 1e-4);
        assert!(values[vars.delivery(1, 1, 2)].abs() < TOL);
        assert!((carried - delivered).abs() < TOL);
        assert!(values[vars.waste(1, 1)].abs() < TOL);
        // W[1][2] >= I[1][1] - d[1][2], tight at the optimum
        assert!(wasted > 30.0);
        assert!((wasted - (carried - 12.0)).abs() < 1e-4);

        let reporter = SolutionReporter::new(&model, &solution).unwrap();
        let routes = reporter.routes_by_period();
        assert_eq!(routes[&1].len(), 2);
        assert!(!routes.contains_key(&2));

        let second = reporter.customer_costs(2).unwrap();
        assert!((second[0].waste - 5.0 * wasted).abs() < 1e-4);
        assert!((reporter.costs().waste - 5.0 * wasted).abs() < 1e-4);
    }

    #[test]
    fn solved_values_respect_the_model_structure() {
        let params = Parameters::new(file(3, 1, 3, 20.0)).unwrap();
        let model = IrpModel::build(&params).unwrap();
        let solution = MicroLp.solve(&model, None).unwrap();
        let values = solution.values().unwrap();
        let vars = model.variables();

        for (i, t) in iproduct!(vars.customers(), vars.periods()) {
            let inventory = values[vars.inventory(i, t)];
            assert!(values[vars.positive_inventory(i, t)] >= inventory.max(0.0) - TOL);
            if t < params.shelf_life() {
                assert!(values[vars.waste(i, t)].abs() < TOL);
            }
        }

        for (t, k) in iproduct!(vars.periods(), vars.vehicle_indices()) {
            for i in vars.customers() {
                let inflow: f64 = vars.incoming(i).map(|a| values[vars.route(a, k, t)]).sum();
                let outflow: f64 = vars.outgoing(i).map(|a| values[vars.route(a, k, t)]).sum();
                assert!((inflow - outflow).abs() < TOL);
            }
            for arc in vars.arcs() {
                let load = values[vars.load(arc, k, t)];
                assert!(load <= params.capacity() * values[vars.route(arc.reverse(), k, t)] + TOL);
            }
        }

        for var in vars.family(Family::Route) {
            let x = values[var];
            assert!(x.abs() < TOL || (x - 1.0).abs() < TOL);
        }

        let reporter = SolutionReporter::new(&model, &solution).unwrap();
        let total = model.objective().total().eval(values);
        assert!((reporter.costs().total() - total).abs() < 1e-4);
    }
}
