use itertools::iproduct;
use log::debug;

use super::expr::{Constraint, ConstraintFamily, LinExpr, Sense};
use super::variables::Variables;
use crate::chance::SafetyStock;
use crate::problem::{NodeIndex, Parameters, PeriodIndex, Quantity};

/// Builds every constraint family of the model over the variable schema.
///
/// Self-loops never appear: arcs are only ever taken from [`Variables::arcs`],
/// [`Variables::outgoing`] and [`Variables::incoming`]. Sums over `s < 1` are empty ranges.
pub struct ConstraintAssembler<'a> {
    parameters: &'a Parameters,
    vars: &'a Variables,
    safety_stock: &'a SafetyStock,
}

impl<'a> ConstraintAssembler<'a> {
    pub fn new(
        parameters: &'a Parameters,
        vars: &'a Variables,
        safety_stock: &'a SafetyStock,
    ) -> ConstraintAssembler<'a> {
        ConstraintAssembler {
            parameters,
            vars,
            safety_stock,
        }
    }

    /// All families, in the order of [`ConstraintFamily`]
    pub fn assemble(&self) -> Vec<Constraint> {
        let families = [
            (ConstraintFamily::InventoryBalance, self.inventory_balance()),
            (ConstraintFamily::PositiveInventory, self.positive_inventory()),
            (ConstraintFamily::Spoilage, self.spoilage()),
            (ConstraintFamily::FlowConservation, self.flow_conservation()),
            (ConstraintFamily::SingleVisit, self.single_visit()),
            (ConstraintFamily::LoadConservation, self.load_conservation()),
            (ConstraintFamily::Capacity, self.capacity()),
            (ConstraintFamily::ServiceLevel, self.service_level()),
        ];

        let mut constraints = Vec::new();
        for (family, built) in families {
            debug!("{}: {} constraints", family, built.len());
            constraints.extend(built);
        }
        constraints
    }

    /// sum_{s in periods} d[i][s]
    fn demand_over(&self, customer: NodeIndex, periods: impl Iterator<Item = PeriodIndex>) -> Quantity {
        periods.map(|s| self.parameters.demand(customer, s)).sum()
    }

    /// sum_{s <= t, k} Q[i][k][s]
    fn cumulative_delivery(&self, expr: &mut LinExpr, coeff: f64, customer: NodeIndex, period: PeriodIndex) {
        for (s, k) in iproduct!(1..=period, self.vars.vehicle_indices()) {
            expr.add_term(coeff, self.vars.delivery(customer, k, s));
        }
    }

    /// I[i][t] = sum_{s<=t,k} Q[i][k][s] - sum_{s<t} (d[i][s] + W[i][s])
    pub fn inventory_balance(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(vars.customers(), vars.periods())
            .map(|(i, t)| {
                let mut lhs = LinExpr::new();
                lhs.add_term(1.0, vars.inventory(i, t));
                self.cumulative_delivery(&mut lhs, -1.0, i, t);
                for s in 1..t {
                    lhs.add_term(1.0, vars.waste(i, s));
                }
                let consumed = self.demand_over(i, 1..t);

                Constraint::new(
                    format!("inventory_balance_{i}_{t}"),
                    ConstraintFamily::InventoryBalance,
                    lhs,
                    Sense::Equal,
                    -consumed,
                )
            })
            .collect()
    }

    /// Ip[i][t] >= I[i][t]. Non-negativity of Ip is part of its domain.
    pub fn positive_inventory(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(vars.customers(), vars.periods())
            .map(|(i, t)| {
                let mut lhs = LinExpr::new();
                lhs.add_term(1.0, vars.positive_inventory(i, t))
                    .add_term(-1.0, vars.inventory(i, t));

                Constraint::new(
                    format!("positive_inventory_{i}_{t}"),
                    ConstraintFamily::PositiveInventory,
                    lhs,
                    Sense::GreaterEqual,
                    0.0,
                )
            })
            .collect()
    }

    /// For t >= m:
    /// `W[i][t] >= I[i][t-m+1] - sum_{a=t-m+2..t} d[i][a] - sum_{a=t-m+2..t-1} W[i][a]`,
    /// and `W[i][t] = 0` before the shelf life can have elapsed.
    pub fn spoilage(&self) -> Vec<Constraint> {
        let vars = self.vars;
        let m = self.parameters.shelf_life();
        iproduct!(vars.customers(), vars.periods())
            .map(|(i, t)| {
                let mut lhs = LinExpr::new();
                lhs.add_term(1.0, vars.waste(i, t));

                if t < m {
                    return Constraint::new(
                        format!("spoilage_{i}_{t}"),
                        ConstraintFamily::Spoilage,
                        lhs,
                        Sense::Equal,
                        0.0,
                    );
                }

                // first period still within the shelf life of stock held at the end of t - m + 1
                let fresh = t + 2 - m;
                lhs.add_term(-1.0, vars.inventory(i, t + 1 - m));
                for a in fresh..t {
                    lhs.add_term(1.0, vars.waste(i, a));
                }
                let consumed = self.demand_over(i, fresh..=t);

                Constraint::new(
                    format!("spoilage_{i}_{t}"),
                    ConstraintFamily::Spoilage,
                    lhs,
                    Sense::GreaterEqual,
                    -consumed,
                )
            })
            .collect()
    }

    /// In-degree equals out-degree at every customer, per vehicle and period
    pub fn flow_conservation(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(vars.customers(), vars.vehicle_indices(), vars.periods())
            .map(|(i, k, t)| {
                let mut lhs = LinExpr::new();
                for arc in vars.incoming(i) {
                    lhs.add_term(1.0, vars.route(arc, k, t));
                }
                for arc in vars.outgoing(i) {
                    lhs.add_term(-1.0, vars.route(arc, k, t));
                }

                Constraint::new(
                    format!("flow_conservation_{i}_{k}_{t}"),
                    ConstraintFamily::FlowConservation,
                    lhs,
                    Sense::Equal,
                    0.0,
                )
            })
            .collect()
    }

    /// Each vehicle leaves every node, depot included, at most once per period
    pub fn single_visit(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(0..vars.nodes(), vars.vehicle_indices(), vars.periods())
            .map(|(i, k, t)| {
                let lhs = vars
                    .outgoing(i)
                    .map(|arc| (vars.route(arc, k, t), 1.0))
                    .collect::<LinExpr>();

                Constraint::new(
                    format!("single_visit_{i}_{k}_{t}"),
                    ConstraintFamily::SingleVisit,
                    lhs,
                    Sense::LessEqual,
                    1.0,
                )
            })
            .collect()
    }

    /// sum_j F[i][j][k][t] = sum_j F[j][i][k][t] - Q[i][k][t]
    pub fn load_conservation(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(vars.customers(), vars.vehicle_indices(), vars.periods())
            .map(|(i, k, t)| {
                let mut lhs = LinExpr::new();
                for arc in vars.outgoing(i) {
                    lhs.add_term(1.0, vars.load(arc, k, t));
                }
                for arc in vars.incoming(i) {
                    lhs.add_term(-1.0, vars.load(arc, k, t));
                }
                lhs.add_term(1.0, vars.delivery(i, k, t));

                Constraint::new(
                    format!("load_conservation_{i}_{k}_{t}"),
                    ConstraintFamily::LoadConservation,
                    lhs,
                    Sense::Equal,
                    0.0,
                )
            })
            .collect()
    }

    /// F[i][j][k][t] <= c * X[j][i][k][t]. The load is coupled to the indicator of the
    /// reverse arc, and this orientation must be kept.
    pub fn capacity(&self) -> Vec<Constraint> {
        let vars = self.vars;
        let c = self.parameters.capacity();
        iproduct!(vars.arcs(), vars.vehicle_indices(), vars.periods())
            .map(|(arc, k, t)| {
                let mut lhs = LinExpr::new();
                lhs.add_term(1.0, vars.load(arc, k, t))
                    .add_term(-c, vars.route(arc.reverse(), k, t));

                Constraint::new(
                    format!("capacity_{}_{}_{k}_{t}", arc.from(), arc.to()),
                    ConstraintFamily::Capacity,
                    lhs,
                    Sense::LessEqual,
                    0.0,
                )
            })
            .collect()
    }

    /// sum_{s<=t,k} Q[i][k][s] - sum_{s<t} W[i][s] >= rhs[i][t]
    pub fn service_level(&self) -> Vec<Constraint> {
        let vars = self.vars;
        iproduct!(vars.customers(), vars.periods())
            .map(|(i, t)| {
                let mut lhs = LinExpr::new();
                self.cumulative_delivery(&mut lhs, 1.0, i, t);
                for s in 1..t {
                    lhs.add_term(-1.0, vars.waste(i, s));
                }

                Constraint::new(
                    format!("service_level_{i}_{t}"),
                    ConstraintFamily::ServiceLevel,
                    lhs,
                    Sense::GreaterEqual,
                    self.safety_stock.rhs(i, t),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::variables::{Family, VarId};
    use crate::problem::tests::file;

    struct Fixture {
        params: Parameters,
        vars: Variables,
        stock: SafetyStock,
    }

    impl Fixture {
        fn new(params: Parameters) -> Fixture {
            let vars = Variables::new(params.nodes(), params.vehicles(), params.periods());
            let stock = SafetyStock::new(&params);
            Fixture { params, vars, stock }
        }

        fn assembler(&self) -> ConstraintAssembler<'_> {
            ConstraintAssembler::new(&self.params, &self.vars, &self.stock)
        }
    }

    fn coeff(c: &Constraint, var: VarId) -> f64 {
        c.lhs
            .terms()
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, coeff)| *coeff)
            .unwrap_or(0.0)
    }

    fn find<'c>(cs: &'c [Constraint], name: &str) -> &'c Constraint {
        cs.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn first_period_sums_are_empty() {
        let fx = Fixture::new(Parameters::new(file(3, 2, 3, 10.0)).unwrap());
        let balance = fx.assembler().inventory_balance();
        let first = find(&balance, "inventory_balance_1_1");
        assert_eq!(first.rhs, 0.0);
        assert_eq!(first.lhs.terms().len(), 1 + 2);
        assert!(first
            .lhs
            .terms()
            .iter()
            .all(|(v, _)| fx.vars.key(*v).family() != Family::Waste));

        let third = find(&balance, "inventory_balance_2_3");
        // demand of periods 1 and 2, not the current one
        assert_eq!(third.rhs, -20.0);
        assert_eq!(coeff(third, fx.vars.waste(2, 2)), 1.0);
        assert_eq!(coeff(third, fx.vars.waste(2, 3)), 0.0);
        assert_eq!(coeff(third, fx.vars.delivery(2, 2, 3)), -1.0);
        assert_eq!(coeff(third, fx.vars.inventory(2, 3)), 1.0);
    }

    #[test]
    fn spoilage_is_fixed_to_zero_before_shelf_life() {
        let mut f = file(3, 1, 4, 5.0);
        f.shelf_life = 3;
        let fx = Fixture::new(Parameters::new(f).unwrap());
        let spoilage = fx.assembler().spoilage();
        assert_eq!(spoilage.len(), 2 * 4);
        for t in 1..3 {
            let c = find(&spoilage, &format!("spoilage_1_{t}"));
            assert_eq!(c.sense, Sense::Equal);
            assert_eq!(c.rhs, 0.0);
            assert_eq!(c.lhs.terms(), &[(fx.vars.waste(1, t), 1.0)]);
        }

        // t = 4, m = 3: W[4] >= I[2] - d[3] - d[4] - W[3]
        let c = find(&spoilage, "spoilage_1_4");
        assert_eq!(c.sense, Sense::GreaterEqual);
        assert_eq!(c.rhs, -10.0);
        assert_eq!(coeff(c, fx.vars.waste(1, 4)), 1.0);
        assert_eq!(coeff(c, fx.vars.inventory(1, 2)), -1.0);
        assert_eq!(coeff(c, fx.vars.waste(1, 3)), 1.0);
        assert_eq!(c.lhs.terms().len(), 3);
    }

    #[test]
    fn spoilage_becomes_active_at_shelf_life() {
        let mut f = file(2, 1, 2, 0.0);
        f.demand[1] = vec![0.0, 30.0, 12.0];
        f.shelf_life = 2;
        let fx = Fixture::new(Parameters::new(f).unwrap());
        let spoilage = fx.assembler().spoilage();

        let first = find(&spoilage, "spoilage_1_1");
        assert_eq!(first.sense, Sense::Equal);

        // W[2] >= I[1] - d[2]
        let second = find(&spoilage, "spoilage_1_2");
        assert_eq!(second.sense, Sense::GreaterEqual);
        assert_eq!(second.rhs, -12.0);
        assert_eq!(coeff(second, fx.vars.inventory(1, 1)), -1.0);
        assert_eq!(second.lhs.terms().len(), 2);
    }

    #[test]
    fn shelf_life_of_one_bounds_waste_by_inventory() {
        let mut f = file(2, 1, 2, 4.0);
        f.shelf_life = 1;
        let fx = Fixture::new(Parameters::new(f).unwrap());
        let spoilage = fx.assembler().spoilage();
        let c = find(&spoilage, "spoilage_1_2");
        assert_eq!(c.rhs, 0.0);
        assert_eq!(coeff(c, fx.vars.inventory(1, 2)), -1.0);
        assert_eq!(coeff(c, fx.vars.waste(1, 2)), 1.0);
    }

    #[test]
    fn routing_families_never_reference_self_loops() {
        let fx = Fixture::new(Parameters::new(file(4, 2, 2, 1.0)).unwrap());
        let assembler = fx.assembler();
        let routing = [
            assembler.flow_conservation(),
            assembler.single_visit(),
            assembler.load_conservation(),
            assembler.capacity(),
        ];
        for c in routing.iter().flatten() {
            for (v, _) in c.lhs.terms() {
                match fx.vars.key(*v) {
                    crate::models::VarKey::Route { arc, .. }
                    | crate::models::VarKey::Load { arc, .. } => assert_ne!(arc.from(), arc.to()),
                    _ => {}
                }
            }
        }

        assert_eq!(routing[0].len(), 3 * 2 * 2);
        assert_eq!(routing[1].len(), 4 * 2 * 2);
        assert_eq!(routing[2].len(), 3 * 2 * 2);
        assert_eq!(routing[3].len(), 12 * 2 * 2);
        // every flow row has V - 1 incoming and V - 1 outgoing arcs
        assert!(routing[0].iter().all(|c| c.lhs.terms().len() == 6));
    }

    #[test]
    fn capacity_couples_load_to_the_reverse_arc() {
        let fx = Fixture::new(Parameters::new(file(3, 1, 1, 1.0)).unwrap());
        let capacity = fx.assembler().capacity();
        let c = find(&capacity, "capacity_0_2_1_1");
        let arc = fx.vars.arc(0, 2).unwrap();
        assert_eq!(coeff(c, fx.vars.load(arc, 1, 1)), 1.0);
        assert_eq!(coeff(c, fx.vars.route(arc.reverse(), 1, 1)), -fx.params.capacity());
        assert_eq!(coeff(c, fx.vars.route(arc, 1, 1)), 0.0);
        assert_eq!(c.sense, Sense::LessEqual);
    }

    #[test]
    fn load_conservation_subtracts_delivery() {
        let fx = Fixture::new(Parameters::new(file(3, 1, 1, 1.0)).unwrap());
        let load = fx.assembler().load_conservation();
        let c = find(&load, "load_conservation_1_1_1");
        let out = fx.vars.arc(1, 2).unwrap();
        assert_eq!(coeff(c, fx.vars.load(out, 1, 1)), 1.0);
        assert_eq!(coeff(c, fx.vars.load(out.reverse(), 1, 1)), -1.0);
        assert_eq!(coeff(c, fx.vars.delivery(1, 1, 1)), 1.0);
        assert_eq!(c.rhs, 0.0);
    }

    #[test]
    fn service_level_uses_safety_stock() {
        let mut f = file(2, 2, 2, 100.0);
        f.uncertainty = 0.0;
        let fx = Fixture::new(Parameters::new(f).unwrap());
        let service = fx.assembler().service_level();
        let first = find(&service, "service_level_1_1");
        assert_eq!(first.rhs, 100.0);
        assert_eq!(first.sense, Sense::GreaterEqual);
        assert_eq!(first.lhs.terms().len(), 2);

        let second = find(&service, "service_level_1_2");
        assert_eq!(second.rhs, 200.0);
        assert_eq!(coeff(second, fx.vars.waste(1, 1)), -1.0);
        assert_eq!(coeff(second, fx.vars.delivery(1, 2, 1)), 1.0);
        assert_eq!(coeff(second, fx.vars.delivery(1, 1, 2)), 1.0);
    }

    #[test]
    fn families_are_emitted_in_order() {
        let fx = Fixture::new(Parameters::new(file(3, 1, 2, 1.0)).unwrap());
        let all = fx.assembler().assemble();
        assert!(all.windows(2).all(|w| w[0].family <= w[1].family));
        let names: std::collections::HashSet<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), all.len());
    }
}
