use derive_more::{Display, From, Into};
use itertools::iproduct;
use serde::Serialize;
use std::ops::{Range, RangeInclusive};
use typed_index_collections::{TiSlice, TiVec};

use super::ModelConstructionError;
use crate::problem::{NodeIndex, PeriodIndex, VehicleIndex};

/// Position of a variable in the flat variable store
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct VarId(usize);

/// The variable families of the model
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Family {
    /// `X[i][j][k][t]`, 1 iff vehicle k drives directly from i to j in period t
    #[display(fmt = "X")]
    Route,
    /// `F[i][j][k][t]`, load carried over (i, j)
    #[display(fmt = "F")]
    Load,
    /// `Q[i][k][t]`, quantity delivered to customer i
    #[display(fmt = "Q")]
    Delivery,
    /// `I[i][t]`, expected inventory at the end of the period
    #[display(fmt = "I")]
    Inventory,
    /// `Ip[i][t]`, positive part of the inventory
    #[display(fmt = "Ip")]
    PositiveInventory,
    /// `W[i][t]`, expected spoilage
    #[display(fmt = "W")]
    Waste,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Route,
        Family::Load,
        Family::Delivery,
        Family::Inventory,
        Family::PositiveInventory,
        Family::Waste,
    ];

    pub fn domain(&self) -> Domain {
        match self {
            Family::Route => Domain::Binary,
            Family::Inventory => Domain::Free,
            Family::Load | Family::Delivery | Family::PositiveInventory | Family::Waste => {
                Domain::NonNegative
            }
        }
    }
}

/// The value domain of a variable
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Domain {
    Binary,
    NonNegative,
    Free,
}

impl Domain {
    /// (lower, upper)
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Domain::Binary => (0.0, 1.0),
            Domain::NonNegative => (0.0, f64::INFINITY),
            Domain::Free => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Domain::Binary)
    }
}

/// A directed edge between two distinct nodes. Self-loops cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Arc {
    from: NodeIndex,
    to: NodeIndex,
}

impl Arc {
    pub fn from(&self) -> NodeIndex {
        self.from
    }

    pub fn to(&self) -> NodeIndex {
        self.to
    }

    pub fn reverse(&self) -> Arc {
        Arc {
            from: self.to,
            to: self.from,
        }
    }
}

/// The full index of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VarKey {
    Route {
        arc: Arc,
        vehicle: VehicleIndex,
        period: PeriodIndex,
    },
    Load {
        arc: Arc,
        vehicle: VehicleIndex,
        period: PeriodIndex,
    },
    Delivery {
        customer: NodeIndex,
        vehicle: VehicleIndex,
        period: PeriodIndex,
    },
    Inventory {
        customer: NodeIndex,
        period: PeriodIndex,
    },
    PositiveInventory {
        customer: NodeIndex,
        period: PeriodIndex,
    },
    Waste {
        customer: NodeIndex,
        period: PeriodIndex,
    },
}

impl VarKey {
    pub fn family(&self) -> Family {
        match self {
            VarKey::Route { .. } => Family::Route,
            VarKey::Load { .. } => Family::Load,
            VarKey::Delivery { .. } => Family::Delivery,
            VarKey::Inventory { .. } => Family::Inventory,
            VarKey::PositiveInventory { .. } => Family::PositiveInventory,
            VarKey::Waste { .. } => Family::Waste,
        }
    }

    pub fn domain(&self) -> Domain {
        self.family().domain()
    }
}

impl std::fmt::Display for VarKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let family = self.family();
        match *self {
            VarKey::Route { arc, vehicle, period } | VarKey::Load { arc, vehicle, period } => {
                write!(f, "{family}_{}_{}_{vehicle}_{period}", arc.from, arc.to)
            }
            VarKey::Delivery {
                customer,
                vehicle,
                period,
            } => write!(f, "{family}_{customer}_{vehicle}_{period}"),
            VarKey::Inventory { customer, period }
            | VarKey::PositiveInventory { customer, period }
            | VarKey::Waste { customer, period } => write!(f, "{family}_{customer}_{period}"),
        }
    }
}

/// The decision variable schema: a canonical enumeration of every variable of the model,
/// backed by one flat store.
///
/// Variables are laid out family by family in the order of [`Family::ALL`], and within a
/// family by period, then vehicle, then node(s). Every lookup is pure index arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct Variables {
    nodes: usize,
    vehicles: usize,
    periods: usize,
    keys: TiVec<VarId, VarKey>,
    ranges: [Range<usize>; 6],
}

impl Variables {
    pub fn new(nodes: usize, vehicles: usize, periods: usize) -> Variables {
        let mut vars = Variables {
            nodes,
            vehicles,
            periods,
            keys: TiVec::new(),
            ranges: Default::default(),
        };

        for family in Family::ALL {
            let f = Self::slot(family);
            let start = vars.keys.len();
            vars.ranges[f] = start..start;
            let keys: Vec<VarKey> = match family {
                Family::Route => iproduct!(vars.periods(), vars.vehicle_indices(), vars.arcs())
                    .map(|(period, vehicle, arc)| VarKey::Route { arc, vehicle, period })
                    .collect(),
                Family::Load => iproduct!(vars.periods(), vars.vehicle_indices(), vars.arcs())
                    .map(|(period, vehicle, arc)| VarKey::Load { arc, vehicle, period })
                    .collect(),
                Family::Delivery => {
                    iproduct!(vars.periods(), vars.vehicle_indices(), vars.customers())
                        .map(|(period, vehicle, customer)| VarKey::Delivery {
                            customer,
                            vehicle,
                            period,
                        })
                        .collect()
                }
                Family::Inventory => iproduct!(vars.periods(), vars.customers())
                    .map(|(period, customer)| VarKey::Inventory { customer, period })
                    .collect(),
                Family::PositiveInventory => iproduct!(vars.periods(), vars.customers())
                    .map(|(period, customer)| VarKey::PositiveInventory { customer, period })
                    .collect(),
                Family::Waste => iproduct!(vars.periods(), vars.customers())
                    .map(|(period, customer)| VarKey::Waste { customer, period })
                    .collect(),
            };

            for key in keys {
                let id = vars.keys.push_and_get_key(key);
                debug_assert_eq!(Some(id), vars.index_of(&key));
            }
            vars.ranges[f] = start..vars.keys.len();
        }

        vars
    }

    /// The number of nodes, including the depot
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn customers(&self) -> Range<NodeIndex> {
        1..self.nodes
    }

    pub fn vehicle_indices(&self) -> RangeInclusive<VehicleIndex> {
        1..=self.vehicles
    }

    pub fn periods(&self) -> RangeInclusive<PeriodIndex> {
        1..=self.periods
    }

    /// Every arc (i, j) with i != j, ordered by origin then destination
    pub fn arcs(&self) -> impl Iterator<Item = Arc> + Clone {
        iproduct!(0..self.nodes, 0..self.nodes)
            .filter(|(from, to)| from != to)
            .map(|(from, to)| Arc { from, to })
    }

    /// The arc from `from` to `to`, if it exists
    pub fn arc(&self, from: NodeIndex, to: NodeIndex) -> Option<Arc> {
        (from != to && from < self.nodes && to < self.nodes).then(|| Arc { from, to })
    }

    /// The arcs leaving `node`
    pub fn outgoing(&self, node: NodeIndex) -> impl Iterator<Item = Arc> + Clone {
        (0..self.nodes)
            .filter(move |to| *to != node)
            .map(move |to| Arc { from: node, to })
    }

    /// The arcs entering `node`
    pub fn incoming(&self, node: NodeIndex) -> impl Iterator<Item = Arc> + Clone {
        (0..self.nodes)
            .filter(move |from| *from != node)
            .map(move |from| Arc { from, to: node })
    }

    /// Total number of variables
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &TiSlice<VarId, VarKey> {
        &self.keys
    }

    pub fn key(&self, var: VarId) -> &VarKey {
        &self.keys[var]
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &VarKey)> {
        self.keys.iter_enumerated()
    }

    /// The variables of one family, in canonical order
    pub fn family(&self, family: Family) -> impl Iterator<Item = VarId> {
        self.ranges[Self::slot(family)].clone().map(VarId::from)
    }

    fn slot(family: Family) -> usize {
        match family {
            Family::Route => 0,
            Family::Load => 1,
            Family::Delivery => 2,
            Family::Inventory => 3,
            Family::PositiveInventory => 4,
            Family::Waste => 5,
        }
    }

    pub fn route(&self, arc: Arc, vehicle: VehicleIndex, period: PeriodIndex) -> VarId {
        VarId::from(self.ranges[Self::slot(Family::Route)].start + self.arc_block(arc, vehicle, period))
    }

    pub fn load(&self, arc: Arc, vehicle: VehicleIndex, period: PeriodIndex) -> VarId {
        VarId::from(self.ranges[Self::slot(Family::Load)].start + self.arc_block(arc, vehicle, period))
    }

    pub fn delivery(&self, customer: NodeIndex, vehicle: VehicleIndex, period: PeriodIndex) -> VarId {
        debug_assert!(self.customers().contains(&customer));
        debug_assert!(self.vehicle_indices().contains(&vehicle));
        debug_assert!(self.periods().contains(&period));
        let block = (period - 1) * self.vehicles + (vehicle - 1);
        VarId::from(self.ranges[Self::slot(Family::Delivery)].start + block * (self.nodes - 1) + customer - 1)
    }

    pub fn inventory(&self, customer: NodeIndex, period: PeriodIndex) -> VarId {
        VarId::from(self.ranges[Self::slot(Family::Inventory)].start + self.customer_block(customer, period))
    }

    pub fn positive_inventory(&self, customer: NodeIndex, period: PeriodIndex) -> VarId {
        VarId::from(self.ranges[Self::slot(Family::PositiveInventory)].start + self.customer_block(customer, period))
    }

    pub fn waste(&self, customer: NodeIndex, period: PeriodIndex) -> VarId {
        VarId::from(self.ranges[Self::slot(Family::Waste)].start + self.customer_block(customer, period))
    }

    fn arc_block(&self, arc: Arc, vehicle: VehicleIndex, period: PeriodIndex) -> usize {
        debug_assert!(arc.from < self.nodes && arc.to < self.nodes);
        debug_assert!(self.vehicle_indices().contains(&vehicle));
        debug_assert!(self.periods().contains(&period));
        let n = self.nodes;
        let block = (period - 1) * self.vehicles + (vehicle - 1);
        let offset = arc.from * (n - 1) + if arc.to < arc.from { arc.to } else { arc.to - 1 };
        block * n * (n - 1) + offset
    }

    fn customer_block(&self, customer: NodeIndex, period: PeriodIndex) -> usize {
        debug_assert!(self.customers().contains(&customer));
        debug_assert!(self.periods().contains(&period));
        (period - 1) * (self.nodes - 1) + customer - 1
    }

    fn in_domain(&self, key: &VarKey) -> bool {
        let arc_ok = |arc: &Arc| arc.from != arc.to && arc.from < self.nodes && arc.to < self.nodes;
        match key {
            VarKey::Route { arc, vehicle, period } | VarKey::Load { arc, vehicle, period } => {
                arc_ok(arc)
                    && self.vehicle_indices().contains(vehicle)
                    && self.periods().contains(period)
            }
            VarKey::Delivery {
                customer,
                vehicle,
                period,
            } => {
                self.customers().contains(customer)
                    && self.vehicle_indices().contains(vehicle)
                    && self.periods().contains(period)
            }
            VarKey::Inventory { customer, period }
            | VarKey::PositiveInventory { customer, period }
            | VarKey::Waste { customer, period } => {
                self.customers().contains(customer) && self.periods().contains(period)
            }
        }
    }

    /// The position of `key` in the store, or `None` if it lies outside its family's index domain
    pub fn index_of(&self, key: &VarKey) -> Option<VarId> {
        if !self.in_domain(key) {
            return None;
        }

        Some(match *key {
            VarKey::Route { arc, vehicle, period } => self.route(arc, vehicle, period),
            VarKey::Load { arc, vehicle, period } => self.load(arc, vehicle, period),
            VarKey::Delivery {
                customer,
                vehicle,
                period,
            } => self.delivery(customer, vehicle, period),
            VarKey::Inventory { customer, period } => self.inventory(customer, period),
            VarKey::PositiveInventory { customer, period } => {
                self.positive_inventory(customer, period)
            }
            VarKey::Waste { customer, period } => self.waste(customer, period),
        })
    }

    /// Like [`Variables::index_of`], but reports the offending index as an error
    pub fn lookup(&self, key: &VarKey) -> Result<VarId, ModelConstructionError> {
        self.index_of(key)
            .ok_or_else(|| ModelConstructionError::IndexOutOfDomain {
                family: key.family(),
                index: key.to_string(),
            })
    }

    /// Looks up a route indicator by raw node indices; `None` for self-loops
    pub fn route_between(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        vehicle: VehicleIndex,
        period: PeriodIndex,
    ) -> Option<VarId> {
        let arc = self.arc(from, to)?;
        self.index_of(&VarKey::Route { arc, vehicle, period })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_per_family() {
        let vars = Variables::new(4, 2, 3);
        let count = |f| vars.family(f).count();
        assert_eq!(count(Family::Route), 3 * 2 * 4 * 3);
        assert_eq!(count(Family::Load), 3 * 2 * 4 * 3);
        assert_eq!(count(Family::Delivery), 3 * 2 * 3);
        assert_eq!(count(Family::Inventory), 3 * 3);
        assert_eq!(count(Family::PositiveInventory), 3 * 3);
        assert_eq!(count(Family::Waste), 3 * 3);
        assert_eq!(vars.len(), 144 + 18 + 27);
    }

    #[test]
    fn every_key_maps_back_to_its_position() {
        let vars = Variables::new(5, 3, 2);
        for (id, key) in vars.iter() {
            assert_eq!(vars.index_of(key), Some(id), "{}", key);
            assert_eq!(key.domain(), key.family().domain());
        }
    }

    #[test]
    fn self_loops_are_structurally_absent() {
        let vars = Variables::new(4, 1, 1);
        assert!(vars.arc(2, 2).is_none());
        assert!(vars.route_between(2, 2, 1, 1).is_none());
        assert!(vars.arcs().all(|a| a.from() != a.to()));
        assert_eq!(vars.outgoing(0).count(), 3);
        assert_eq!(vars.incoming(3).count(), 3);

        let loop_key = VarKey::Load {
            arc: Arc { from: 1, to: 1 },
            vehicle: 1,
            period: 1,
        };
        assert!(matches!(
            vars.lookup(&loop_key),
            Err(ModelConstructionError::IndexOutOfDomain {
                family: Family::Load,
                ..
            })
        ));
    }

    #[test]
    fn out_of_domain_indices_are_detected() {
        let vars = Variables::new(3, 2, 2);
        let bad = [
            VarKey::Delivery {
                customer: 0,
                vehicle: 1,
                period: 1,
            },
            VarKey::Inventory {
                customer: 1,
                period: 0,
            },
            VarKey::Waste {
                customer: 3,
                period: 1,
            },
            VarKey::Route {
                arc: Arc { from: 0, to: 1 },
                vehicle: 3,
                period: 1,
            },
        ];
        for key in bad {
            assert!(vars.index_of(&key).is_none(), "{}", key);
        }
    }

    #[test]
    fn names_follow_family_symbols() {
        let vars = Variables::new(3, 1, 1);
        let arc = vars.arc(0, 2).unwrap();
        assert_eq!(vars.key(vars.route(arc, 1, 1)).to_string(), "X_0_2_1_1");
        assert_eq!(vars.key(vars.load(arc.reverse(), 1, 1)).to_string(), "F_2_0_1_1");
        assert_eq!(vars.key(vars.delivery(2, 1, 1)).to_string(), "Q_2_1_1");
        assert_eq!(vars.key(vars.positive_inventory(1, 1)).to_string(), "Ip_1_1");
    }
}
