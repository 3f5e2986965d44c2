use log::info;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::problem::{ConfigurationError, ParameterFile, Parameters, PhysicalConstants, Quantity};

/// Describes the random instances produced by [`InstanceGenerator`].
///
/// Customers are scattered uniformly on a square of side `side` metres with the depot at its
/// centre. Every customer draws one demand mean from `demand` and keeps it for every period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGenerator {
    pub nodes: usize,
    pub vehicles: usize,
    pub periods: usize,
    pub side: f64,
    pub demand: Range<Quantity>,
    pub capacity: Quantity,
    pub seed: u64,
}

impl Default for InstanceGenerator {
    fn default() -> Self {
        InstanceGenerator {
            nodes: 6,
            vehicles: 2,
            periods: 3,
            side: 20_000.0,
            demand: 50.0..150.0,
            capacity: 1000.0,
            seed: 0,
        }
    }
}

impl InstanceGenerator {
    /// The depot followed by the customers' positions
    fn positions<R: Rng>(&self, rng: &mut R) -> Vec<(f64, f64)> {
        let centre = self.side / 2.0;
        std::iter::once((centre, centre))
            .chain((1..self.nodes).map(|_| (rng.gen_range(0.0..=self.side), rng.gen_range(0.0..=self.side))))
            .collect()
    }

    /// A random parameter file. The same seed always gives the same file.
    ///
    /// Fails if `side` is negative or not finite, since no square can be sampled from it.
    pub fn file(&self) -> Result<ParameterFile, ConfigurationError> {
        if !self.side.is_finite() {
            return Err(ConfigurationError::NotFinite("side", self.side));
        }
        if self.side < 0.0 {
            return Err(ConfigurationError::Negative("side", self.side));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let positions = self.positions(&mut rng);

        let distances = positions
            .iter()
            .map(|(x1, y1)| {
                positions
                    .iter()
                    .map(|(x2, y2)| (x1 - x2).hypot(y1 - y2))
                    .collect()
            })
            .collect();

        let demand = (0..self.nodes)
            .map(|i| {
                let mean = match i {
                    0 => 0.0,
                    _ if self.demand.is_empty() => self.demand.start,
                    _ => rng.gen_range(self.demand.clone()),
                };
                (0..=self.periods)
                    .map(|t| if t == 0 { 0.0 } else { mean })
                    .collect()
            })
            .collect();

        info!(
            "Generated instance with {} nodes, {} vehicles and {} periods from seed {}",
            self.nodes, self.vehicles, self.periods, self.seed
        );

        Ok(ParameterFile {
            nodes: self.nodes,
            vehicles: self.vehicles,
            periods: self.periods,
            capacity: self.capacity,
            fuel_price: 1.4,
            wage: 0.0022,
            shelf_life: 2,
            spoilage_cost: 5.0,
            holding_cost: 0.5,
            service_level: 0.95,
            uncertainty: 0.1,
            speed: 15.0,
            physics: PhysicalConstants::default(),
            demand,
            distances,
        })
    }

    /// A random, validated parameter store
    pub fn generate(&self) -> Result<Parameters, ConfigurationError> {
        Parameters::new(self.file()?)
    }
}
