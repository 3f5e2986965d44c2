use derive_more::Display;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// The type used for quantities (kg)
pub type Quantity = f64;
/// The type used for distance
pub type Distance = f64;
/// The type used for cost
pub type Cost = f64;

/// Node 0 is the depot, 1..V are customers
pub type NodeIndex = usize;
/// Vehicles are indexed 1..=K
pub type VehicleIndex = usize;
/// Periods are indexed 1..=T
pub type PeriodIndex = usize;

/// Engine, drivetrain and road constants of the fuel-consumption model.
///
/// The field names follow the symbols of the comprehensive emissions model:
/// `lambda = xi / (kappa * psi)`, `y = k_e * n_e * v_e`,
/// `gamma = 1 / (1000 * epsilon * varpi)`, `beta = 0.5 * c_d * a_e * rho` and
/// `s' = g * sin(phi) + g * c_r * cos(phi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Fuel-to-air mass ratio
    pub xi: f64,
    /// Heating value of a typical diesel fuel (kJ/g)
    pub kappa: f64,
    /// Conversion factor from g/s to L/s
    pub psi: f64,
    /// Engine friction factor (kJ/rev/L)
    pub k_e: f64,
    /// Engine speed (rev/s)
    pub n_e: f64,
    /// Engine displacement (L)
    pub v_e: f64,
    /// Air density (kg/m^3)
    pub rho: f64,
    /// Frontal surface area (m^2)
    pub a_e: f64,
    /// Curb weight of an empty vehicle (kg)
    pub mu: f64,
    /// Gravitational constant (m/s^2)
    pub g: f64,
    /// Road angle (radians)
    pub phi: f64,
    /// Coefficient of aerodynamic drag
    pub c_d: f64,
    /// Coefficient of rolling resistance
    pub c_r: f64,
    /// Vehicle drivetrain efficiency
    pub epsilon: f64,
    /// Efficiency parameter for diesel engines
    pub varpi: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            xi: 1.0,
            kappa: 44.0,
            psi: 737.0,
            k_e: 0.2,
            n_e: 33.0,
            v_e: 5.0,
            rho: 1.2041,
            a_e: 3.912,
            mu: 6350.0,
            g: 9.81,
            phi: 0.0,
            c_d: 0.7,
            c_r: 0.01,
            epsilon: 0.4,
            varpi: 0.9,
        }
    }
}

impl PhysicalConstants {
    fn named(&self) -> [(&'static str, f64); 15] {
        [
            ("xi", self.xi),
            ("kappa", self.kappa),
            ("psi", self.psi),
            ("k_e", self.k_e),
            ("n_e", self.n_e),
            ("v_e", self.v_e),
            ("rho", self.rho),
            ("a_e", self.a_e),
            ("mu", self.mu),
            ("g", self.g),
            ("phi", self.phi),
            ("c_d", self.c_d),
            ("c_r", self.c_r),
            ("epsilon", self.epsilon),
            ("varpi", self.varpi),
        ]
    }
}

/// The raw, unvalidated input as it is read from a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterFile {
    /// Number of nodes V, including the depot
    pub nodes: usize,
    /// Number of vehicles K
    pub vehicles: usize,
    /// Number of periods T
    pub periods: usize,
    /// Vehicle capacity c (kg)
    pub capacity: Quantity,
    /// Fuel price l (per L)
    pub fuel_price: Cost,
    /// Driver wage r (per second of travel)
    pub wage: Cost,
    /// Shelf life m, in periods
    pub shelf_life: usize,
    /// Unit cost of spoiled product p
    pub spoilage_cost: Cost,
    /// Unit holding cost h
    pub holding_cost: Cost,
    /// Target probability of not stocking out, alpha
    pub service_level: f64,
    /// Demand uncertainty coefficient C
    pub uncertainty: f64,
    /// Vehicle speed f (m/s)
    pub speed: f64,
    #[serde(default)]
    pub physics: PhysicalConstants,
    /// Mean demand, V rows and T + 1 columns. Row 0 and column 0 are unused.
    pub demand: Vec<Vec<Quantity>>,
    /// Distance matrix, V x V. The diagonal is ignored.
    pub distances: Vec<Vec<Distance>>,
}

#[derive(Debug, Display)]
pub enum ConfigurationError {
    #[display(fmt = "parameter `{}` must be non-negative, got {}", _0, _1)]
    Negative(&'static str, f64),
    #[display(fmt = "parameter `{}` must be finite, got {}", _0, _1)]
    NotFinite(&'static str, f64),
    #[display(fmt = "parameter `{}` must be strictly positive, got {}", _0, _1)]
    NotPositive(&'static str, f64),
    #[display(fmt = "service level must lie strictly between 0 and 1, got {}", _0)]
    ServiceLevelOutOfRange(f64),
    #[display(fmt = "set `{}` must have at least {} element(s), got {}", set, min, actual)]
    EmptySet {
        set: &'static str,
        min: usize,
        actual: usize,
    },
    #[display(fmt = "shelf life must be at least one period")]
    ShelfLifeZero,
    #[display(fmt = "distance matrix must be {:?}, got {:?}", expected, actual)]
    DistanceSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[display(fmt = "demand table must be {:?}, got {:?}", expected, actual)]
    DemandSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// One row of a table has a different length from the others
    #[display(fmt = "row {} of `{}` must have {} entries, got {}", row, table, expected, actual)]
    RaggedTable {
        table: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[display(fmt = "distance from {} to {} must be non-negative and finite, got {}", from, to, value)]
    InvalidDistance {
        from: NodeIndex,
        to: NodeIndex,
        value: Distance,
    },
    #[display(fmt = "demand of customer {} in period {} must be non-negative and finite, got {}", customer, period, value)]
    InvalidDemand {
        customer: NodeIndex,
        period: PeriodIndex,
        value: Quantity,
    },
    #[display(fmt = "malformed parameter file: {}", _0)]
    Parse(serde_json::Error),
}

impl std::error::Error for ConfigurationError {}

impl From<serde_json::Error> for ConfigurationError {
    fn from(e: serde_json::Error) -> Self {
        ConfigurationError::Parse(e)
    }
}

/// The shape of a nested table that could not be used
enum Shape {
    Rectangular(usize, usize),
    Ragged { row: usize, len: usize },
}

/// The validated parameter store. Immutable once constructed; use [`Parameters::with`]
/// to derive a store for a parameter variation.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    file: ParameterFile,
    demand: Array2<Quantity>,
    distances: Array2<Distance>,
}

impl Parameters {
    pub fn new(file: ParameterFile) -> Result<Parameters, ConfigurationError> {
        Self::check_sizes(&file)?;
        Self::check_scalars(&file)?;

        let (v, t) = (file.nodes, file.periods);
        let demand = Self::table(&file.demand, (v, t + 1)).map_err(|shape| match shape {
            Shape::Rectangular(rows, cols) => ConfigurationError::DemandSizeMismatch {
                expected: (v, t + 1),
                actual: (rows, cols),
            },
            Shape::Ragged { row, len } => ConfigurationError::RaggedTable {
                table: "demand",
                row,
                expected: t + 1,
                actual: len,
            },
        })?;
        let distances = Self::table(&file.distances, (v, v)).map_err(|shape| match shape {
            Shape::Rectangular(rows, cols) => ConfigurationError::DistanceSizeMismatch {
                expected: (v, v),
                actual: (rows, cols),
            },
            Shape::Ragged { row, len } => ConfigurationError::RaggedTable {
                table: "distances",
                row,
                expected: v,
                actual: len,
            },
        })?;

        for ((i, s), &value) in demand.indexed_iter() {
            if i > 0 && s > 0 && !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::InvalidDemand {
                    customer: i,
                    period: s,
                    value,
                });
            }
        }

        for ((i, j), &value) in distances.indexed_iter() {
            if i != j && !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::InvalidDistance {
                    from: i,
                    to: j,
                    value,
                });
            }
        }

        Ok(Parameters {
            file,
            demand,
            distances,
        })
    }

    /// Read and validate a JSON parameter file
    pub fn from_reader<R: Read>(reader: R) -> Result<Parameters, ConfigurationError> {
        let file: ParameterFile = serde_json::from_reader(reader)?;
        Parameters::new(file)
    }

    /// A new, independently validated store with `change` applied to a copy of the input.
    pub fn with<F: FnOnce(&mut ParameterFile)>(&self, change: F) -> Result<Parameters, ConfigurationError> {
        let mut file = self.file.clone();
        change(&mut file);
        Parameters::new(file)
    }

    fn check_sizes(file: &ParameterFile) -> Result<(), ConfigurationError> {
        let sets = [
            ("nodes", 2, file.nodes),
            ("vehicles", 1, file.vehicles),
            ("periods", 1, file.periods),
        ];
        for (set, min, actual) in sets {
            if actual < min {
                return Err(ConfigurationError::EmptySet { set, min, actual });
            }
        }

        if file.shelf_life == 0 {
            return Err(ConfigurationError::ShelfLifeZero);
        }

        Ok(())
    }

    fn check_scalars(file: &ParameterFile) -> Result<(), ConfigurationError> {
        let scalars = [
            ("capacity", file.capacity),
            ("fuel_price", file.fuel_price),
            ("wage", file.wage),
            ("spoilage_cost", file.spoilage_cost),
            ("holding_cost", file.holding_cost),
            ("uncertainty", file.uncertainty),
            ("speed", file.speed),
        ];

        for (name, value) in scalars.into_iter().chain(file.physics.named()) {
            if !value.is_finite() {
                return Err(ConfigurationError::NotFinite(name, value));
            }
            if value < 0.0 {
                return Err(ConfigurationError::Negative(name, value));
            }
        }

        let alpha = file.service_level;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigurationError::ServiceLevelOutOfRange(alpha));
        }

        // These appear as divisors in the travel time and the fuel model
        let physics = &file.physics;
        let divisors = [
            ("speed", file.speed),
            ("kappa * psi", physics.kappa * physics.psi),
            ("epsilon * varpi", physics.epsilon * physics.varpi),
        ];
        for (name, value) in divisors {
            if value <= 0.0 {
                return Err(ConfigurationError::NotPositive(name, value));
            }
        }

        Ok(())
    }

    /// Turns a nested vector into a dense table, or describes the shape that was found.
    fn table(rows: &[Vec<f64>], shape: (usize, usize)) -> Result<Array2<f64>, Shape> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            // some row must differ from the expected width
            let (row, len) = rows
                .iter()
                .map(|r| r.len())
                .enumerate()
                .find(|(_, len)| *len != shape.1)
                .unwrap_or((0, cols));
            return Err(Shape::Ragged { row, len });
        }
        if (rows.len(), cols) != shape {
            return Err(Shape::Rectangular(rows.len(), cols));
        }

        let flat = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec(shape, flat).map_err(|_| Shape::Rectangular(rows.len(), cols))
    }

    /// The raw input this store was validated from
    pub fn file(&self) -> &ParameterFile {
        &self.file
    }

    /// The number of nodes V, including the depot
    pub fn nodes(&self) -> usize {
        self.file.nodes
    }

    /// The customers, 1..V
    pub fn customers(&self) -> std::ops::Range<NodeIndex> {
        1..self.file.nodes
    }

    /// The number of vehicles K
    pub fn vehicles(&self) -> usize {
        self.file.vehicles
    }

    /// The number of periods T
    pub fn periods(&self) -> usize {
        self.file.periods
    }

    pub fn capacity(&self) -> Quantity {
        self.file.capacity
    }

    pub fn fuel_price(&self) -> Cost {
        self.file.fuel_price
    }

    pub fn wage(&self) -> Cost {
        self.file.wage
    }

    pub fn shelf_life(&self) -> usize {
        self.file.shelf_life
    }

    pub fn spoilage_cost(&self) -> Cost {
        self.file.spoilage_cost
    }

    pub fn holding_cost(&self) -> Cost {
        self.file.holding_cost
    }

    pub fn service_level(&self) -> f64 {
        self.file.service_level
    }

    pub fn uncertainty(&self) -> f64 {
        self.file.uncertainty
    }

    pub fn speed(&self) -> f64 {
        self.file.speed
    }

    pub fn physics(&self) -> &PhysicalConstants {
        &self.file.physics
    }

    /// Mean demand of `customer` in `period`
    pub fn demand(&self, customer: NodeIndex, period: PeriodIndex) -> Quantity {
        self.demand[[customer, period]]
    }

    /// The full demand table, V x (T + 1)
    pub fn demand_table(&self) -> &Array2<Quantity> {
        &self.demand
    }

    /// The distance between two nodes
    pub fn distance(&self, from: NodeIndex, to: NodeIndex) -> Distance {
        self.distances[[from, to]]
    }

    /// The travel time between two nodes at the constant vehicle speed
    pub fn travel_time(&self, from: NodeIndex, to: NodeIndex) -> f64 {
        self.distance(from, to) / self.file.speed
    }
}
