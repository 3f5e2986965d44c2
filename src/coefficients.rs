use log::trace;

use crate::problem::{Cost, Distance, Parameters, PhysicalConstants, Quantity};

/// Scalar sub-coefficients of the fuel-consumption model.
///
/// All vehicles are identical, so these are computed once per parameter store and
/// stay fixed over the whole horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelCoefficients {
    /// Fuel-to-energy conversion factor, `xi / (kappa * psi)`
    pub lambda: f64,
    /// Engine friction energy, `k_e * n_e * v_e`
    pub engine: f64,
    /// Drivetrain efficiency factor, `1 / (1000 * epsilon * varpi)`
    pub gamma: f64,
    /// Aerodynamic drag factor, `0.5 * c_d * a_e * rho`
    pub beta: f64,
    /// Road grade and rolling resistance, `g * sin(phi) + g * c_r * cos(phi)`
    pub grade: f64,
}

impl FuelCoefficients {
    pub fn new(physics: &PhysicalConstants) -> FuelCoefficients {
        let coefficients = FuelCoefficients {
            lambda: physics.xi / (physics.kappa * physics.psi),
            engine: physics.k_e * physics.n_e * physics.v_e,
            gamma: 1.0 / (1000.0 * physics.epsilon * physics.varpi),
            beta: 0.5 * physics.c_d * physics.a_e * physics.rho,
            grade: physics.g * physics.phi.sin() + physics.g * physics.c_r * physics.phi.cos(),
        };
        trace!("fuel coefficients: {:?}", coefficients);
        coefficients
    }

    pub fn from_parameters(parameters: &Parameters) -> FuelCoefficients {
        FuelCoefficients::new(parameters.physics())
    }

    /// Fuel (L) burnt on an arc of length `distance` independent of the load:
    /// engine friction, aerodynamic drag at `speed` and moving the curb weight `mu`.
    pub fn fuel_per_traversal(&self, distance: Distance, speed: f64, mu: Quantity) -> f64 {
        self.lambda
            * distance
            * (self.engine + self.gamma * self.beta * speed.powi(2) + self.gamma * self.grade * mu)
    }

    /// Additional fuel (L) burnt per kg of load carried over an arc of length `distance`
    pub fn fuel_per_kg(&self, distance: Distance) -> f64 {
        self.lambda * self.gamma * self.grade * distance
    }

    /// Objective coefficient of the route indicator `X[i][j][k][t]` in the fuel term
    pub fn traversal_cost(&self, parameters: &Parameters, from: usize, to: usize) -> Cost {
        parameters.fuel_price()
            * self.fuel_per_traversal(
                parameters.distance(from, to),
                parameters.speed(),
                parameters.physics().mu,
            )
    }

    /// Objective coefficient of the load `F[i][j][k][t]` in the fuel term
    pub fn load_cost(&self, parameters: &Parameters, from: usize, to: usize) -> Cost {
        parameters.fuel_price() * self.fuel_per_kg(parameters.distance(from, to))
    }
}
