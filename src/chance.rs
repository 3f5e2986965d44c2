use log::trace;
use ndarray::Array2;
use statrs::function::erf::erf_inv;

use crate::problem::{NodeIndex, Parameters, PeriodIndex, Quantity};

/// The quantile of the standard normal distribution at probability `p`, for `0 < p < 1`.
pub fn standard_normal_quantile(p: f64) -> f64 {
    std::f64::consts::SQRT_2 * erf_inv(2.0 * p - 1.0)
}

/// Minimum cumulative delivered-minus-wasted quantity per customer and period.
///
/// `rhs[i][t] = sum_{s<=t} d[i][s] + z_alpha * C * sqrt(sum_{s<=t} d[i][s]^2)`
///
/// The squared means act as the variance proxy of the cumulative demand. This is a modelling
/// assumption, not an independent variance estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyStock {
    z_alpha: f64,
    /// V x (T + 1). Row 0 (depot) and column 0 are zero.
    rhs: Array2<Quantity>,
}

impl SafetyStock {
    pub fn new(parameters: &Parameters) -> SafetyStock {
        let z_alpha = standard_normal_quantile(parameters.service_level());
        let c = parameters.uncertainty();
        let mut rhs = Array2::zeros((parameters.nodes(), parameters.periods() + 1));

        for i in parameters.customers() {
            let mut mean = 0.0;
            let mut variance = 0.0;
            for t in 1..=parameters.periods() {
                let d = parameters.demand(i, t);
                mean += d;
                variance += d * d;
                rhs[[i, t]] = mean + z_alpha * c * variance.sqrt();
            }
        }

        trace!("z_alpha = {}, safety stock = {:?}", z_alpha, rhs);
        SafetyStock { z_alpha, rhs }
    }

    /// The standard normal quantile at the target service level
    pub fn z_alpha(&self) -> f64 {
        self.z_alpha
    }

    /// The right-hand side of the service-level constraint of `customer` in `period`
    pub fn rhs(&self, customer: NodeIndex, period: PeriodIndex) -> Quantity {
        self.rhs[[customer, period]]
    }

    /// (V, T + 1)
    pub fn dim(&self) -> (usize, usize) {
        self.rhs.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::tests::file;

    #[test]
    fn quantile_matches_known_values() {
        assert!(standard_normal_quantile(0.5).abs() < 1e-9);
        assert!((standard_normal_quantile(0.95) - 1.6448536269514722).abs() < 1e-9);
        assert!((standard_normal_quantile(0.975) - 1.959963984540054).abs() < 1e-9);
        assert!((standard_normal_quantile(0.05) + 1.6448536269514722).abs() < 1e-9);
    }

    #[test]
    fn zero_uncertainty_gives_cumulative_mean() {
        let mut f = file(2, 1, 1, 100.0);
        f.uncertainty = 0.0;
        let stock = SafetyStock::new(&Parameters::new(f).unwrap());
        assert_eq!(stock.rhs(1, 1), 100.0);
    }

    #[test]
    fn squared_means_are_the_variance_proxy() {
        let mut f = file(3, 1, 3, 0.0);
        f.demand[1] = vec![0.0, 3.0, 4.0, 12.0];
        f.uncertainty = 0.5;
        let params = Parameters::new(f).unwrap();
        let stock = SafetyStock::new(&params);
        let z = stock.z_alpha();

        assert!((stock.rhs(1, 1) - (3.0 + z * 0.5 * 3.0)).abs() < 1e-9);
        assert!((stock.rhs(1, 2) - (7.0 + z * 0.5 * 5.0)).abs() < 1e-9);
        assert!((stock.rhs(1, 3) - (19.0 + z * 0.5 * 13.0)).abs() < 1e-9);
        assert_eq!(stock.rhs(2, 3), 0.0);
        assert_eq!(stock.dim(), (3, 4));
    }

    #[test]
    fn higher_service_level_never_lowers_the_bound() {
        let params = Parameters::new(file(4, 1, 4, 25.0)).unwrap();
        let mut previous = SafetyStock::new(&params.with(|f| f.service_level = 0.01).unwrap());
        for alpha in [0.2, 0.5, 0.8, 0.9, 0.95, 0.99, 0.999] {
            let stock = SafetyStock::new(&params.with(|f| f.service_level = alpha).unwrap());
            for i in params.customers() {
                for t in 1..=params.periods() {
                    assert!(stock.rhs(i, t) >= previous.rhs(i, t));
                }
            }
            previous = stock;
        }
    }
}
