//! Distribution math for integer-reported settlement values.
//!
//! Settlement uses the station's reported integer, not the raw forecast. The
//! reported value is modeled as a normal draw around the forecast mean whose
//! spread combines forecast error and station reporting error in quadrature,
//! then discretized with half-integer boundaries.

use crate::data::ticker::Settlement;

/// Smallest forecast σ the model accepts.
pub const SIGMA_FLOOR: f64 = 0.5;

/// σ_eff = sqrt(σ_forecast² + σ_reporting²), with σ_forecast floored.
pub fn effective_sigma(forecast_sigma: f64, reporting_sigma: f64) -> f64 {
    let forecast_sigma = if forecast_sigma.is_finite() {
        forecast_sigma.max(SIGMA_FLOOR)
    } else {
        SIGMA_FLOOR
    };
    let reporting_sigma = if reporting_sigma.is_finite() {
        reporting_sigma.max(0.0)
    } else {
        0.0
    };
    (forecast_sigma.powi(2) + reporting_sigma.powi(2)).sqrt()
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function approximation (Abramowitz & Stegun 7.1.26).
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// P(reported = k).
pub fn discrete_mass(k: i32, mean: f64, sigma_eff: f64) -> f64 {
    let k = f64::from(k);
    let upper = normal_cdf((k + 0.5 - mean) / sigma_eff);
    let lower = normal_cdf((k - 0.5 - mean) / sigma_eff);
    (upper - lower).clamp(0.0, 1.0)
}

/// P(reported ≥ threshold).
pub fn prob_at_or_above(threshold: i32, mean: f64, sigma_eff: f64) -> f64 {
    let z = (f64::from(threshold) - 0.5 - mean) / sigma_eff;
    (1.0 - normal_cdf(z)).clamp(0.0, 1.0)
}

/// P(reported ≤ threshold).
pub fn prob_at_or_below(threshold: i32, mean: f64, sigma_eff: f64) -> f64 {
    let z = (f64::from(threshold) + 0.5 - mean) / sigma_eff;
    normal_cdf(z).clamp(0.0, 1.0)
}

/// Probability that a settlement condition resolves YES.
pub fn settlement_probability(settlement: Settlement, mean: f64, sigma_eff: f64) -> f64 {
    match settlement {
        Settlement::Above(t) => prob_at_or_above(t, mean, sigma_eff),
        Settlement::Below(t) => prob_at_or_below(t, mean, sigma_eff),
        Settlement::Bucket(k) => discrete_mass(k, mean, sigma_eff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((normal_cdf(1.0) - 0.8413).abs() < 1e-3);
        assert!((normal_cdf(-1.0) - 0.1587).abs() < 1e-3);
        assert!((normal_cdf(-1.25) - 0.1056).abs() < 1e-3);
    }

    #[test]
    fn test_effective_sigma_quadrature() {
        assert!((effective_sigma(3.0, 4.0) - 5.0).abs() < 1e-12);
        // forecast σ floored at 0.5
        assert!((effective_sigma(0.0, 0.0) - SIGMA_FLOOR).abs() < 1e-12);
        assert!((effective_sigma(-2.0, 1.2) - (0.25f64 + 1.44).sqrt()).abs() < 1e-12);
        assert!(effective_sigma(f64::NAN, 1.5).is_finite());
    }

    #[test]
    fn test_threshold_worked_example() {
        // above 40 with μ=42, σ_eff=2: 1 - Φ(-1.25)
        let p = prob_at_or_above(40, 42.0, 2.0);
        assert!((p - 0.894).abs() < 1e-3, "got {}", p);
    }

    #[test]
    fn test_above_and_below_are_complementary() {
        let above = prob_at_or_above(41, 39.3, 2.2);
        let below = prob_at_or_below(40, 39.3, 2.2);
        assert!((above + below - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mass_sums_to_one() {
        let total: f64 = (-50..=150).map(|k| discrete_mass(k, 47.3, 2.4)).sum();
        assert!((total - 1.0).abs() < 1e-6, "got {}", total);
    }

    #[test]
    fn test_mass_symmetric_around_integer_mean() {
        for offset in 1..6 {
            let left = discrete_mass(50 - offset, 50.0, 1.9);
            let right = discrete_mass(50 + offset, 50.0, 1.9);
            assert!((left - right).abs() < 1e-12);
        }
        assert!(discrete_mass(50, 50.0, 1.9) > discrete_mass(51, 50.0, 1.9));
    }

    #[test]
    fn test_settlement_probability_dispatch() {
        assert_eq!(
            settlement_probability(Settlement::Bucket(30), 31.0, 2.0),
            discrete_mass(30, 31.0, 2.0)
        );
        assert_eq!(
            settlement_probability(Settlement::Below(27), 31.0, 2.0),
            prob_at_or_below(27, 31.0, 2.0)
        );
    }
}
