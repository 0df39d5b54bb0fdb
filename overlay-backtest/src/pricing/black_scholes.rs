//! Closed-form lognormal greeks.
//!
//! d1    = (ln(S/K) + (r + σ²/2)·T) / (σ·√T)
//! delta = Φ(d1) for calls, Φ(d1) - 1 for puts
//! vega  = S·φ(d1)·√T  (per unit of volatility)
//!
//! Inputs outside the model's domain are rejected with
//! `PricingError::InvalidParameter`; nothing here returns NaN or Inf.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::data::OptionType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Invalid parameter {name} = {value}: must be finite and positive")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Delta and vega of a single contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub vega: f64,
}

/// Black-Scholes calculator for greeks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholes {
    /// Continuously compounded risk-free rate.
    pub rate: f64,
}

impl BlackScholes {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Delta and vega for a contract. All of spot, strike, time and vol must
    /// be strictly positive.
    pub fn greeks(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> Result<Greeks, PricingError> {
        validate(spot, strike, time, vol)?;
        if !self.rate.is_finite() {
            return Err(PricingError::InvalidParameter {
                name: "rate",
                value: self.rate,
            });
        }

        let d1 = self.d1(spot, strike, time, vol);
        let delta = match opt_type {
            OptionType::Call => norm_cdf(d1),
            OptionType::Put => norm_cdf(d1) - 1.0,
        };

        Ok(Greeks {
            delta,
            vega: vega_from_d1(spot, time, d1),
        })
    }

    /// Vega at r = 0, as used when preprocessing chain rows.
    ///
    /// Rows at or past expiry have a vega of exactly zero.
    pub fn vega_only(spot: f64, strike: f64, time: f64, vol: f64) -> Result<f64, PricingError> {
        if time <= 0.0 {
            return Ok(0.0);
        }
        Self::new(0.0)
            .greeks(spot, strike, time, vol, OptionType::Call)
            .map(|g| g.vega)
    }

    /// Calculate d1 parameter.
    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator = (spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }
}

fn validate(spot: f64, strike: f64, time: f64, vol: f64) -> Result<(), PricingError> {
    for (name, value) in [("spot", spot), ("strike", strike), ("time", time), ("vol", vol)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(PricingError::InvalidParameter { name, value });
        }
    }
    Ok(())
}

fn vega_from_d1(spot: f64, time: f64, d1: f64) -> f64 {
    spot * norm_pdf(d1) * time.sqrt()
}

/// Standard normal CDF.
fn norm_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn test_atm_reference_values() {
        // S = K = 100, T = 1, σ = 0.2, r = 0 gives d1 = 0.1.
        let bs = BlackScholes::default();
        let call = bs.greeks(100.0, 100.0, 1.0, 0.2, OptionType::Call).unwrap();
        let put = bs.greeks(100.0, 100.0, 1.0, 0.2, OptionType::Put).unwrap();

        assert!((call.delta - 0.539_827_8).abs() < TOL);
        assert!((put.delta + 0.460_172_2).abs() < TOL);
        assert!((call.vega - 39.695_254_7).abs() < 1e-4);
        assert_eq!(call.vega, put.vega);
    }

    #[test]
    fn test_delta_bounds_and_parity() {
        let bs = BlackScholes::new(0.03);
        for &(spot, strike, time, vol) in &[
            (100.0, 80.0, 0.1, 0.15),
            (100.0, 120.0, 2.0, 0.6),
            (50.0, 50.0, 0.01, 0.05),
            (4200.0, 3900.0, 0.25, 0.18),
        ] {
            let call = bs.greeks(spot, strike, time, vol, OptionType::Call).unwrap();
            let put = bs.greeks(spot, strike, time, vol, OptionType::Put).unwrap();

            assert!((0.0..=1.0).contains(&call.delta));
            assert!((-1.0..=0.0).contains(&put.delta));
            assert!((call.delta - put.delta - 1.0).abs() < 1e-12);
            assert!(call.vega >= 0.0);
        }
    }

    #[test]
    fn test_vega_only_matches_greeks() {
        let bs = BlackScholes::default();
        let full = bs.greeks(102.0, 95.0, 0.3, 0.22, OptionType::Put).unwrap();
        let vega = BlackScholes::vega_only(102.0, 95.0, 0.3, 0.22).unwrap();
        assert_eq!(full.vega, vega);
    }

    #[test]
    fn test_vega_only_expired_is_zero() {
        assert_eq!(BlackScholes::vega_only(100.0, 100.0, 0.0, 0.2).unwrap(), 0.0);
        assert_eq!(BlackScholes::vega_only(100.0, 100.0, -0.5, 0.2).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_parameters_fail() {
        let bs = BlackScholes::default();
        let cases = [
            (100.0, 100.0, 0.0, 0.2, "time"),
            (100.0, 0.0, 1.0, 0.2, "strike"),
            (100.0, 100.0, 1.0, 0.0, "vol"),
            (100.0, 100.0, 1.0, -0.1, "vol"),
            (0.0, 100.0, 1.0, 0.2, "spot"),
            (100.0, 100.0, f64::NAN, 0.2, "time"),
        ];
        for (spot, strike, time, vol, expected) in cases {
            match bs.greeks(spot, strike, time, vol, OptionType::Call) {
                Err(PricingError::InvalidParameter { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected InvalidParameter({}), got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_vega_only_rejects_bad_vol() {
        assert!(BlackScholes::vega_only(100.0, 100.0, 0.5, 0.0).is_err());
    }
}
