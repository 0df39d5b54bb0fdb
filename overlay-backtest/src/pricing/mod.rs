//! Option greeks used for selection and sizing.

pub mod black_scholes;

pub use black_scholes::{BlackScholes, Greeks, PricingError};
