// src/error.rs
use thiserror::Error;

/// Errors raised at the boundary of the pricing core.
///
/// Numerical failures inside the solver, the surface builder and the
/// simulator do not surface here; they degrade to NaN sentinels or
/// fallback values. Only inputs that are clearly wrong (negative strikes,
/// mismatched grids, zero iterations) are rejected outright.
#[derive(Debug, Error)]
pub enum PricerError {
    /// Invalid parameter values
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Malformed volatility grid (shape, ordering or size)
    #[error("Invalid volatility grid: {reason}")]
    InvalidGrid { reason: String },

    /// Numerical computation could not produce any usable value
    #[error("Numerical instability in {method}: {reason}")]
    NumericalInstability { method: String, reason: String },

    /// Option type tag outside the call/put pair
    #[error("Unknown option type '{value}': expected 'call' or 'put'")]
    UnknownOptionType { value: String },

    /// Diagnostic output failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pricing operations
pub type PricerResult<T> = Result<T, PricerError>;

/// Validation utilities
pub mod validation {
    use super::{PricerError, PricerResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> PricerResult<()> {
        if value.is_nan() || value <= 0.0 {
            Err(PricerError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> PricerResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(PricerError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> PricerResult<()> {
        if !value.is_finite() {
            Err(PricerError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate Monte Carlo iteration count
    pub fn validate_iterations(iterations: usize) -> PricerResult<()> {
        if iterations == 0 {
            Err(PricerError::InvalidConfiguration {
                field: "iterations".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if iterations > 100_000_000 {
            Err(PricerError::InvalidConfiguration {
                field: "iterations".to_string(),
                reason: "exceeds maximum allowed (100 million)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate simulated path length in trading days
    pub fn validate_path_length(days: usize) -> PricerResult<()> {
        if days == 0 {
            Err(PricerError::InvalidConfiguration {
                field: "path_length".to_string(),
                reason: "must be at least one trading day".to_string(),
            })
        } else if days > 100_000 {
            Err(PricerError::InvalidConfiguration {
                field: "path_length".to_string(),
                reason: "exceeds maximum allowed (100,000 days)".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
