// src/contract.rs
//! Option contract terms consumed by the solver and the simulator.

use crate::error::{validation::*, PricerError, PricerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = PricerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(PricerError::UnknownOptionType {
                value: s.to_string(),
            }),
        }
    }
}

/// Observed option price together with the contract and market terms
/// needed to invert it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Underlying spot price
    pub spot: f64,
    /// Continuous dividend yield
    pub dividend_yield: f64,
    /// Observed option price
    pub price: f64,
    pub strike: f64,
    /// Time to expiry in years
    pub expiry: f64,
    /// Continuously compounded risk-free rate
    pub rate: f64,
    pub option_type: OptionType,
}

impl OptionQuote {
    /// Build a quote, rejecting inputs that cannot describe a contract.
    ///
    /// Arbitrage-inconsistent but well-formed prices are accepted here; the
    /// solver turns those into an undefined volatility instead.
    pub fn new(
        spot: f64,
        dividend_yield: f64,
        price: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        option_type: OptionType,
    ) -> PricerResult<Self> {
        let quote = Self {
            spot,
            dividend_yield,
            price,
            strike,
            expiry,
            rate,
            option_type,
        };
        quote.validate()?;
        Ok(quote)
    }

    pub fn validate(&self) -> PricerResult<()> {
        validate_positive("spot", self.spot)?;
        validate_positive("strike", self.strike)?;
        validate_positive("expiry", self.expiry)?;
        validate_finite("spot", self.spot)?;
        validate_finite("strike", self.strike)?;
        validate_finite("expiry", self.expiry)?;
        validate_non_negative("price", self.price)?;
        validate_finite("price", self.price)?;
        validate_finite("rate", self.rate)?;
        validate_finite("dividend_yield", self.dividend_yield)?;
        Ok(())
    }

    /// Strike over spot
    pub fn moneyness(&self) -> f64 {
        self.strike / self.spot
    }
}
