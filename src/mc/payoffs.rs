//! Option Payoff Functions
//!
//! # Mathematical Definitions
//!
//! ## Average-rate (Asian) Options
//! - **Call**: max(A - K, 0)
//! - **Put**: max(K - A, 0)
//!
//! where `A` is the arithmetic mean of the daily fixings `S_1 … S_n`. The
//! seed price `S_0` is known at inception and is not a fixing.
//!
//! ## European Options
//! - **Call**: max(S_T - K, 0)
//! - **Put**: max(K - S_T, 0)
//!
//! # Implementation Notes
//!
//! All payoffs operate on the full price path `[S_0, S_1, …, S_n]`.

use crate::contract::OptionType;
use serde::{Deserialize, Serialize};

/// Enumeration of supported option payoff types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Payoff {
    /// Asian call option: max(Avg(S_1..S_n) - K, 0)
    AsianCall { k: f64 },

    /// Asian put option: max(K - Avg(S_1..S_n), 0)
    AsianPut { k: f64 },

    /// European call option: max(S_T - K, 0)
    EuropeanCall { k: f64 },

    /// European put option: max(K - S_T, 0)
    EuropeanPut { k: f64 },
}

impl Payoff {
    /// Average-rate payoff for the given option type
    pub fn asian(option_type: OptionType, k: f64) -> Self {
        match option_type {
            OptionType::Call => Payoff::AsianCall { k },
            OptionType::Put => Payoff::AsianPut { k },
        }
    }

    pub fn european(option_type: OptionType, k: f64) -> Self {
        match option_type {
            OptionType::Call => Payoff::EuropeanCall { k },
            OptionType::Put => Payoff::EuropeanPut { k },
        }
    }

    pub fn strike(&self) -> f64 {
        match *self {
            Payoff::AsianCall { k }
            | Payoff::AsianPut { k }
            | Payoff::EuropeanCall { k }
            | Payoff::EuropeanPut { k } => k,
        }
    }

    pub fn option_type(&self) -> OptionType {
        match self {
            Payoff::AsianCall { .. } | Payoff::EuropeanCall { .. } => OptionType::Call,
            Payoff::AsianPut { .. } | Payoff::EuropeanPut { .. } => OptionType::Put,
        }
    }

    /// Calculate payoff value from a simulated asset price path
    ///
    /// # Parameters
    /// - `path`: Complete asset price path [S_0, S_1, ..., S_T]
    ///
    /// # Returns
    /// Non-negative payoff value; zero for an empty path
    pub fn calculate(&self, path: &[f64]) -> f64 {
        let Some(&terminal) = path.last() else {
            return 0.0;
        };
        match *self {
            Payoff::AsianCall { k } => (fixing_average(path) - k).max(0.0),
            Payoff::AsianPut { k } => (k - fixing_average(path)).max(0.0),
            Payoff::EuropeanCall { k } => (terminal - k).max(0.0),
            Payoff::EuropeanPut { k } => (k - terminal).max(0.0),
        }
    }

    /// Whether a terminal price finishes in the money
    pub fn in_the_money(&self, terminal: f64) -> bool {
        match self.option_type() {
            OptionType::Call => terminal > self.strike(),
            OptionType::Put => terminal < self.strike(),
        }
    }
}

/// Arithmetic mean of `path[1..]`; a path holding only its seed averages to the seed.
pub fn fixing_average(path: &[f64]) -> f64 {
    match path.split_first() {
        Some((&seed, [])) => seed,
        Some((_, fixings)) => fixings.iter().sum::<f64>() / fixings.len() as f64,
        None => f64::NAN,
    }
}
