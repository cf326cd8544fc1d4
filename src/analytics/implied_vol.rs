// src/analytics/implied_vol.rs
//! Implied volatility from an observed option price
//!
//! # Algorithm
//!
//! 1. **Pre-filter**: quotes that violate no-arbitrage bounds, sit too close
//!    to expiry or too far from the money are rejected up front.
//! 2. **Newton-Raphson** from the caller's guess:
//!    ```text
//!    σ_{n+1} = σ_n + (P_mkt - P(σ_n)) / ν(σ_n)
//!    ```
//!    abandoned as soon as vega flattens below `min_vega` or an iterate
//!    leaves `σ > 0`.
//! 3. **Bisection** on `[bisection_lower, bisection_upper]` when Newton gives
//!    no candidate. Price is monotonic in σ, so the bracket always narrows
//!    toward the root.
//! 4. **Post-filter**: fits above `max_vol` are discarded.
//!
//! Every failure degrades to an undefined (NaN) volatility. Nothing here
//! returns an error or panics on numeric input.

use crate::analytics::bs_analytic::BlackScholes;
use crate::contract::{OptionQuote, OptionType};
use crate::error::{validation::*, PricerError, PricerResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

bitflags! {
    /// Reasons a quote was excluded before any root finding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RejectReasons: u32 {
        const NONE              = 0;
        /// Price below `max(0, ±(S e^(-dT) - K e^(-rT)))`
        const BELOW_INTRINSIC   = 1 << 0;
        /// Price above `S e^(-dT)`
        const ABOVE_UPPER_BOUND = 1 << 1;
        /// Expiry shorter than the minimum
        const NEAR_EXPIRY       = 1 << 2;
        /// `K/S` outside the accepted band
        const EXTREME_MONEYNESS = 1 << 3;
        /// Non-finite or non-positive contract terms
        const MALFORMED_INPUT   = 1 << 4;
    }
}

/// Root finder that produced a volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    NewtonRaphson,
    Bisection,
}

/// Outcome of one implied volatility solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IvOutcome {
    Converged {
        sigma: f64,
        method: SolveMethod,
        iterations: usize,
    },
    /// Quote failed the pre-filter
    Rejected(RejectReasons),
    /// Bisection spent its iteration budget without meeting tolerance
    Exhausted { iterations: usize },
    /// Root found but above the plausibility cap
    AboveMaxVol { sigma: f64 },
}

impl IvOutcome {
    /// The volatility, or NaN when undefined
    pub fn value(&self) -> f64 {
        match self {
            IvOutcome::Converged { sigma, .. } => *sigma,
            _ => f64::NAN,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, IvOutcome::Converged { .. })
    }
}

/// Tolerances and filters for the solver.
///
/// The defaults reproduce the reference behaviour; they are empirical and
/// may be tuned per data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Starting point for Newton-Raphson
    pub initial_guess: f64,
    /// Stop when successive Newton iterates differ by less than this
    pub newton_tolerance: f64,
    /// Vega magnitude below which Newton is abandoned
    pub min_vega: f64,
    /// Newton iterations before falling through to bisection (0 = bisection only)
    pub max_newton_iterations: usize,
    pub bisection_lower: f64,
    pub bisection_upper: f64,
    /// Stop when `|P(mid) - P_mkt|` drops below this
    pub bisection_tolerance: f64,
    pub max_bisection_iterations: usize,
    /// Fits above this are treated as data errors
    pub max_vol: f64,
    pub min_expiry_days: f64,
    /// Calendar convention used to express `min_expiry_days` in years
    pub days_in_year: f64,
    pub min_moneyness: f64,
    pub max_moneyness: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            initial_guess: 0.1,
            newton_tolerance: 1e-5,
            min_vega: 1e-8,
            max_newton_iterations: 100,
            bisection_lower: 0.001,
            bisection_upper: 5.0,
            bisection_tolerance: 1e-5,
            max_bisection_iterations: 250,
            max_vol: 5.0,
            min_expiry_days: 7.0,
            days_in_year: 365.0,
            min_moneyness: 0.3,
            max_moneyness: 1.7,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> PricerResult<()> {
        validate_positive("initial_guess", self.initial_guess)?;
        validate_positive("newton_tolerance", self.newton_tolerance)?;
        validate_non_negative("min_vega", self.min_vega)?;
        validate_positive("bisection_lower", self.bisection_lower)?;
        validate_positive("bisection_tolerance", self.bisection_tolerance)?;
        validate_positive("max_vol", self.max_vol)?;
        validate_non_negative("min_expiry_days", self.min_expiry_days)?;
        validate_positive("days_in_year", self.days_in_year)?;
        validate_positive("min_moneyness", self.min_moneyness)?;

        if self.bisection_upper <= self.bisection_lower {
            return Err(PricerError::InvalidConfiguration {
                field: "bisection_upper".to_string(),
                reason: format!(
                    "must exceed bisection_lower ({}), got {}",
                    self.bisection_lower, self.bisection_upper
                ),
            });
        }
        if self.max_moneyness <= self.min_moneyness {
            return Err(PricerError::InvalidConfiguration {
                field: "max_moneyness".to_string(),
                reason: format!(
                    "must exceed min_moneyness ({}), got {}",
                    self.min_moneyness, self.max_moneyness
                ),
            });
        }
        if self.max_bisection_iterations == 0 {
            return Err(PricerError::InvalidConfiguration {
                field: "max_bisection_iterations".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Minimum expiry in years
    pub fn min_expiry(&self) -> f64 {
        self.min_expiry_days / self.days_in_year
    }
}

/// Run the pre-filter alone.
pub fn screen_quote(quote: &OptionQuote, cfg: &SolverConfig) -> RejectReasons {
    if quote.validate().is_err() {
        return RejectReasons::MALFORMED_INPUT;
    }

    let mut reasons = RejectReasons::NONE;
    let bs = BlackScholes::from_quote(quote, cfg.initial_guess);
    let forward_leg = bs.discounted_spot();
    let strike_leg = bs.discounted_strike();

    let lower_bound = match quote.option_type {
        OptionType::Call => (forward_leg - strike_leg).max(0.0),
        OptionType::Put => (strike_leg - forward_leg).max(0.0),
    };
    if quote.price < lower_bound {
        reasons |= RejectReasons::BELOW_INTRINSIC;
    }
    if quote.price > forward_leg {
        reasons |= RejectReasons::ABOVE_UPPER_BOUND;
    }
    if quote.expiry < cfg.min_expiry() {
        reasons |= RejectReasons::NEAR_EXPIRY;
    }
    let moneyness = quote.moneyness();
    if moneyness < cfg.min_moneyness || moneyness > cfg.max_moneyness {
        reasons |= RejectReasons::EXTREME_MONEYNESS;
    }
    reasons
}

/// Solve for implied volatility, reporting how the result was reached.
pub fn solve(quote: &OptionQuote, initial_guess: f64, cfg: &SolverConfig) -> IvOutcome {
    let reasons = screen_quote(quote, cfg);
    if !reasons.is_empty() {
        trace!(strike = quote.strike, expiry = quote.expiry, ?reasons, "quote rejected");
        return IvOutcome::Rejected(reasons);
    }

    let bs = BlackScholes::from_quote(quote, initial_guess);

    let (sigma, method, iterations) =
        match newton_raphson(&bs, quote.price, quote.option_type, initial_guess, cfg) {
            Some((sigma, n)) => (sigma, SolveMethod::NewtonRaphson, n),
            None => {
                debug!(
                    strike = quote.strike,
                    expiry = quote.expiry,
                    "Newton-Raphson gave no candidate, bisecting"
                );
                match bisection(&bs, quote.price, quote.option_type, cfg) {
                    Some((sigma, n)) => (sigma, SolveMethod::Bisection, n),
                    None => {
                        warn!(
                            strike = quote.strike,
                            expiry = quote.expiry,
                            price = quote.price,
                            "bisection exhausted {} iterations",
                            cfg.max_bisection_iterations
                        );
                        return IvOutcome::Exhausted {
                            iterations: cfg.max_bisection_iterations,
                        };
                    }
                }
            }
        };

    if sigma > cfg.max_vol {
        debug!(strike = quote.strike, sigma, "implied volatility above cap");
        return IvOutcome::AboveMaxVol { sigma };
    }

    IvOutcome::Converged {
        sigma,
        method,
        iterations,
    }
}

/// Implied volatility, or NaN when the quote yields none.
pub fn implied_volatility(quote: &OptionQuote, initial_guess: f64, cfg: &SolverConfig) -> f64 {
    solve(quote, initial_guess, cfg).value()
}

fn newton_raphson(
    bs: &BlackScholes,
    market_price: f64,
    option_type: OptionType,
    initial_guess: f64,
    cfg: &SolverConfig,
) -> Option<(f64, usize)> {
    let mut sigma = initial_guess;
    if !(sigma.is_finite() && sigma > 0.0) {
        return None;
    }

    for n in 1..=cfg.max_newton_iterations {
        let vega = bs.vega(Some(sigma));
        if !vega.is_finite() || vega.abs() < cfg.min_vega {
            trace!(sigma, vega, "flat vega");
            return None;
        }

        let model_price = bs.price(option_type, Some(sigma));
        let next = sigma + (market_price - model_price) / vega;
        if !next.is_finite() || next <= 0.0 {
            trace!(sigma, next, "non-physical Newton iterate");
            return None;
        }

        if (next - sigma).abs() < cfg.newton_tolerance {
            return Some((next, n));
        }
        sigma = next;
    }
    None
}

fn bisection(
    bs: &BlackScholes,
    market_price: f64,
    option_type: OptionType,
    cfg: &SolverConfig,
) -> Option<(f64, usize)> {
    let mut lo = cfg.bisection_lower;
    let mut hi = cfg.bisection_upper;

    for n in 1..=cfg.max_bisection_iterations {
        let mid = 0.5 * (lo + hi);
        let diff = bs.price(option_type, Some(mid)) - market_price;
        if diff.abs() < cfg.bisection_tolerance {
            return Some((mid, n));
        }
        if diff < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    None
}
