// src/chain.rs
//! Option chain rows as delivered by the quote provider, and the
//! per-contract implied volatility column derived from them.

use crate::analytics::implied_vol::{implied_volatility, SolverConfig};
use crate::contract::{OptionQuote, OptionType};
use crate::error::{validation::*, PricerError, PricerResult};
use crate::surface::IvPoint;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shares per standard listed contract
pub const STANDARD_CONTRACT_SIZE: u32 = 100;

/// Close prices at or below this are treated as worthless quotes
pub const MIN_CLOSE_PRICE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    American,
    European,
}

impl fmt::Display for ExerciseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseStyle::American => f.write_str("american"),
            ExerciseStyle::European => f.write_str("european"),
        }
    }
}

impl FromStr for ExerciseStyle {
    type Err = PricerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "american" => Ok(ExerciseStyle::American),
            "european" => Ok(ExerciseStyle::European),
            _ => Err(PricerError::InvalidConfiguration {
                field: "style".to_string(),
                reason: format!("unknown exercise style '{}'", s),
            }),
        }
    }
}

/// One listed option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRow {
    /// Contract symbol, e.g. `AAPL251231C00200000`
    pub symbol: String,
    pub underlying: String,
    pub strike: f64,
    pub close_price: f64,
    pub expiration_date: NaiveDate,
    pub option_type: OptionType,
    pub style: ExerciseStyle,
    pub open_interest: u64,
    /// Shares per contract
    pub size: u32,
}

/// Underlying state shared by every contract on one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub spot: f64,
    /// Continuous dividend yield
    pub dividend_yield: f64,
    /// Risk-free rate
    pub rate: f64,
}

impl MarketSnapshot {
    pub fn new(spot: f64, dividend_yield: f64, rate: f64) -> PricerResult<Self> {
        let market = Self {
            spot,
            dividend_yield,
            rate,
        };
        market.validate()?;
        Ok(market)
    }

    /// Yield from a trailing annual cash dividend per share.
    pub fn from_annual_dividend(spot: f64, annual_dividend: f64, rate: f64) -> PricerResult<Self> {
        validate_positive("spot", spot)?;
        validate_non_negative("annual_dividend", annual_dividend)?;
        Self::new(spot, annual_dividend / spot, rate)
    }

    pub fn validate(&self) -> PricerResult<()> {
        validate_positive("spot", self.spot)?;
        validate_finite("spot", self.spot)?;
        validate_finite("dividend_yield", self.dividend_yield)?;
        validate_finite("rate", self.rate)?;
        Ok(())
    }
}

/// Standard-size, non-worthless, out-of-the-money contract.
pub fn is_eligible(row: &ContractRow, spot: f64) -> bool {
    let out_of_the_money = match row.option_type {
        OptionType::Call => row.strike > spot,
        OptionType::Put => row.strike < spot,
    };
    row.size == STANDARD_CONTRACT_SIZE && row.close_price > MIN_CLOSE_PRICE && out_of_the_money
}

/// A contract row with its solved implied volatility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedContract {
    pub row: ContractRow,
    /// Calendar days from the valuation date to expiry
    pub days_to_expiry: i64,
    /// `days_to_expiry` in years
    pub period_year: f64,
    pub implied_vol: f64,
}

impl PricedContract {
    pub fn iv_point(&self) -> IvPoint {
        IvPoint {
            strike: self.row.strike,
            days_to_expiry: self.days_to_expiry as f64,
            implied_vol: self.implied_vol,
        }
    }
}

/// Solve the implied volatility of every row and keep the rows where it is defined.
///
/// Row order is preserved. Rows that cannot be turned into a quote (expired,
/// non-positive strike, ...) are dropped like any other undefined volatility.
///
/// # Errors
///
/// Only an invalid `market` or `cfg`.
pub fn annotate_implied_vols(
    rows: &[ContractRow],
    market: &MarketSnapshot,
    valuation_date: NaiveDate,
    cfg: &SolverConfig,
) -> PricerResult<Vec<PricedContract>> {
    market.validate()?;
    cfg.validate()?;

    let priced: Vec<PricedContract> = rows
        .par_iter()
        .filter_map(|row| {
            let days_to_expiry = (row.expiration_date - valuation_date).num_days();
            let period_year = days_to_expiry as f64 / cfg.days_in_year;

            let quote = OptionQuote::new(
                market.spot,
                market.dividend_yield,
                row.close_price,
                row.strike,
                period_year,
                market.rate,
                row.option_type,
            )
            .ok()?;

            let implied_vol = implied_volatility(&quote, cfg.initial_guess, cfg);
            if implied_vol.is_nan() {
                trace!(symbol = %row.symbol, "implied volatility undefined; row dropped");
                return None;
            }
            Some(PricedContract {
                row: row.clone(),
                days_to_expiry,
                period_year,
                implied_vol,
            })
        })
        .collect();

    debug!(
        rows = rows.len(),
        priced = priced.len(),
        "implied volatility column computed"
    );
    Ok(priced)
}

/// Median implied volatility; `None` for an empty chain.
pub fn median_implied_vol(priced: &[PricedContract]) -> Option<f64> {
    let mut vols: Vec<f64> = priced.iter().map(|c| c.implied_vol).collect();
    if vols.is_empty() {
        return None;
    }
    vols.sort_by(f64::total_cmp);
    let mid = vols.len() / 2;
    if vols.len() % 2 == 0 {
        Some(0.5 * (vols[mid - 1] + vols[mid]))
    } else {
        Some(vols[mid])
    }
}

/// Identifies one chain request: the requested symbols and the row limit.
///
/// Symbols are sorted and deduplicated, so request order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    symbols: Vec<String>,
    limit: usize,
}

impl ChainKey {
    pub fn new<I, S>(symbols: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        symbols.sort();
        symbols.dedup();
        Self { symbols, limit }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Caller-owned cache of loaded chains.
///
/// Entries live until the caller invalidates them; there is no expiry and
/// nothing is shared between cache instances.
#[derive(Debug)]
pub struct ChainCache<T> {
    entries: HashMap<ChainKey, Arc<T>>,
}

impl<T> Default for ChainCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ChainCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ChainKey) -> Option<Arc<T>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: ChainKey, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    /// Cached value for `key`, running `load` on a miss.
    ///
    /// A failed load leaves the cache untouched.
    pub fn get_or_try_load<F, E>(&mut self, key: &ChainKey, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce(&ChainKey) -> Result<T, E>,
    {
        if let Some(hit) = self.entries.get(key) {
            trace!(symbols = ?key.symbols, limit = key.limit, "chain cache hit");
            return Ok(Arc::clone(hit));
        }
        debug!(symbols = ?key.symbols, limit = key.limit, "chain cache miss");
        let value = load(key)?;
        Ok(self.insert(key.clone(), value))
    }

    /// Drop one entry; returns whether it was present.
    pub fn invalidate(&mut self, key: &ChainKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
