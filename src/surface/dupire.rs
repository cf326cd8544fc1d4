// src/surface/dupire.rs
//! Dupire local volatility from a grid of implied volatilities
//!
//! # Mathematical Framework
//!
//! With total implied variance `w = σ²_impl T` and log-moneyness
//! `y = ln(K/F(T))`, `F(T) = S e^((r-q)T)`, Gatheral's form of Dupire's
//! formula reads:
//! ```text
//! σ²_loc = (∂w/∂T)|_y / [1 - (y/w) ∂w/∂y + ¼(-¼ - 1/w + y²/w²)(∂w/∂y)² + ½ ∂²w/∂y²]
//! ```
//!
//! The grid is sampled at fixed strikes, so the maturity derivative is first
//! taken at fixed `K` and moved to fixed `y` with
//! ```text
//! (∂w/∂T)|_y = (∂w/∂T)|_K + (r - q) K ∂w/∂K
//! ```
//!
//! All derivatives are finite differences on the grid: centered in the
//! interior, one-sided on the edges.
//!
//! # Repair of ill-posed cells
//!
//! - Negative local variance falls back to the cell's implied variance.
//!   This keeps the surface usable but is an approximation, not a
//!   treatment of the underlying arbitrage.
//! - Non-finite cells (NaN inputs, vanishing denominators) take the value of
//!   the nearest valid cell in the (strike, maturity-days) plane.

use crate::error::{validation::*, PricerError, PricerResult};
use crate::math_utils::gradient_along;
use crate::surface::grid::VolSurfaceGrid;
use crate::surface::interp::{GridInterpolator, NearestNeighbor};
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Settings for local volatility construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Divisor turning grid maturities (days) into years
    pub days_in_year: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig {
            days_in_year: 365.0,
        }
    }
}

impl SurfaceConfig {
    pub fn validate(&self) -> PricerResult<()> {
        validate_positive("days_in_year", self.days_in_year)?;
        validate_finite("days_in_year", self.days_in_year)
    }
}

/// Counts of cells that needed repair during construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildDiagnostics {
    /// Negative variance replaced by implied variance
    pub fallback_cells: usize,
    /// Non-finite cells filled from the nearest valid neighbour
    pub filled_cells: usize,
}

/// Continuous local volatility over (strike, time in years).
///
/// Immutable once built; share it behind an `Arc` across simulations and
/// rebuild from fresh market data rather than updating in place.
#[derive(Debug, Clone)]
pub struct LocalVolSurface {
    interpolator: GridInterpolator,
    diagnostics: BuildDiagnostics,
}

impl LocalVolSurface {
    /// Run Dupire's formula over `grid` and repair ill-posed cells.
    ///
    /// # Errors
    ///
    /// Invalid market inputs, or a grid on which no single cell yields a
    /// usable local volatility.
    pub fn build(
        grid: &VolSurfaceGrid,
        spot: f64,
        rate: f64,
        dividend_yield: f64,
        cfg: &SurfaceConfig,
    ) -> PricerResult<Self> {
        validate_positive("spot", spot)?;
        validate_finite("spot", spot)?;
        validate_finite("rate", rate)?;
        validate_finite("dividend_yield", dividend_yield)?;
        cfg.validate()?;

        let carry = rate - dividend_yield;
        let strikes = grid.strikes();
        let implied = grid.implied_vols();
        let times = grid.maturities().mapv(|days| days / cfg.days_in_year);

        let log_moneyness = Zip::from(strikes)
            .and(&times)
            .map_collect(|&k, &t| (k / (spot * (t * carry).exp())).ln());
        let total_var = Zip::from(implied)
            .and(&times)
            .map_collect(|&iv, &t| iv * iv * t);

        let dw_dy = gradient_along(&total_var, &log_moneyness, Axis(0));
        let d2w_dy2 = gradient_along(&dw_dy, &log_moneyness, Axis(0));
        let dw_dk = gradient_along(&total_var, strikes, Axis(0));
        let dw_dt_fixed_k = gradient_along(&total_var, &times, Axis(1));

        let mut fallback_cells = 0;
        let mut local_vol = Array2::<f64>::zeros(grid.shape());
        Zip::indexed(&mut local_vol).for_each(|idx, lv| {
            let w = total_var[idx];
            let y = log_moneyness[idx];
            let dy = dw_dy[idx];

            let dw_dt = dw_dt_fixed_k[idx] + carry * strikes[idx] * dw_dk[idx];
            let denom = 1.0 - (y / w) * dy
                + 0.25 * (-0.25 - 1.0 / w + y * y / (w * w)) * dy * dy
                + 0.5 * d2w_dy2[idx];

            let mut variance = dw_dt / denom;
            if variance < 0.0 {
                variance = implied[idx] * implied[idx];
                fallback_cells += 1;
            }

            let vol = variance.sqrt();
            *lv = if vol.is_finite() { vol } else { f64::NAN };
        });

        let filled_cells = fill_holes(&mut local_vol, grid)?;
        let diagnostics = BuildDiagnostics {
            fallback_cells,
            filled_cells,
        };

        if filled_cells > 0 {
            warn!(
                filled_cells,
                total = local_vol.len(),
                "local volatility holes filled from nearest neighbours"
            );
        }
        debug!(
            shape = ?grid.shape(),
            fallback_cells,
            filled_cells,
            "local volatility surface built"
        );

        let time_axis: Array1<f64> = grid.maturity_axis().mapv(|days| days / cfg.days_in_year);
        Ok(Self {
            interpolator: GridInterpolator::new(grid.strike_axis(), time_axis, local_vol),
            diagnostics,
        })
    }

    /// Local volatility at `(strike, time)`; time in years.
    ///
    /// Points outside the grid are clamped to its edge.
    pub fn local_vol(&self, strike: f64, time: f64) -> f64 {
        self.interpolator.value(strike, time)
    }

    /// Local volatility per grid cell, strikes down the rows
    pub fn raw(&self) -> &Array2<f64> {
        self.interpolator.values()
    }

    pub fn strikes(&self) -> &Array1<f64> {
        self.interpolator.x_axis()
    }

    /// Grid maturities in years
    pub fn times(&self) -> &Array1<f64> {
        self.interpolator.y_axis()
    }

    pub fn diagnostics(&self) -> BuildDiagnostics {
        self.diagnostics
    }
}

/// Replace every NaN cell with its nearest valid neighbour. Returns the count.
fn fill_holes(local_vol: &mut Array2<f64>, grid: &VolSurfaceGrid) -> PricerResult<usize> {
    let holes: Vec<(usize, usize)> = local_vol
        .indexed_iter()
        .filter(|(_, v)| v.is_nan())
        .map(|(idx, _)| idx)
        .collect();
    if holes.is_empty() {
        return Ok(0);
    }

    let strikes = grid.strikes();
    let maturities = grid.maturities();
    let (points, values): (Vec<[f64; 2]>, Vec<f64>) = local_vol
        .indexed_iter()
        .filter(|(_, v)| !v.is_nan())
        .map(|(idx, &v)| ([strikes[idx], maturities[idx]], v))
        .unzip();

    let nn = NearestNeighbor::fit(points, values).ok_or_else(|| {
        warn!("every local volatility cell is degenerate");
        PricerError::NumericalInstability {
            method: "Dupire local volatility".to_string(),
            reason: "no grid cell produced a finite local volatility".to_string(),
        }
    })?;

    for &idx in &holes {
        local_vol[idx] = nn.predict([strikes[idx], maturities[idx]]);
    }
    Ok(holes.len())
}
