// src/surface/grid.rs
//! Rectangular implied volatility grid indexed by strike (rows) and
//! maturity in days (columns).

use crate::error::{PricerError, PricerResult};
use crate::surface::interp::NearestNeighbor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// One solved contract in (strike, days, vol) space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvPoint {
    pub strike: f64,
    pub days_to_expiry: f64,
    pub implied_vol: f64,
}

/// Three equal-shaped arrays on a structured grid.
///
/// Row `i` holds strike level `i`, column `j` holds maturity level `j`.
/// Strikes increase strictly down the rows and maturities strictly across
/// the columns. Implied vols may contain NaN holes.
#[derive(Debug, Clone, PartialEq)]
pub struct VolSurfaceGrid {
    maturities: Array2<f64>,
    strikes: Array2<f64>,
    implied_vols: Array2<f64>,
}

impl VolSurfaceGrid {
    /// Wrap three pre-shaped arrays after checking the grid invariants.
    pub fn new(
        maturities: Array2<f64>,
        strikes: Array2<f64>,
        implied_vols: Array2<f64>,
    ) -> PricerResult<Self> {
        let shape = implied_vols.dim();
        if maturities.dim() != shape || strikes.dim() != shape {
            return Err(PricerError::InvalidGrid {
                reason: format!(
                    "shape mismatch: maturities {:?}, strikes {:?}, implied vols {:?}",
                    maturities.dim(),
                    strikes.dim(),
                    shape
                ),
            });
        }
        let (n_strikes, n_maturities) = shape;
        if n_strikes < 2 || n_maturities < 2 {
            return Err(PricerError::InvalidGrid {
                reason: format!(
                    "need at least 2 strikes and 2 maturities, got {}x{}",
                    n_strikes, n_maturities
                ),
            });
        }

        for (name, values) in [("strike", &strikes), ("maturity", &maturities)] {
            if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(PricerError::InvalidGrid {
                    reason: format!("every {} must be finite and positive", name),
                });
            }
        }

        for i in 0..n_strikes {
            for j in 0..n_maturities {
                if strikes[[i, j]] != strikes[[i, 0]] {
                    return Err(PricerError::InvalidGrid {
                        reason: format!("strike row {} is not constant across maturities", i),
                    });
                }
                if maturities[[i, j]] != maturities[[0, j]] {
                    return Err(PricerError::InvalidGrid {
                        reason: format!("maturity column {} is not constant across strikes", j),
                    });
                }
            }
        }
        if (1..n_strikes).any(|i| strikes[[i, 0]] <= strikes[[i - 1, 0]]) {
            return Err(PricerError::InvalidGrid {
                reason: "strikes must increase strictly down the rows".to_string(),
            });
        }
        if (1..n_maturities).any(|j| maturities[[0, j]] <= maturities[[0, j - 1]]) {
            return Err(PricerError::InvalidGrid {
                reason: "maturities must increase strictly across the columns".to_string(),
            });
        }

        Ok(Self {
            maturities,
            strikes,
            implied_vols,
        })
    }

    /// Build from the two axes and an `(strikes × maturities)` vol matrix.
    pub fn from_axes(
        strikes: &[f64],
        maturity_days: &[f64],
        implied_vols: Array2<f64>,
    ) -> PricerResult<Self> {
        let shape = (strikes.len(), maturity_days.len());
        let strike_grid = Array2::from_shape_fn(shape, |(i, _)| strikes[i]);
        let maturity_grid = Array2::from_shape_fn(shape, |(_, j)| maturity_days[j]);
        Self::new(maturity_grid, strike_grid, implied_vols)
    }

    /// Resample scattered solved contracts onto a `resolution × resolution`
    /// regular grid spanning their strike and maturity ranges.
    ///
    /// Each node takes the vol of the nearest contract, distances measured
    /// after scaling both axes to unit range. Points with undefined vols are
    /// skipped.
    pub fn from_scattered(points: &[IvPoint], resolution: usize) -> PricerResult<Self> {
        if resolution < 2 {
            return Err(PricerError::InvalidConfiguration {
                field: "resolution".to_string(),
                reason: format!("must be at least 2, got {}", resolution),
            });
        }

        let valid: Vec<&IvPoint> = points
            .iter()
            .filter(|p| {
                p.implied_vol.is_finite() && p.strike.is_finite() && p.days_to_expiry.is_finite()
            })
            .collect();
        if valid.len() < 4 {
            return Err(PricerError::InvalidGrid {
                reason: format!("need at least 4 solved contracts, got {}", valid.len()),
            });
        }

        let (k_min, k_max) = min_max(valid.iter().map(|p| p.strike));
        let (d_min, d_max) = min_max(valid.iter().map(|p| p.days_to_expiry));
        if k_max <= k_min || d_max <= d_min {
            return Err(PricerError::InvalidGrid {
                reason: "contracts must span more than one strike and one expiry".to_string(),
            });
        }

        let nn = NearestNeighbor::fit(
            valid.iter().map(|p| [p.strike, p.days_to_expiry]).collect(),
            valid.iter().map(|p| p.implied_vol).collect(),
        )
        .map(|nn| nn.with_scale([k_max - k_min, d_max - d_min]))
        .ok_or_else(|| PricerError::InvalidGrid {
            reason: "no solved contracts".to_string(),
        })?;

        let strike_axis = Array1::linspace(k_min, k_max, resolution);
        let day_axis = Array1::linspace(d_min, d_max, resolution);
        let vols = Array2::from_shape_fn((resolution, resolution), |(i, j)| {
            nn.predict([strike_axis[i], day_axis[j]])
        });

        Self::from_axes(&strike_axis.to_vec(), &day_axis.to_vec(), vols)
    }

    pub fn maturities(&self) -> &Array2<f64> {
        &self.maturities
    }

    pub fn strikes(&self) -> &Array2<f64> {
        &self.strikes
    }

    pub fn implied_vols(&self) -> &Array2<f64> {
        &self.implied_vols
    }

    /// `(num_strikes, num_maturities)`
    pub fn shape(&self) -> (usize, usize) {
        self.implied_vols.dim()
    }

    /// Distinct strikes, ascending
    pub fn strike_axis(&self) -> Array1<f64> {
        self.strikes.column(0).to_owned()
    }

    /// Distinct maturities in days, ascending
    pub fn maturity_axis(&self) -> Array1<f64> {
        self.maturities.row(0).to_owned()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
