// src/surface/interp.rs
//! Interpolators over the (strike, maturity) plane.

use ndarray::{Array1, Array2};

/// Nearest-neighbour regressor over 2D points.
///
/// Distance is Euclidean after dividing each coordinate by its scale;
/// ties go to the earliest fitted point.
#[derive(Debug, Clone)]
pub struct NearestNeighbor {
    points: Vec<[f64; 2]>,
    values: Vec<f64>,
    scale: [f64; 2],
}

impl NearestNeighbor {
    /// `None` when there is nothing to learn from or the lengths disagree.
    pub fn fit(points: Vec<[f64; 2]>, values: Vec<f64>) -> Option<Self> {
        if points.is_empty() || points.len() != values.len() {
            return None;
        }
        Some(Self {
            points,
            values,
            scale: [1.0, 1.0],
        })
    }

    /// Per-axis scale; non-positive entries are ignored.
    pub fn with_scale(mut self, scale: [f64; 2]) -> Self {
        for (s, new) in self.scale.iter_mut().zip(scale) {
            if new.is_finite() && new > 0.0 {
                *s = new;
            }
        }
        self
    }

    pub fn predict(&self, query: [f64; 2]) -> f64 {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, p) in self.points.iter().enumerate() {
            let dx = (p[0] - query[0]) / self.scale[0];
            let dy = (p[1] - query[1]) / self.scale[1];
            let dist = dx * dx + dy * dy;
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        self.values[best]
    }
}

/// Bilinear interpolation on a rectilinear grid.
///
/// Queries outside the axes are clamped to the nearest edge, so the
/// surface is flat beyond its last node in every direction.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    x_axis: Array1<f64>,
    y_axis: Array1<f64>,
    values: Array2<f64>,
}

impl GridInterpolator {
    /// `values[[i, j]]` sits at `(x_axis[i], y_axis[j])`; both axes ascending.
    pub fn new(x_axis: Array1<f64>, y_axis: Array1<f64>, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), (x_axis.len(), y_axis.len()));
        Self {
            x_axis,
            y_axis,
            values,
        }
    }

    pub fn x_axis(&self) -> &Array1<f64> {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &Array1<f64> {
        &self.y_axis
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        let (xi_lo, xi_hi, x_frac) = find_bracket(&self.x_axis, x);
        let (yi_lo, yi_hi, y_frac) = find_bracket(&self.y_axis, y);

        let v00 = self.values[[xi_lo, yi_lo]];
        let v10 = self.values[[xi_hi, yi_lo]];
        let v01 = self.values[[xi_lo, yi_hi]];
        let v11 = self.values[[xi_hi, yi_hi]];

        let v0 = v00 * (1.0 - x_frac) + v10 * x_frac;
        let v1 = v01 * (1.0 - x_frac) + v11 * x_frac;
        v0 * (1.0 - y_frac) + v1 * y_frac
    }
}

/// Bracketing indices and weight of `value` on an ascending axis, clamped.
fn find_bracket(axis: &Array1<f64>, value: f64) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 0 {
        return (0, 0, 0.0);
    }
    let last = n - 1;
    // NaN lands on the lower edge
    if value.is_nan() || value <= axis[0] {
        return (0, 0, 0.0);
    }
    if value >= axis[last] {
        return (last, last, 0.0);
    }

    let hi = axis
        .as_slice()
        .map(|s| s.partition_point(|&a| a <= value))
        .unwrap_or_else(|| axis.iter().take_while(|&&a| a <= value).count());
    let lo = hi - 1;
    let frac = (value - axis[lo]) / (axis[hi] - axis[lo]);
    (lo, hi, frac)
}
