// src/math_utils.rs
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use statrs::function::erf;
use std::f64::consts::{PI, SQRT_2};

/// Standard normal CDF.
///
/// Written as `erfc(-x/√2)/2` so the lower tail keeps its relative
/// precision instead of cancelling against 1.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erf::erfc(-x / SQRT_2)
}

/// Standard normal probability density function
///
/// # Formula
/// ```text
/// φ(x) = (1/√(2π)) * exp(-x²/2)
/// ```
pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// First derivative of sampled values with respect to (possibly uneven) coordinates.
///
/// Interior points use the second-order centered stencil for non-uniform
/// spacing; the two end points use one-sided first-order differences:
/// ```text
/// f'(x_i) ≈ [h_s² f(i+1) + (h_d² - h_s²) f(i) - h_d² f(i-1)] / [h_s h_d (h_s + h_d)]
/// ```
/// with `h_s = x_i - x_{i-1}` and `h_d = x_{i+1} - x_i`. Fewer than two
/// samples yield a zero derivative.
pub fn gradient(values: ArrayView1<f64>, coords: ArrayView1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(values.len());
    gradient_into(values, coords, out.view_mut());
    out
}

/// Applies [`gradient`] to every lane of `values` running along `axis`.
///
/// `coords` has the same shape as `values` and supplies the coordinate of
/// every sample, so each lane may carry its own spacing.
pub fn gradient_along(values: &Array2<f64>, coords: &Array2<f64>, axis: Axis) -> Array2<f64> {
    let mut out = Array2::zeros(values.raw_dim());
    Zip::from(values.lanes(axis))
        .and(coords.lanes(axis))
        .and(out.lanes_mut(axis))
        .for_each(|v, x, o| gradient_into(v, x, o));
    out
}

fn gradient_into(values: ArrayView1<f64>, coords: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    let n = values.len();
    if n < 2 {
        out.fill(0.0);
        return;
    }

    out[0] = (values[1] - values[0]) / (coords[1] - coords[0]);
    out[n - 1] = (values[n - 1] - values[n - 2]) / (coords[n - 1] - coords[n - 2]);

    for i in 1..n - 1 {
        let hs = coords[i] - coords[i - 1];
        let hd = coords[i + 1] - coords[i];
        out[i] = (hs * hs * values[i + 1] + (hd * hd - hs * hs) * values[i]
            - hd * hd * values[i - 1])
            / (hs * hd * (hd + hs));
    }
}

pub struct Timer {
    start_time: std::time::Instant,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
