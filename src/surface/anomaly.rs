// src/surface/anomaly.rs
//! Flags grid cells where a surface changes abruptly between neighbours.

use crate::math_utils::gradient_along;
use ndarray::{Array2, Axis, Zip};

/// Boolean mask of cells whose gradient magnitude exceeds `threshold`.
///
/// Gradients are taken per grid step (unit spacing) along both axes;
/// cells touching NaN values are never flagged.
pub fn gradient_anomalies(values: &Array2<f64>, threshold: f64) -> Array2<bool> {
    let rows = Array2::from_shape_fn(values.raw_dim(), |(i, _)| i as f64);
    let cols = Array2::from_shape_fn(values.raw_dim(), |(_, j)| j as f64);

    let d_rows = gradient_along(values, &rows, Axis(0));
    let d_cols = gradient_along(values, &cols, Axis(1));

    Zip::from(&d_rows).and(&d_cols).map_collect(|&dr, &dc| {
        let magnitude = (dr * dr + dc * dc).sqrt();
        let magnitude = if magnitude.is_nan() { 0.0 } else { magnitude };
        magnitude > threshold
    })
}
