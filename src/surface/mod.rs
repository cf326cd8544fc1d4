//! Implied volatility grids and the local volatility surfaces built from them.

pub mod anomaly;
pub mod dupire;
pub mod grid;
pub mod interp;

pub use dupire::{BuildDiagnostics, LocalVolSurface, SurfaceConfig};
pub use grid::{IvPoint, VolSurfaceGrid};
