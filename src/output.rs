// src/output.rs
//! CSV dumps of simulation paths and surface grids for external inspection.

use crate::error::PricerResult;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row per archived path: `path_id,day_0,…,day_n`.
pub fn write_paths_csv<P: AsRef<Path>>(path: P, paths: &Array2<f64>) -> PricerResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_paths(&mut file, paths)?;
    file.flush()?;
    Ok(())
}

pub fn write_paths<W: Write>(out: &mut W, paths: &Array2<f64>) -> PricerResult<()> {
    write!(out, "path_id")?;
    for day in 0..paths.ncols() {
        write!(out, ",day_{}", day)?;
    }
    writeln!(out)?;

    for (i, row) in paths.rows().into_iter().enumerate() {
        write!(out, "{}", i)?;
        for value in row {
            write!(out, ",{}", value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Grid with its row labels in the first column and column labels in the header.
///
/// NaN cells are written as empty fields.
pub fn write_grid_csv<P: AsRef<Path>>(
    path: P,
    row_labels: &Array1<f64>,
    col_labels: &Array1<f64>,
    values: &Array2<f64>,
) -> PricerResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_grid(&mut file, row_labels, col_labels, values)?;
    file.flush()?;
    Ok(())
}

pub fn write_grid<W: Write>(
    out: &mut W,
    row_labels: &Array1<f64>,
    col_labels: &Array1<f64>,
    values: &Array2<f64>,
) -> PricerResult<()> {
    for label in col_labels {
        write!(out, ",{}", label)?;
    }
    writeln!(out)?;

    for (label, row) in row_labels.iter().zip(values.rows()) {
        write!(out, "{}", label)?;
        for value in row {
            if value.is_nan() {
                write!(out, ",")?;
            } else {
                write!(out, ",{}", value)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_summary_csv<P: AsRef<Path>>(path: P, summary: &[(&str, String)]) -> PricerResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for (key, value) in summary {
        writeln!(file, "{},{}", key, value)?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn paths_layout() {
        let paths = array![[100.0, 101.5], [100.0, 99.0]];
        let mut buf = Vec::new();
        write_paths(&mut buf, &paths).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "path_id,day_0,day_1\n0,100,101.5\n1,100,99\n");
    }

    #[test]
    fn grid_layout_leaves_nan_blank() {
        let strikes = array![90.0, 110.0];
        let days = array![30.0, 60.0];
        let values = array![[0.2, f64::NAN], [0.25, 0.3]];
        let mut buf = Vec::new();
        write_grid(&mut buf, &strikes, &days, &values).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, ",30,60\n90,0.2,\n110,0.25,0.3\n");
    }

    #[test]
    fn file_writers_report_io_errors() {
        let paths = array![[100.0]];
        let result = write_paths_csv("/nonexistent-dir/paths.csv", &paths);
        assert!(matches!(result, Err(crate::error::PricerError::Io(_))));
    }
}
