//! Background subtraction on a common position grid.

use thiserror::Error;

use crate::math::{interp_many, linspace};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubtractError {
    #[error("sample and background scans do not overlap ({min_pos:.3} mm >= {max_pos:.3} mm)")]
    NoOverlap { min_pos: f64, max_pos: f64 },

    #[error("empty scan")]
    Empty,
}

/// A raw voltage-vs-position signal.
#[derive(Debug, Clone, Copy)]
pub struct Signal<'a> {
    pub position: &'a [f64],
    pub voltage: &'a [f64],
}

impl<'a> Signal<'a> {
    pub fn new(position: &'a [f64], voltage: &'a [f64]) -> Self {
        Self { position, voltage }
    }

    fn bounds(&self) -> Option<(f64, f64)> {
        let lo = self.position.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.position.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    }
}

/// Resample both signals onto `len(sample)` evenly spaced positions over the
/// overlap of their ranges and return `(grid, sample − background)`.
pub fn subtract_background(
    sample: Signal<'_>,
    background: Signal<'_>,
) -> Result<(Vec<f64>, Vec<f64>), SubtractError> {
    let (s_lo, s_hi) = sample.bounds().ok_or(SubtractError::Empty)?;
    let (b_lo, b_hi) = background.bounds().ok_or(SubtractError::Empty)?;

    let min_pos = s_lo.max(b_lo);
    let max_pos = s_hi.min(b_hi);
    if min_pos >= max_pos {
        return Err(SubtractError::NoOverlap { min_pos, max_pos });
    }

    let grid = linspace(min_pos, max_pos, sample.position.len());
    let s = interp_many(&grid, sample.position, sample.voltage);
    let b = interp_many(&grid, background.position, background.voltage);
    let diff = s.iter().zip(&b).map(|(s, b)| s - b).collect();

    Ok((grid, diff))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spans_overlap_with_sample_length() {
        let sp: Vec<f64> = (0..=40).map(|i| i as f64).collect();
        let sv: Vec<f64> = sp.iter().map(|z| 0.1 * z).collect();
        let bp: Vec<f64> = (0..=30).map(|i| 10.0 + 2.0 * i as f64).collect();
        let bv: Vec<f64> = bp.iter().map(|z| 0.05 * z).collect();

        let (grid, diff) = subtract_background(Signal::new(&sp, &sv), Signal::new(&bp, &bv)).unwrap();
        assert_eq!(grid.len(), sp.len());
        assert_eq!(diff.len(), sp.len());
        assert_eq!(grid[0], 10.0);
        assert_eq!(*grid.last().unwrap(), 40.0);
        for (z, d) in grid.iter().zip(&diff) {
            assert!((d - 0.05 * z).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_offset_cancels() {
        let z: Vec<f64> = (0..50).map(|i| i as f64 * 1.2).collect();
        let shape: Vec<f64> = z.iter().map(|x| (x / 7.0).sin()).collect();
        let shifted: Vec<f64> = shape.iter().map(|v| v + 0.01).collect();

        let (_, diff) = subtract_background(Signal::new(&z, &shifted), Signal::new(&z, &shape)).unwrap();
        assert!(diff.iter().all(|d| (d - 0.01).abs() < 1e-12));

        let (_, same) = subtract_background(Signal::new(&z, &shifted), Signal::new(&z, &shifted)).unwrap();
        assert!(same.iter().all(|d| d.abs() < 1e-3));
    }

    #[test]
    fn disjoint_ranges_are_rejected() {
        let a = [0.0, 1.0, 2.0];
        let b = [5.0, 6.0, 7.0];
        let v = [0.0; 3];
        let err = subtract_background(Signal::new(&a, &v), Signal::new(&b, &v)).unwrap_err();
        assert!(matches!(err, SubtractError::NoOverlap { .. }));
    }
}
