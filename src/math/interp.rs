//! Grids and piecewise-linear interpolation.

/// `n` evenly spaced points over `[start, stop]` (both inclusive).
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            // Pin the end point so it never overshoots by rounding.
            out[n - 1] = stop;
            out
        }
    }
}

/// Linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be non-decreasing. Values outside the table are clamped to the
/// first/last sample. Returns `NaN` for an empty table.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    // First index with xp[idx] > x; x lies in [xp[idx-1], xp[idx]).
    let idx = xp[..n].partition_point(|&v| v <= x);
    let (x0, x1) = (xp[idx - 1], xp[idx]);
    let (y0, y1) = (fp[idx - 1], fp[idx]);
    if x1 == x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Interpolate a whole grid at once.
pub fn interp_many(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&xi| interp(xi, xp, fp)).collect()
}
