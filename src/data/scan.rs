//! One gradiometer scan: info fields plus a cleaned, position-sorted table.
//!
//! Preprocessing happens once, at construction:
//!
//! 1. record the scan direction from the acquisition order
//! 2. stable-sort rows by position
//! 3. drop voltage outliers (|V| > 500)
//! 4. detect and correct SQUID flux jumps

use crate::domain::ScanDirection;
use crate::io::ingest::RawRow;
use crate::math::Polynomial;

pub const VOLTAGE_LIMIT: f64 = 500.0;

/// A jump is a first difference larger than this multiple of the mean one.
pub const JUMP_FACTOR: f64 = 10.0;

/// Rows used for the local polynomial on either side of a jump.
pub const JUMP_WINDOW: usize = 10;

/// Scalar fields of a `;` scan info line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanInfo {
    pub low_temp: f64,
    pub high_temp: f64,
    pub avg_temp: f64,
    pub low_field: f64,
    pub high_field: f64,
    pub drift: f64,
    pub slope: f64,
    pub squid_range: f64,
    pub given_center: f64,
    pub calculated_center: f64,
    pub amp_fixed: f64,
    pub amp_free: f64,
}

const INFO_KEYS: [(&str, &str); 12] = [
    ("low temp", "K"),
    ("high temp", "K"),
    ("avg. temp", "K"),
    ("low field", "Oe"),
    ("high field", "Oe"),
    ("drift", "V/s"),
    ("slope", "V/mm"),
    ("squid range", ""),
    ("given center", "mm"),
    ("calculated center", "mm"),
    ("amp fixed", "V"),
    ("amp free", "V"),
];

impl ScanInfo {
    /// Parse `;key = value unit;key = value unit;...`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<(&str, &str)> = line
            .split(';')
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let mut values = [0.0; 12];
        for (slot, (key, _)) in values.iter_mut().zip(INFO_KEYS.iter()) {
            let raw = fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
                .ok_or_else(|| format!("scan info is missing '{key}'"))?;
            let token = raw.split_whitespace().next().unwrap_or("");
            *slot = token
                .parse::<f64>()
                .map_err(|_| format!("invalid value '{raw}' for '{key}'"))?;
        }

        let [
            low_temp,
            high_temp,
            avg_temp,
            low_field,
            high_field,
            drift,
            slope,
            squid_range,
            given_center,
            calculated_center,
            amp_fixed,
            amp_free,
        ] = values;

        Ok(Self {
            low_temp,
            high_temp,
            avg_temp,
            low_field,
            high_field,
            drift,
            slope,
            squid_range,
            given_center,
            calculated_center,
            amp_fixed,
            amp_free,
        })
    }

    fn values(&self) -> [f64; 12] {
        [
            self.low_temp,
            self.high_temp,
            self.avg_temp,
            self.low_field,
            self.high_field,
            self.drift,
            self.slope,
            self.squid_range,
            self.given_center,
            self.calculated_center,
            self.amp_fixed,
            self.amp_free,
        ]
    }

    /// The `;` line that `parse` reads back into the same values.
    pub fn to_line(&self) -> String {
        INFO_KEYS
            .iter()
            .zip(self.values())
            .map(|((key, unit), value)| {
                if unit.is_empty() {
                    format!(";{key} = {value}")
                } else {
                    format!(";{key} = {value} {unit}")
                }
            })
            .collect()
    }
}

/// One cleaned table row. `voltage` is before SQUID range scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRow {
    pub timestamp: f64,
    pub position: f64,
    pub voltage: f64,
    pub processed: f64,
}

impl From<&RawRow> for ScanRow {
    fn from(r: &RawRow) -> Self {
        Self {
            timestamp: r.timestamp,
            position: r.position,
            voltage: r.voltage,
            processed: r.processed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawScanPoint {
    info: ScanInfo,
    direction: ScanDirection,
    jump_corrected: bool,
    rows: Vec<ScanRow>,
}

impl RawScanPoint {
    /// Build a scan from rows in acquisition order.
    pub fn new(info: ScanInfo, mut rows: Vec<ScanRow>) -> Result<Self, String> {
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err("scan has no data rows".to_string());
        };
        let direction = if first.position > last.position {
            ScanDirection::Down
        } else {
            ScanDirection::Up
        };

        rows.sort_by(|a, b| a.position.total_cmp(&b.position));
        rows.retain(|r| r.voltage.abs() <= VOLTAGE_LIMIT);
        if rows.is_empty() {
            return Err(format!("all voltages exceed {VOLTAGE_LIMIT} V"));
        }

        let positions: Vec<f64> = rows.iter().map(|r| r.position).collect();
        let mut voltages: Vec<f64> = rows.iter().map(|r| r.voltage).collect();
        let jump_corrected = correct_jumps(&positions, &mut voltages);
        if jump_corrected {
            for (row, v) in rows.iter_mut().zip(voltages) {
                row.voltage = v;
            }
        }

        Ok(Self {
            info,
            direction,
            jump_corrected,
            rows,
        })
    }

    pub fn info(&self) -> &ScanInfo {
        &self.info
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    pub fn is_jump_corrected(&self) -> bool {
        self.jump_corrected
    }

    pub fn rows(&self) -> &[ScanRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean of low and high temperature (K).
    pub fn temperature(&self) -> f64 {
        (self.info.low_temp + self.info.high_temp) / 2.0
    }

    /// Mean of low and high field (Oe).
    pub fn field(&self) -> f64 {
        (self.info.low_field + self.info.high_field) / 2.0
    }

    pub fn given_center(&self) -> f64 {
        self.info.given_center
    }

    pub fn last_timestamp(&self) -> f64 {
        self.rows.last().map_or(f64::NAN, |r| r.timestamp)
    }

    pub fn positions(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.position).collect()
    }

    /// Stored voltages (before SQUID range scaling).
    pub fn voltages(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.voltage).collect()
    }

    /// Voltages scaled by the SQUID range; this is what gets fitted.
    pub fn raw_voltages(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.voltage * self.info.squid_range)
            .collect()
    }

    /// Rows in the order they were acquired.
    pub fn rows_in_acquisition_order(&self) -> impl Iterator<Item = &ScanRow> {
        let down = self.direction == ScanDirection::Down;
        let mut iter = self.rows.iter();
        std::iter::from_fn(move || if down { iter.next_back() } else { iter.next() })
    }
}

/// Detect and remove flux jumps in place; `true` if any jump was found.
///
/// `position` must be sorted. The jump threshold is computed once from the
/// uncorrected signal; jumps are then corrected in index order.
pub fn correct_jumps(position: &[f64], voltage: &mut [f64]) -> bool {
    let n = voltage.len().min(position.len());
    if n < 2 {
        return false;
    }

    let diffs: Vec<f64> = voltage[..n].windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let threshold = JUMP_FACTOR * mean;
    let jumps: Vec<usize> = diffs
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > threshold)
        .map(|(i, _)| i)
        .collect();

    for &i in &jumps {
        if i + 1 >= JUMP_WINDOW {
            let lo = i + 1 - JUMP_WINDOW;
            let Some(poly) = Polynomial::fit(&position[lo..=i], &voltage[lo..=i], 2) else {
                log::warn!("jump at row {i}: polynomial fit failed, left uncorrected");
                continue;
            };
            let offset = poly.eval(position[i + 1]) - voltage[i + 1];
            for v in &mut voltage[i + 1..n] {
                *v += offset;
            }
        } else {
            let hi = (i + JUMP_WINDOW).min(n - 1);
            if hi < i + 3 {
                log::warn!("jump at row {i}: fewer than 3 rows after it, left uncorrected");
                continue;
            }
            let Some(poly) = Polynomial::fit(&position[i + 1..=hi], &voltage[i + 1..=hi], 2) else {
                log::warn!("jump at row {i}: polynomial fit failed, left uncorrected");
                continue;
            };
            let offset = poly.eval(position[i]) - voltage[i];
            for v in &mut voltage[..=i] {
                *v += offset;
            }
        }
    }

    !jumps.is_empty()
}
