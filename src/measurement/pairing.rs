//! Matching sample scans to background scans.
//!
//! Two policies:
//!
//! - **direct**: the i-th sample scan goes with the i-th background scan,
//!   rejected when temperature or field differ too much
//! - **indirect**: each sample scan takes the closest background scan in
//!   temperature/field taken in the same direction

use serde::Serialize;

use crate::data::RawScanPoint;
use crate::domain::{MappingMode, ScanDirection};

/// Direct pairs further apart than this are rejected.
pub const DIRECT_MAX_DT: f64 = 0.25;
pub const DIRECT_MAX_DH: f64 = 2.0;

/// Indirect candidates must be strictly closer than this.
pub const INDIRECT_MAX_DT: f64 = 0.1;
pub const INDIRECT_MAX_DH: f64 = 10.0;

/// What the pairing needs to know about a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanKey {
    pub temperature: f64,
    pub field: f64,
    pub direction: ScanDirection,
}

impl From<&RawScanPoint> for ScanKey {
    fn from(scan: &RawScanPoint) -> Self {
        Self {
            temperature: scan.temperature(),
            field: scan.field(),
            direction: scan.direction(),
        }
    }
}

/// Indices into the sample and background scan lists; at least one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanPair {
    pub sample: Option<usize>,
    pub background: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pairing {
    pub pairs: Vec<ScanPair>,
    pub non_matching: usize,
}

/// Pair scans under `mode`. With only one side present every scan of that
/// side becomes an unpaired point.
pub fn pair_scans(sample: Option<&[ScanKey]>, background: Option<&[ScanKey]>, mode: MappingMode) -> Pairing {
    match (sample, background) {
        (Some(s), Some(b)) => match mode {
            MappingMode::Direct => pair_direct(s, b),
            MappingMode::Indirect => pair_indirect(s, b),
        },
        (Some(s), None) => Pairing {
            pairs: (0..s.len())
                .map(|i| ScanPair {
                    sample: Some(i),
                    background: None,
                })
                .collect(),
            non_matching: 0,
        },
        (None, Some(b)) => Pairing {
            pairs: (0..b.len())
                .map(|i| ScanPair {
                    sample: None,
                    background: Some(i),
                })
                .collect(),
            non_matching: 0,
        },
        (None, None) => Pairing::default(),
    }
}

fn pair_direct(sample: &[ScanKey], background: &[ScanKey]) -> Pairing {
    let mut out = Pairing::default();
    for (i, (s, b)) in sample.iter().zip(background).enumerate() {
        let dt = (s.temperature - b.temperature).abs();
        let dh = (s.field - b.field).abs();
        if dt > DIRECT_MAX_DT || dh > DIRECT_MAX_DH {
            log::debug!("direct pair {i} rejected: dT={dt:.3} K, dH={dh:.3} Oe");
            out.non_matching += 1;
            continue;
        }
        out.pairs.push(ScanPair {
            sample: Some(i),
            background: Some(i),
        });
    }
    if sample.len() != background.len() {
        log::debug!(
            "direct pairing ignores {} trailing scans",
            sample.len().abs_diff(background.len())
        );
    }
    out
}

fn pair_indirect(sample: &[ScanKey], background: &[ScanKey]) -> Pairing {
    let mut out = Pairing::default();
    for (i, s) in sample.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for (j, b) in background.iter().enumerate() {
            let dt = (b.temperature - s.temperature).abs();
            let dh = (b.field - s.field).abs();
            if !(dt < INDIRECT_MAX_DT && dh < INDIRECT_MAX_DH && b.direction == s.direction) {
                continue;
            }
            let field_term = if s.field.abs() > 1.0 { dh / s.field } else { dh };
            let score = dt / s.temperature + field_term;
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((j, score));
            }
        }

        match best {
            Some((j, _)) => out.pairs.push(ScanPair {
                sample: Some(i),
                background: Some(j),
            }),
            None => {
                log::debug!("no background scan for sample scan {i}");
                out.non_matching += 1;
            }
        }
    }
    out
}
