//! A parsed instrument file: title, sample metadata and scans.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::scan::{RawScanPoint, ScanInfo, ScanRow};
use crate::error::AppError;
use crate::io::ingest::{DATA_MARKER, parse_raw_file};

/// Sample metadata keys written as `INFO,<value>,<KEY>` header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataKey {
    Appname,
    CoilSerialNumber,
    MomentUnits,
    SampleMaterial,
    SampleComment,
    SampleMass,
    SampleVolume,
    SampleMolecularWeight,
    SampleSize,
    SampleShape,
    SampleHolder,
    SampleHolderDetail,
    SampleOffset,
    SampleDensity,
    SampleMolarMass,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 15] = [
        MetadataKey::Appname,
        MetadataKey::CoilSerialNumber,
        MetadataKey::MomentUnits,
        MetadataKey::SampleMaterial,
        MetadataKey::SampleComment,
        MetadataKey::SampleMass,
        MetadataKey::SampleVolume,
        MetadataKey::SampleMolecularWeight,
        MetadataKey::SampleSize,
        MetadataKey::SampleShape,
        MetadataKey::SampleHolder,
        MetadataKey::SampleHolderDetail,
        MetadataKey::SampleOffset,
        MetadataKey::SampleDensity,
        MetadataKey::SampleMolarMass,
    ];

    /// Header key as it appears in the file.
    pub fn key(self) -> &'static str {
        match self {
            MetadataKey::Appname => "APPNAME",
            MetadataKey::CoilSerialNumber => "COIL_SERIAL_NUMBER",
            MetadataKey::MomentUnits => "MOMENT_UNITS",
            MetadataKey::SampleMaterial => "SAMPLE_MATERIAL",
            MetadataKey::SampleComment => "SAMPLE_COMMENT",
            MetadataKey::SampleMass => "SAMPLE_MASS",
            MetadataKey::SampleVolume => "SAMPLE_VOLUME",
            MetadataKey::SampleMolecularWeight => "SAMPLE_MOLECULAR_WEIGHT",
            MetadataKey::SampleSize => "SAMPLE_SIZE",
            MetadataKey::SampleShape => "SAMPLE_SHAPE",
            MetadataKey::SampleHolder => "SAMPLE_HOLDER",
            MetadataKey::SampleHolderDetail => "SAMPLE_HOLDER_DETAIL",
            MetadataKey::SampleOffset => "SAMPLE_OFFSET",
            MetadataKey::SampleDensity => "SAMPLE_DENSITY",
            MetadataKey::SampleMolarMass => "SAMPLE_MOLAR_MASS",
        }
    }

    /// Human-readable name for messages.
    pub fn label(self) -> &'static str {
        match self {
            MetadataKey::Appname => "application name",
            MetadataKey::CoilSerialNumber => "coil serial number",
            MetadataKey::MomentUnits => "moment units",
            MetadataKey::SampleMaterial => "sample material",
            MetadataKey::SampleComment => "sample comment",
            MetadataKey::SampleMass => "sample mass",
            MetadataKey::SampleVolume => "sample volume",
            MetadataKey::SampleMolecularWeight => "sample molecular weight",
            MetadataKey::SampleSize => "sample size",
            MetadataKey::SampleShape => "sample shape",
            MetadataKey::SampleHolder => "sample holder",
            MetadataKey::SampleHolderDetail => "sample holder detail",
            MetadataKey::SampleOffset => "sample offset",
            MetadataKey::SampleDensity => "sample density",
            MetadataKey::SampleMolarMass => "sample molar mass",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawDataFile {
    path: PathBuf,
    title: String,
    scans: Vec<Arc<RawScanPoint>>,
    metadata: BTreeMap<MetadataKey, String>,
}

impl RawDataFile {
    /// Parse and preprocess every scan of the file at `path`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let parsed = parse_raw_file(path)?;

        let mut metadata = BTreeMap::new();
        for key in MetadataKey::ALL {
            if let Some(value) = parsed.info_value(key.key())? {
                metadata.insert(key, value);
            }
        }

        let mut scans = Vec::with_capacity(parsed.blocks.len());
        for block in &parsed.blocks {
            let info = ScanInfo::parse(&block.info)
                .map_err(|msg| AppError::malformed(path, block.info_line, msg))?;
            let rows = block.rows.iter().map(ScanRow::from).collect();
            let scan = RawScanPoint::new(info, rows)
                .map_err(|msg| AppError::malformed(path, block.info_line, msg))?;
            scans.push(Arc::new(scan));
        }

        let jumps = scans.iter().filter(|s| s.is_jump_corrected()).count();
        log::info!(
            "loaded {} scans from '{}' ({} jump-corrected)",
            scans.len(),
            path.display(),
            jumps
        );

        Ok(Self {
            path: path.to_path_buf(),
            title: parsed.title,
            scans,
            metadata,
        })
    }

    /// Assemble a file from already-built scans (synthetic data, tests).
    pub fn from_parts(
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        scans: Vec<RawScanPoint>,
        metadata: BTreeMap<MetadataKey, String>,
    ) -> Result<Self, AppError> {
        let path = path.into();
        if scans.is_empty() {
            return Err(AppError::malformed(&path, 0, "file contains no scans"));
        }
        Ok(Self {
            path,
            title: title.into(),
            scans: scans.into_iter().map(Arc::new).collect(),
            metadata,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories; used as the measurement name.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn scans(&self) -> &[Arc<RawScanPoint>] {
        &self.scans
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn metadata(&self, key: MetadataKey) -> Option<&str> {
        self.metadata.get(&key).map(String::as_str)
    }

    pub fn metadata_entries(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
        self.metadata.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Leading number of a metadata value, if set and parsable.
    pub fn number(&self, key: MetadataKey) -> Option<f64> {
        self.metadata(key).and_then(leading_number)
    }

    /// A finite, non-zero numeric metadata value or a precondition error.
    pub fn require_number(&self, key: MetadataKey) -> Result<f64, AppError> {
        let raw = self.metadata(key).ok_or_else(|| AppError::MissingMetadata {
            measurement: self.file_name(),
            field: key.label(),
        })?;
        leading_number(raw)
            .filter(|v| v.is_finite() && *v != 0.0)
            .ok_or_else(|| AppError::InvalidMetadata {
                measurement: self.file_name(),
                field: key.label(),
                value: raw.to_string(),
            })
    }

    pub fn sample_mass(&self) -> Option<f64> {
        self.number(MetadataKey::SampleMass)
    }

    pub fn sample_density(&self) -> Option<f64> {
        self.number(MetadataKey::SampleDensity)
    }

    pub fn sample_molar_mass(&self) -> Option<f64> {
        self.number(MetadataKey::SampleMolarMass)
    }

    /// Set the sample density (g/cm³) and persist it to the source file.
    pub fn set_sample_density(&mut self, density: f64) -> Result<(), AppError> {
        self.set_numeric(MetadataKey::SampleDensity, density)
    }

    /// Set the molar mass (g/mol) and persist it to the source file.
    pub fn set_sample_molar_mass(&mut self, molar_mass: f64) -> Result<(), AppError> {
        self.set_numeric(MetadataKey::SampleMolarMass, molar_mass)
    }

    fn set_numeric(&mut self, key: MetadataKey, value: f64) -> Result<(), AppError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(AppError::InvalidArgument(format!(
                "{} must be a positive number, got {value}",
                key.label()
            )));
        }
        let text = fs::read_to_string(&self.path).map_err(|e| AppError::io(&self.path, e))?;
        let updated = upsert_info_line(&text, key, value)
            .ok_or_else(|| AppError::malformed(&self.path, 0, "no [Data] marker found"))?;
        fs::write(&self.path, updated).map_err(|e| AppError::io(&self.path, e))?;

        log::info!("set {} = {value:.3} in '{}'", key.key(), self.path.display());
        self.metadata.insert(key, format!("{value:.3}"));
        Ok(())
    }

    /// Index of the scan closest to `(temperature, field)`.
    ///
    /// Both absolute differences are min-max normalized over all scans and
    /// summed; the first minimum wins.
    pub fn closest_scan(&self, temperature: f64, field: f64) -> Option<usize> {
        let dt: Vec<f64> = self.scans.iter().map(|s| (s.temperature() - temperature).abs()).collect();
        let dh: Vec<f64> = self.scans.iter().map(|s| (s.field() - field).abs()).collect();
        let dt = normalize(&dt);
        let dh = normalize(&dh);

        let mut best: Option<(usize, f64)> = None;
        for (i, (t, h)) in dt.iter().zip(&dh).enumerate() {
            let d = t + h;
            if d.is_nan() {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    let scale = if range > 0.0 && range.is_finite() { range } else { 1.0 };
    values.iter().map(|v| (v - lo) / scale).collect()
}

fn leading_number(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

/// Rewrite (or insert) `INFO,<value:.3>,<KEY>` in the header of `text`.
///
/// Returns `None` when the text has no `[Data]` marker.
pub fn upsert_info_line(text: &str, key: MetadataKey, value: f64) -> Option<String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let data_idx = lines.iter().position(|l| l.trim() == DATA_MARKER)?;
    let new_line = format!("INFO,{value:.3},{}", key.key());

    let ending_of = |line: &str| -> &'static str {
        if line.ends_with("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    };

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    if let Some(idx) = lines[..data_idx].iter().position(|l| l.contains(key.key())) {
        out[idx] = format!("{new_line}{}", ending_of(lines[idx]));
    } else if let Some(idx) = lines[..data_idx]
        .iter()
        .position(|l| l.contains(MetadataKey::SampleMass.key()))
    {
        out.insert(idx + 1, format!("{new_line}{}", ending_of(lines[idx])));
    } else {
        out.insert(data_idx, format!("{new_line}{}", ending_of(lines[data_idx])));
    }
    Some(out.concat())
}
