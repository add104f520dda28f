//! Raw instrument file parsing.
//!
//! This module turns one magnetometer log file into:
//!
//! - the `TITLE` text
//! - the header lines (everything before `[Data]`), used for `INFO` lookups
//! - an ordered list of raw scan blocks, each an info line plus its data rows
//!
//! It does not interpret scan info or correct anything; see `data::scan` for
//! that. All errors carry the file path and a 1-based line number.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub const DATA_MARKER: &str = "[Data]";

/// One data row as written by the instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub timestamp: f64,
    pub position: f64,
    pub voltage: f64,
    pub processed: f64,
}

/// A `;` info line followed by its rows.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub info: String,
    pub info_line: usize,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub title: String,
    pub header: Vec<String>,
    pub blocks: Vec<RawBlock>,
}

impl ParsedFile {
    /// Value of the first `INFO` header line containing `key`.
    ///
    /// The value is everything between the first and the last comma. Returns
    /// `Ok(None)` when no line matches or the value is empty.
    pub fn info_value(&self, key: &str) -> Result<Option<String>, AppError> {
        for (idx, line) in self.header.iter().enumerate() {
            if !line.starts_with("INFO") || !line.contains(key) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 3 {
                return Err(AppError::malformed(
                    &self.path,
                    idx + 1,
                    format!("INFO line for '{key}' needs at least 3 fields"),
                ));
            }
            let value = fields[1..fields.len() - 1].join(",");
            let value = value.trim();
            return Ok((!value.is_empty()).then(|| value.to_string()));
        }
        Ok(None)
    }
}

pub fn parse_raw_file(path: &Path) -> Result<ParsedFile, AppError> {
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    parse_raw_str(path, &text)
}

/// Parse file contents; `path` is only used for error messages.
pub fn parse_raw_str(path: &Path, text: &str) -> Result<ParsedFile, AppError> {
    let mut title = String::new();
    let mut header = Vec::new();
    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut current: Option<RawBlock> = None;
    let mut in_data = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');

        if !in_data {
            if line.trim() == DATA_MARKER {
                in_data = true;
                continue;
            }
            if let Some(rest) = line.strip_prefix("TITLE,") {
                if title.is_empty() {
                    title = rest.trim().to_string();
                }
            }
            header.push(line.to_string());
            continue;
        }

        if line.starts_with(';') {
            if let Some(block) = current.take() {
                blocks.push(finish_block(path, block)?);
            }
            current = Some(RawBlock {
                info: line.to_string(),
                info_line: line_no,
                rows: Vec::new(),
            });
            continue;
        }

        if !line.starts_with(',') || line.matches(',').count() != 4 {
            // Column titles and anything else we do not understand.
            continue;
        }

        let fields: Vec<&str> = line.split(',').skip(1).map(str::trim).collect();
        if fields[1].is_empty() {
            continue;
        }
        let Some(block) = current.as_mut() else {
            return Err(AppError::malformed(path, line_no, "data row before any scan info line"));
        };
        block.rows.push(parse_row(path, line_no, &fields)?);
    }

    if let Some(block) = current.take() {
        blocks.push(finish_block(path, block)?);
    }
    if blocks.is_empty() {
        let line = text.lines().count().max(1);
        return Err(AppError::malformed(path, line, "file contains no scans after [Data]"));
    }

    Ok(ParsedFile {
        path: path.to_path_buf(),
        title,
        header,
        blocks,
    })
}

fn finish_block(path: &Path, block: RawBlock) -> Result<RawBlock, AppError> {
    if block.rows.is_empty() {
        return Err(AppError::malformed(path, block.info_line, "scan has no data rows"));
    }
    Ok(block)
}

fn parse_row(path: &Path, line: usize, fields: &[&str]) -> Result<RawRow, AppError> {
    let number = |idx: usize, name: &str| -> Result<f64, AppError> {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| AppError::malformed(path, line, format!("invalid {name} '{}'", fields[idx])))
    };

    let processed = if fields[3].is_empty() {
        f64::NAN
    } else {
        number(3, "processed voltage")?
    };

    Ok(RawRow {
        line,
        timestamp: number(0, "timestamp")?,
        position: number(1, "position")?,
        voltage: number(2, "voltage")?,
        processed,
    })
}
