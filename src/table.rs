//! Flat-file table I/O.
//!
//! Inputs are read as string cells and looked up by header name so that a
//! missing column can be reported as a schema error instead of a parse error.
//! Outputs are written with a header row through `serde`.

use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{DataIssue, IssueTally, PipelineError};

/// A CSV table held in memory with string cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    /// Cells that were not valid UTF-8 and were decoded lossily.
    lossy_cells: usize,
}

impl RawTable {
    /// Reads a CSV file. Rows may be ragged; short rows read as missing cells.
    /// Cells that are not valid UTF-8 are decoded with replacement characters
    /// and counted as coercion issues.
    pub fn read(path: &Path, issues: &mut IssueTally) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("table")
            .to_string();

        let table = Self::from_reader(&name, file)?;
        if table.lossy_cells > 0 {
            warn!(table = %name, cells = table.lossy_cells, "Invalid UTF-8 replaced");
            for _ in 0..table.lossy_cells {
                issues.record(DataIssue::ValueCoercion);
            }
        }
        Ok(table)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, PipelineError> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut lossy_cells = 0;

        let (header_record, bad) = decode_lossy(rdr.byte_headers()?.clone());
        lossy_cells += bad;
        let headers = header_record.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in rdr.byte_records() {
            let (record, bad) = decode_lossy(record?);
            lossy_cells += bad;
            rows.push(record);
        }
        debug!(table = name, rows = rows.len(), lossy_cells, "Table loaded");

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
            lossy_cells,
        })
    }

    /// Trims and lower-cases every header.
    pub fn normalize_headers(mut self) -> Self {
        self.headers = self
            .headers
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        self
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first column with this header.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Resolves every named column, or fails listing all that are absent.
    pub fn require(&self, headers: &[&str]) -> Result<Vec<usize>, PipelineError> {
        let missing: Vec<String> = headers
            .iter()
            .filter(|h| self.column(h).is_none())
            .map(|h| h.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::schema(&self.name, missing));
        }

        Ok(headers.iter().filter_map(|h| self.column(h)).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = &StringRecord> {
        self.rows.iter()
    }
}

/// Decodes a byte record as UTF-8, replacing invalid sequences. Also returns
/// how many cells needed replacement.
fn decode_lossy(record: ByteRecord) -> (StringRecord, usize) {
    match StringRecord::from_byte_record(record) {
        Ok(record) => (record, 0),
        Err(err) => {
            let record = err.into_byte_record();
            let bad = record
                .iter()
                .filter(|field| std::str::from_utf8(field).is_err())
                .count();
            (StringRecord::from_byte_record_lossy(record), bad)
        }
    }
}

/// Returns the trimmed cell at `idx`, treating an absent column, a short row
/// and an empty string alike as missing.
pub fn cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parses a cell as a finite float. Unparseable text is a coercion issue and
/// reads as missing.
pub fn parse_float(raw: Option<&str>, issues: &mut IssueTally) -> Option<f64> {
    let raw = raw?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!(value = raw, "Numeric coercion failed");
            issues.record(DataIssue::ValueCoercion);
            None
        }
    }
}

/// Parses a cell as a count in `0..=max`. Missing reads as 0; unparseable,
/// negative or oversized values are coerced to 0 and counted.
pub fn parse_count(raw: Option<&str>, max: u64, issues: &mut IssueTally) -> u64 {
    match parse_float(raw, issues) {
        Some(v) if (0.0..=max as f64).contains(&v) => (v.trunc() as u64).min(max),
        Some(v) => {
            debug!(value = v, max, "Out-of-range count coerced to 0");
            issues.record(DataIssue::ValueCoercion);
            0
        }
        None => 0,
    }
}

/// Writes `records` to `path` under `header`, replacing any existing file.
/// Parent directories are created as needed. The header is written even when
/// there are no records.
pub fn write_table<T: Serialize>(
    path: &Path,
    header: &[&str],
    records: &[T],
) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(header)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;

    debug!(path = %path.display(), rows = records.len(), "Table written");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    Ok(())
}
