//! Error types for the analytics pipeline.
//!
//! Structural problems (a required column is missing) are fatal and surface as
//! [`PipelineError`]. Data-quality problems are repaired or skipped and only
//! counted in an [`IssueTally`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A structurally required column is absent from an input table.
    #[error("schema error: {table} is missing required columns: {}", missing.join(", "))]
    Schema {
        /// Name of the table being read.
        table: String,
        /// Every required column that was not found.
        missing: Vec<String>,
    },

    /// Malformed CSV or a failed CSV write.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure on a specific path.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn schema(table: &str, missing: Vec<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            missing,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Non-fatal data issues. Each occurrence is repaired or excluded, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataIssue {
    /// A cell failed numeric coercion and was replaced with 0 or "missing".
    ValueCoercion,
    /// A record lacks coordinates or a crosswalk entry and was left out of an aggregate.
    UnmappableRecord,
    /// A demand row names a county outside the canonical set.
    NonCanonicalCounty,
    /// A record repeats a key already seen; the first occurrence wins.
    DuplicateRecord,
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataIssue::ValueCoercion => "value_coercion",
            DataIssue::UnmappableRecord => "unmappable_record",
            DataIssue::NonCanonicalCounty => "non_canonical_county",
            DataIssue::DuplicateRecord => "duplicate_record",
        };
        f.write_str(name)
    }
}

/// Per-kind counts of [`DataIssue`]s seen while running a stage.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IssueTally(BTreeMap<DataIssue, usize>);

impl IssueTally {
    pub fn record(&mut self, issue: DataIssue) {
        *self.0.entry(issue).or_default() += 1;
    }

    pub fn count(&self, issue: DataIssue) -> usize {
        self.0.get(&issue).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_missing_column() {
        let err = PipelineError::schema(
            "ev_counts",
            vec!["county".to_string(), "ev_count".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("ev_counts"));
        assert!(msg.contains("county, ev_count"));
    }

    #[test]
    fn test_tally_counts_per_kind() {
        let mut a = IssueTally::default();
        assert!(a.is_empty());
        a.record(DataIssue::ValueCoercion);
        a.record(DataIssue::ValueCoercion);
        a.record(DataIssue::UnmappableRecord);
        a.record(DataIssue::ValueCoercion);

        assert_eq!(a.count(DataIssue::ValueCoercion), 3);
        assert_eq!(a.count(DataIssue::UnmappableRecord), 1);
        assert_eq!(a.count(DataIssue::NonCanonicalCounty), 0);
        assert_eq!(a.total(), 4);
    }

    #[test]
    fn test_tally_serializes_snake_case_keys() {
        let mut t = IssueTally::default();
        t.record(DataIssue::NonCanonicalCounty);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"non_canonical_county":1}"#);
    }
}
