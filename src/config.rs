//! Well-known input and output locations under a single data directory.

use std::path::{Path, PathBuf};

/// Environment variable read by the CLI for the data directory.
pub const DATA_DIR_ENV: &str = "EV_SITING_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn raw(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    fn external(&self) -> PathBuf {
        self.data_dir.join("external")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn insights_dir(&self) -> PathBuf {
        self.processed_dir().join("insights")
    }

    fn processed(&self, file: &str) -> PathBuf {
        self.processed_dir().join(file)
    }

    /// Path of a file in the insights directory.
    pub fn insight(&self, file: &str) -> PathBuf {
        self.insights_dir().join(file)
    }

    // inputs

    pub fn raw_stations(&self) -> PathBuf {
        self.raw().join("afdc_stations_ca.csv")
    }

    pub fn zip_crosswalk(&self) -> PathBuf {
        self.external().join("zip_to_county_ca.csv")
    }

    pub fn ev_counts(&self) -> PathBuf {
        self.external().join("ev_counts_by_county_ca.csv")
    }

    // processed tables

    pub fn stations(&self) -> PathBuf {
        self.processed("stations_ca.csv")
    }

    pub fn ports(&self) -> PathBuf {
        self.processed("ports_ca.csv")
    }

    pub fn county_summary(&self) -> PathBuf {
        self.processed("ev_summary_by_county.csv")
    }

    pub fn region_summary(&self) -> PathBuf {
        self.processed("ev_summary_by_region.csv")
    }

    pub fn county_analytics(&self) -> PathBuf {
        self.processed("ev_county_supply_vs_demand.csv")
    }

    pub fn siting_top10(&self) -> PathBuf {
        self.processed("siting_score_top10_counties.csv")
    }

    pub fn station_busy(&self) -> PathBuf {
        self.processed("station_busy_candidates.csv")
    }

    pub fn station_busy_top25(&self) -> PathBuf {
        self.processed("station_busy_top25.csv")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
