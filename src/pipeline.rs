//! Batch stages. Each stage reads its inputs from the data directory, runs
//! the pure transforms and writes complete output tables before returning.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::{self, PortSummary, StationBusyRecord, summarize_by};
use crate::config::PipelineConfig;
use crate::demand::{join_supply, load_demand};
use crate::error::{IssueTally, PipelineError};
use crate::insights::{self, StationOpportunity, read_port_summaries};
use crate::metrics::{CountyAnalyticsRecord, compute_metrics, top_by_siting};
use crate::normalize::{self, PortRecord, Station, read_station_rows};
use crate::reference::Crosswalk;
use crate::table::{RawTable, write_table};

/// Rows kept in the county siting shortlist.
pub const SITING_SHORTLIST: usize = 10;
/// Rows kept in the busy-station shortlist.
pub const BUSY_SHORTLIST: usize = 25;

/// One written table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSummary {
    pub path: String,
    pub rows: usize,
}

/// What a stage wrote and which data issues it absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub stage: &'static str,
    pub outputs: Vec<OutputSummary>,
    pub issues: IssueTally,
}

impl StageSummary {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            outputs: Vec::new(),
            issues: IssueTally::default(),
        }
    }

    fn write<T: Serialize>(
        &mut self,
        path: &Path,
        header: &[&str],
        rows: &[T],
    ) -> Result<(), PipelineError> {
        write_table(path, header, rows)?;
        info!(path = %path.display(), rows = rows.len(), "Saved");
        self.outputs.push(OutputSummary {
            path: path.display().to_string(),
            rows: rows.len(),
        });
        Ok(())
    }

    /// Rows written to the output whose path ends with `file`.
    pub fn rows_for(&self, file: &str) -> Option<usize> {
        self.outputs
            .iter()
            .find(|o| o.path.ends_with(file))
            .map(|o| o.rows)
    }

    fn finish(self) -> Result<Self> {
        if !self.issues.is_empty() {
            warn!(
                stage = self.stage,
                total = self.issues.total(),
                issues = %serde_json::to_string(&self.issues)?,
                "Data issues repaired or skipped"
            );
        }
        info!(summary = %serde_json::to_string(&self)?, "Stage complete");
        Ok(self)
    }
}

/// Normalizes the raw station dump and writes the station, port and
/// station-field summary tables.
#[tracing::instrument(skip_all, fields(data_dir = %cfg.data_dir().display()))]
pub fn clean_stations(cfg: &PipelineConfig) -> Result<StageSummary> {
    let mut summary = StageSummary::new("clean-stations");

    let raw = RawTable::read(&cfg.raw_stations(), &mut summary.issues)?;
    let stations = normalize::clean_stations(&raw, &mut summary.issues)?;
    summary.write(&cfg.stations(), &Station::HEADER, &stations)?;

    let ports: Vec<PortRecord<'_>> = stations.iter().flat_map(|s| s.ports()).collect();
    summary.write(&cfg.ports(), &PortRecord::HEADER, &ports)?;

    let port_counts = |s: &Station| (s.level2_ports, s.dcfc_ports);
    let by_county = summarize_by(&stations, |s| s.county.as_deref(), port_counts);
    summary.write(
        &cfg.county_summary(),
        &PortSummary::header("county"),
        &by_county,
    )?;

    let by_region = summarize_by(&stations, |s| s.region.as_deref(), port_counts);
    summary.write(
        &cfg.region_summary(),
        &PortSummary::header("region"),
        &by_region,
    )?;

    summary.finish()
}

/// Resolves stations to counties, joins EV demand and scores every county.
#[tracing::instrument(skip_all, fields(data_dir = %cfg.data_dir().display()))]
pub fn county_supply(cfg: &PipelineConfig) -> Result<StageSummary> {
    let mut summary = StageSummary::new("county-supply");
    let issues = &mut summary.issues;

    let table = RawTable::read(&cfg.stations(), issues)?;
    let stations = read_station_rows(&table, &["zip", "level2_ports", "dcfc_ports"], issues)?;
    let crosswalk = Crosswalk::read(&cfg.zip_crosswalk(), issues)?;
    let demand = load_demand(RawTable::read(&cfg.ev_counts(), issues)?, issues)?;

    let supply = aggregate::county_supply(&stations, &crosswalk, issues);
    let analytics = compute_metrics(&join_supply(&demand, &supply));

    summary.write(
        &cfg.county_analytics(),
        &CountyAnalyticsRecord::HEADER,
        &analytics,
    )?;
    summary.write(
        &cfg.siting_top10(),
        &CountyAnalyticsRecord::HEADER,
        &top_by_siting(&analytics, SITING_SHORTLIST),
    )?;

    summary.finish()
}

/// Scores every station's likely utilization and writes the ranked list.
#[tracing::instrument(skip_all, fields(data_dir = %cfg.data_dir().display()))]
pub fn station_busy(cfg: &PipelineConfig) -> Result<StageSummary> {
    let mut summary = StageSummary::new("station-busy");

    let table = RawTable::read(&cfg.stations(), &mut summary.issues)?;
    let stations = read_station_rows(
        &table,
        &["station_name", "city", "zip", "level2_ports", "dcfc_ports"],
        &mut summary.issues,
    )?;
    let crosswalk = Crosswalk::read(&cfg.zip_crosswalk(), &mut summary.issues)?;

    let busy = aggregate::station_busy(&stations, &crosswalk);
    summary.write(&cfg.station_busy(), &StationBusyRecord::HEADER, &busy)?;

    let top = &busy[..busy.len().min(BUSY_SHORTLIST)];
    summary.write(&cfg.station_busy_top25(), &StationBusyRecord::HEADER, top)?;

    summary.finish()
}

/// Top and bottom counties by total ports and by DC fast share.
#[tracing::instrument(skip_all, fields(data_dir = %cfg.data_dir().display()))]
pub fn summary_insights(cfg: &PipelineConfig) -> Result<StageSummary> {
    let mut summary = StageSummary::new("summary-insights");

    let table = RawTable::read(&cfg.county_summary(), &mut summary.issues)?;
    let counties = read_port_summaries(&table, "county", &mut summary.issues)?;
    let header = PortSummary::header("county");

    let tables = [
        ("top10_ports_total.csv", insights::top_ports_total(&counties)),
        ("bottom10_ports_total.csv", insights::bottom_ports_total(&counties)),
        ("top10_dcfc_share.csv", insights::top_dcfc_share(&counties)),
        ("bottom10_dcfc_share.csv", insights::bottom_dcfc_share(&counties)),
    ];
    for (file, rows) in &tables {
        summary.write(&cfg.insight(file), &header, rows)?;
    }

    summary.finish()
}

/// Upgrade and expansion candidates by region and by station.
#[tracing::instrument(skip_all, fields(data_dir = %cfg.data_dir().display()))]
pub fn opportunity_insights(cfg: &PipelineConfig) -> Result<StageSummary> {
    let mut summary = StageSummary::new("opportunity-insights");

    let table = RawTable::read(&cfg.stations(), &mut summary.issues)?;
    let stations = read_station_rows(&table, &["level2_ports", "dcfc_ports"], &mut summary.issues)?;
    let table = RawTable::read(&cfg.region_summary(), &mut summary.issues)?;
    let regions = read_port_summaries(&table, "region", &mut summary.issues)?;
    let header = PortSummary::header("region");

    summary.write(
        &cfg.insight("opportunity_regions_zero_dcfc_sorted_by_level2.csv"),
        &header,
        &insights::zero_dcfc_by_level2(&regions),
    )?;
    summary.write(
        &cfg.insight("opportunity_regions_low_dcfc_share_high_ports.csv"),
        &header,
        &insights::low_dcfc_share_high_ports(&regions),
    )?;

    let stations_tables = [
        (
            "opportunity_stations_level2_no_dcfc_8plus.csv",
            insights::level2_heavy_stations(&stations),
        ),
        (
            "likely_busy_top_stations_by_dcfc_ports.csv",
            insights::busiest_by_dcfc(&stations),
        ),
        (
            "likely_busy_top_stations_by_total_ports.csv",
            insights::busiest_by_total(&stations),
        ),
    ];
    for (file, rows) in &stations_tables {
        summary.write(&cfg.insight(file), &StationOpportunity::HEADER, rows)?;
    }

    summary.finish()
}

/// Runs every stage in data-flow order.
pub fn run_all(cfg: &PipelineConfig) -> Result<Vec<StageSummary>> {
    Ok(vec![
        clean_stations(cfg)?,
        county_supply(cfg)?,
        station_busy(cfg)?,
        summary_insights(cfg)?,
        opportunity_insights(cfg)?,
    ])
}
