//! Ranked and filtered views over the summary and station tables.
//!
//! Every extractor takes its input by reference and returns a new table.

use serde::Serialize;

use crate::aggregate::PortSummary;
use crate::error::{IssueTally, PipelineError};
use crate::normalize::StationRow;
use crate::table::{RawTable, cell, parse_count, parse_float};

/// Rows in each top/bottom list.
pub const RANK_LIMIT: usize = 10;
/// Rows in each busy-station leaderboard.
pub const LEADERBOARD_LIMIT: usize = 200;
/// Minimum ports for a region to count as well supplied.
pub const HIGH_PORTS_MIN: u64 = 50;
/// Upper bound on DC fast share for a lagging region.
pub const LOW_DCFC_SHARE_MAX: f64 = 0.20;
/// Minimum Level 2 ports for a station-level upgrade candidate.
pub const LEVEL2_HEAVY_MIN: u64 = 8;
/// Largest port count accepted when reading a summary table back.
pub const MAX_SUMMARY_PORTS: u64 = 1_000_000_000;

/// Reads a persisted [`PortSummary`] table keyed by `key_column`.
pub fn read_port_summaries(
    table: &RawTable,
    key_column: &str,
    issues: &mut IssueTally,
) -> Result<Vec<PortSummary>, PipelineError> {
    let cols = table.require(&[
        key_column,
        "level2_ports",
        "dcfc_ports",
        "ports_total",
        "dcfc_share",
    ])?;
    let idx: Vec<_> = cols.into_iter().map(Some).collect();

    Ok(table
        .rows()
        .map(|row| PortSummary {
            key: cell(row, idx[0]).map(str::to_string),
            level2_ports: parse_count(cell(row, idx[1]), MAX_SUMMARY_PORTS, issues),
            dcfc_ports: parse_count(cell(row, idx[2]), MAX_SUMMARY_PORTS, issues),
            ports_total: parse_count(cell(row, idx[3]), MAX_SUMMARY_PORTS, issues),
            dcfc_share: parse_float(cell(row, idx[4]), issues).unwrap_or(0.0),
        })
        .collect())
}

fn sorted_by<T: Clone>(rows: &[T], cmp: impl FnMut(&T, &T) -> std::cmp::Ordering) -> Vec<T> {
    let mut out = rows.to_vec();
    out.sort_by(cmp);
    out
}

fn head<T>(mut rows: Vec<T>, n: usize) -> Vec<T> {
    rows.truncate(n);
    rows
}

pub fn top_ports_total(rows: &[PortSummary]) -> Vec<PortSummary> {
    head(sorted_by(rows, |a, b| b.ports_total.cmp(&a.ports_total)), RANK_LIMIT)
}

pub fn bottom_ports_total(rows: &[PortSummary]) -> Vec<PortSummary> {
    head(sorted_by(rows, |a, b| a.ports_total.cmp(&b.ports_total)), RANK_LIMIT)
}

fn with_ports(rows: &[PortSummary]) -> Vec<PortSummary> {
    rows.iter().filter(|r| r.ports_total > 0).cloned().collect()
}

/// Highest DC fast shares among groups that have any ports.
pub fn top_dcfc_share(rows: &[PortSummary]) -> Vec<PortSummary> {
    let rows = with_ports(rows);
    head(
        sorted_by(&rows, |a, b| b.dcfc_share.total_cmp(&a.dcfc_share)),
        RANK_LIMIT,
    )
}

/// Lowest DC fast shares among groups that have any ports.
pub fn bottom_dcfc_share(rows: &[PortSummary]) -> Vec<PortSummary> {
    let rows = with_ports(rows);
    head(
        sorted_by(&rows, |a, b| a.dcfc_share.total_cmp(&b.dcfc_share)),
        RANK_LIMIT,
    )
}

/// Groups with no DC fast ports, most Level 2 ports first.
pub fn zero_dcfc_by_level2(rows: &[PortSummary]) -> Vec<PortSummary> {
    let rows: Vec<_> = rows.iter().filter(|r| r.dcfc_ports == 0).cloned().collect();
    sorted_by(&rows, |a, b| b.level2_ports.cmp(&a.level2_ports))
}

/// Groups with at least 50 ports and a DC fast share in (0, 0.20], lowest
/// share first, then most ports.
pub fn low_dcfc_share_high_ports(rows: &[PortSummary]) -> Vec<PortSummary> {
    let rows: Vec<_> = rows
        .iter()
        .filter(|r| {
            r.ports_total >= HIGH_PORTS_MIN
                && r.dcfc_share > 0.0
                && r.dcfc_share <= LOW_DCFC_SHARE_MAX
        })
        .cloned()
        .collect();
    sorted_by(&rows, |a, b| {
        a.dcfc_share
            .total_cmp(&b.dcfc_share)
            .then_with(|| b.ports_total.cmp(&a.ports_total))
    })
}

/// A station row as listed in the opportunity tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationOpportunity {
    pub id: Option<String>,
    pub station_name: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub network: Option<String>,
    pub total_ports: u64,
}

impl StationOpportunity {
    pub const HEADER: [&'static str; 11] = [
        "id",
        "station_name",
        "city",
        "county",
        "state",
        "latitude",
        "longitude",
        "level2_ports",
        "dcfc_ports",
        "network",
        "total_ports",
    ];
}

impl From<&StationRow> for StationOpportunity {
    fn from(s: &StationRow) -> Self {
        Self {
            id: s.id.clone(),
            station_name: s.station_name.clone(),
            city: s.city.clone(),
            county: s.county.clone(),
            state: s.state.clone(),
            latitude: s.latitude,
            longitude: s.longitude,
            level2_ports: s.level2_ports,
            dcfc_ports: s.dcfc_ports,
            network: s.network.clone(),
            total_ports: s.total_ports(),
        }
    }
}

fn opportunities<'a>(stations: impl Iterator<Item = &'a StationRow>) -> Vec<StationOpportunity> {
    stations.map(StationOpportunity::from).collect()
}

/// Stations with no DC fast ports and at least 8 Level 2 ports, most Level 2 first.
pub fn level2_heavy_stations(stations: &[StationRow]) -> Vec<StationOpportunity> {
    let rows = opportunities(
        stations
            .iter()
            .filter(|s| s.dcfc_ports == 0 && s.level2_ports >= LEVEL2_HEAVY_MIN),
    );
    sorted_by(&rows, |a, b| b.level2_ports.cmp(&a.level2_ports))
}

/// Top stations by DC fast ports, among those with any.
pub fn busiest_by_dcfc(stations: &[StationRow]) -> Vec<StationOpportunity> {
    let rows = opportunities(stations.iter().filter(|s| s.dcfc_ports > 0));
    head(
        sorted_by(&rows, |a, b| b.dcfc_ports.cmp(&a.dcfc_ports)),
        LEADERBOARD_LIMIT,
    )
}

/// Top stations by total ports.
pub fn busiest_by_total(stations: &[StationRow]) -> Vec<StationOpportunity> {
    let rows = opportunities(stations.iter());
    head(
        sorted_by(&rows, |a, b| b.total_ports.cmp(&a.total_ports)),
        LEADERBOARD_LIMIT,
    )
}
