//! Port aggregation by geography.
//!
//! Two paths share the zip crosswalk: a county supply sum and a station-grain
//! busy ranking. The station-field summaries group on the normalized
//! `county`/`region` columns instead and keep a missing-key group.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{DataIssue, IssueTally};
use crate::metrics::share;
use crate::normalize::StationRow;
use crate::reference::Crosswalk;

/// Busy-score weight for a DC fast port.
pub const DCFC_BUSY_WEIGHT: f64 = 1.5;
/// Busy-score weight for a Level 2 port.
pub const LEVEL2_BUSY_WEIGHT: f64 = 0.25;

/// Summed ports for one county resolved through the crosswalk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountySupplyRecord {
    pub county: String,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub ports_total: u64,
}

/// Sums ports per crosswalk county. Stations whose zip is missing or not in
/// the crosswalk are left out and counted as unmappable.
///
/// Output is ordered by county name.
pub fn county_supply(
    stations: &[StationRow],
    crosswalk: &Crosswalk,
    issues: &mut IssueTally,
) -> Vec<CountySupplyRecord> {
    let mut sums: BTreeMap<&'static str, (u64, u64)> = BTreeMap::new();

    for station in stations {
        let Some(county) = crosswalk.resolve(station.zip.as_deref()) else {
            debug!(zip = ?station.zip, "Station zip not in crosswalk");
            issues.record(DataIssue::UnmappableRecord);
            continue;
        };
        let entry = sums.entry(county).or_default();
        entry.0 = entry.0.saturating_add(station.level2_ports);
        entry.1 = entry.1.saturating_add(station.dcfc_ports);
    }

    let supply: Vec<_> = sums
        .into_iter()
        .map(|(county, (level2_ports, dcfc_ports))| CountySupplyRecord {
            county: county.to_string(),
            level2_ports,
            dcfc_ports,
            ports_total: level2_ports.saturating_add(dcfc_ports),
        })
        .collect();

    info!(counties = supply.len(), "County supply aggregated");
    supply
}

/// A station with its crosswalk county and utilization proxy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationBusyRecord {
    pub station_name: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub county: Option<String>,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub total_ports: u64,
    pub likely_busy_score: f64,
}

impl StationBusyRecord {
    pub const HEADER: [&'static str; 8] = [
        "station_name",
        "city",
        "zip",
        "county",
        "level2_ports",
        "dcfc_ports",
        "total_ports",
        "likely_busy_score",
    ];
}

/// `1.5 * dcfc + 0.25 * level2`.
pub fn busy_score(level2_ports: u64, dcfc_ports: u64) -> f64 {
    DCFC_BUSY_WEIGHT * dcfc_ports as f64 + LEVEL2_BUSY_WEIGHT * level2_ports as f64
}

/// Scores every station and orders by busy score, then DC fast ports, then
/// total ports, all descending. Unmapped stations stay with no county.
pub fn station_busy(stations: &[StationRow], crosswalk: &Crosswalk) -> Vec<StationBusyRecord> {
    let mut out: Vec<_> = stations
        .iter()
        .map(|s| StationBusyRecord {
            station_name: s.station_name.clone(),
            city: s.city.clone(),
            zip: s.zip.clone(),
            county: crosswalk.resolve(s.zip.as_deref()).map(str::to_string),
            level2_ports: s.level2_ports,
            dcfc_ports: s.dcfc_ports,
            total_ports: s.total_ports(),
            likely_busy_score: busy_score(s.level2_ports, s.dcfc_ports),
        })
        .collect();

    out.sort_by(|a, b| {
        b.likely_busy_score
            .total_cmp(&a.likely_busy_score)
            .then_with(|| b.dcfc_ports.cmp(&a.dcfc_ports))
            .then_with(|| b.total_ports.cmp(&a.total_ports))
    });
    out
}

/// Port totals for one group of stations. `key` is `None` for the group of
/// stations that have no value for the grouping column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortSummary {
    pub key: Option<String>,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub ports_total: u64,
    pub dcfc_share: f64,
}

impl PortSummary {
    /// Header with the key column named after the grouping field.
    pub fn header(key_column: &str) -> [&str; 5] {
        [
            key_column,
            "level2_ports",
            "dcfc_ports",
            "ports_total",
            "dcfc_share",
        ]
    }
}

/// Groups stations by `key`, keeping a group for stations without one, and
/// sorts by total ports descending.
pub fn summarize_by<T, K, P>(stations: &[T], key: K, ports: P) -> Vec<PortSummary>
where
    K: Fn(&T) -> Option<&str>,
    P: Fn(&T) -> (u64, u64),
{
    let mut groups: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut missing: Option<(u64, u64)> = None;

    for station in stations {
        let (level2, dcfc) = ports(station);
        let slot = match key(station) {
            Some(k) => groups.entry(k.to_string()).or_default(),
            None => missing.get_or_insert((0, 0)),
        };
        slot.0 = slot.0.saturating_add(level2);
        slot.1 = slot.1.saturating_add(dcfc);
    }

    let mut out: Vec<_> = groups
        .into_iter()
        .map(|(k, sums)| (Some(k), sums))
        .chain(missing.map(|sums| (None, sums)))
        .map(|(key, (level2_ports, dcfc_ports))| {
            let ports_total = level2_ports.saturating_add(dcfc_ports);
            PortSummary {
                key,
                level2_ports,
                dcfc_ports,
                ports_total,
                dcfc_share: round4(share(dcfc_ports as f64, ports_total as f64)),
            }
        })
        .collect();

    out.sort_by(|a, b| b.ports_total.cmp(&a.ports_total));
    out
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
