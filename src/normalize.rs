//! Station normalization.
//!
//! Turns a raw AFDC station dump into the canonical station table and expands
//! stations into one row per physical port.

use csv::StringRecord;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{DataIssue, IssueTally, PipelineError};
use crate::reference::normalize_code;
use crate::table::{RawTable, cell, parse_count, parse_float};

/// Raw columns that cannot be synthesized as missing.
pub const REQUIRED_RAW_COLUMNS: [&str; 3] = ["id", "latitude", "longitude"];
/// Largest per-station port count accepted; larger values are coerced to 0.
pub const MAX_STATION_PORTS: u64 = 10_000;

/// One physical charging location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: Option<String>,
    pub station_name: Option<String>,
    pub status_code: Option<String>,
    pub network: Option<String>,
    pub network_web: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub connector_types: String,
    pub access_hours: Option<String>,
    pub facility_type: Option<String>,
    pub phone: Option<String>,
    /// County if known, otherwise city.
    pub region: Option<String>,
}

impl Station {
    pub const HEADER: [&'static str; 18] = [
        "id",
        "station_name",
        "status_code",
        "network",
        "network_web",
        "city",
        "county",
        "state",
        "zip",
        "latitude",
        "longitude",
        "level2_ports",
        "dcfc_ports",
        "connector_types",
        "access_hours",
        "facility_type",
        "phone",
        "region",
    ];

    pub fn total_ports(&self) -> u64 {
        self.level2_ports.saturating_add(self.dcfc_ports)
    }

    /// Lazily yields one [`PortRecord`] per physical port: Level 2 ports
    /// first, then DC fast ports. Restart by calling again.
    pub fn ports(&self) -> impl Iterator<Item = PortRecord<'_>> + Clone {
        let level2 = (0..self.level2_ports).map(move |_| PortRecord::new(self, PortLevel::Level2));
        let dcfc = (0..self.dcfc_ports).map(move |_| PortRecord::new(self, PortLevel::Dcfc));
        level2.chain(dcfc)
    }
}

/// Charger power class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortLevel {
    Level2,
    #[serde(rename = "DCFC")]
    Dcfc,
}

/// A single port, borrowed from its station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortRecord<'a> {
    pub station_id: Option<&'a str>,
    pub level: PortLevel,
    pub network: Option<&'a str>,
    pub county: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub latitude: f64,
    pub longitude: f64,
}

impl<'a> PortRecord<'a> {
    pub const HEADER: [&'static str; 8] = [
        "station_id",
        "level",
        "network",
        "county",
        "city",
        "state",
        "latitude",
        "longitude",
    ];

    fn new(station: &'a Station, level: PortLevel) -> Self {
        Self {
            station_id: station.id.as_deref(),
            level,
            network: station.network.as_deref(),
            county: station.county.as_deref(),
            city: station.city.as_deref(),
            state: station.state.as_deref(),
            latitude: station.latitude,
            longitude: station.longitude,
        }
    }
}

/// Title-cases like a word-wise capitalizer: the first letter after any
/// non-letter is upper-cased, every other letter lower-cased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Canonical county spelling: trimmed, `" County"` suffix removed
/// (case-insensitive), title-cased. Blank input is missing.
pub fn normalize_county(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let base = match trimmed.len().checked_sub(" county".len()) {
        Some(cut)
            if trimmed.is_char_boundary(cut)
                && trimmed[cut..].eq_ignore_ascii_case(" county") =>
        {
            &trimmed[..cut]
        }
        _ => trimmed,
    };
    let base = base.trim();
    (!base.is_empty()).then(|| title_case(base))
}

/// Title-cased, trimmed text; blank is missing.
pub fn normalize_place(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| title_case(trimmed))
}

/// Flattens a connector list such as `J1772 CHADEMO`, `J1772,TESLA` or
/// `['J1772', 'CHADEMO']` into `j1772,chademo`.
pub fn normalize_connectors(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    raw.split(|c: char| c == ',' || c.is_whitespace() || "[]'\"".contains(c))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(",")
}

/// Column positions in the raw dump. Optional columns may be absent.
struct RawColumns {
    id: Option<usize>,
    station_name: Option<usize>,
    status_code: Option<usize>,
    network: Option<usize>,
    network_web: Option<usize>,
    city: Option<usize>,
    county: Option<usize>,
    state: Option<usize>,
    zip: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    level2: Option<usize>,
    dcfc: Option<usize>,
    connectors: Option<usize>,
    access_hours: Option<usize>,
    facility_type: Option<usize>,
    phone: Option<usize>,
}

impl RawColumns {
    fn locate(table: &RawTable) -> Result<Self, PipelineError> {
        table.require(&REQUIRED_RAW_COLUMNS)?;
        Ok(Self {
            id: table.column("id"),
            station_name: table.column("station_name"),
            status_code: table.column("status_code"),
            network: table.column("ev_network"),
            network_web: table.column("ev_network_web"),
            city: table.column("city"),
            county: table.column("county"),
            state: table.column("state"),
            zip: table.column("zip"),
            latitude: table.column("latitude"),
            longitude: table.column("longitude"),
            level2: table.column("ev_level2_evse_num"),
            dcfc: table.column("ev_dc_fast_num"),
            connectors: table.column("ev_connector_types"),
            access_hours: table.column("access_days_time"),
            facility_type: table.column("facility_type"),
            phone: table.column("station_phone"),
        })
    }
}

/// Cleans a raw station dump into canonical stations.
///
/// Rows without both coordinates are dropped. Port counts that are missing,
/// not numeric or implausibly large become 0. A repeated station id keeps its
/// first row; rows without an id are kept and never treated as duplicates.
///
/// # Errors
///
/// Returns [`PipelineError::Schema`] if `id`, `latitude` or `longitude` is absent.
pub fn clean_stations(
    table: &RawTable,
    issues: &mut IssueTally,
) -> Result<Vec<Station>, PipelineError> {
    let cols = RawColumns::locate(table)?;
    let owned = |row: &StringRecord, idx: Option<usize>| cell(row, idx).map(str::to_string);

    let mut seen = HashSet::new();
    let mut stations = Vec::with_capacity(table.len());

    for row in table.rows() {
        let id = cell(row, cols.id);

        let latitude = parse_float(cell(row, cols.latitude), issues);
        let longitude = parse_float(cell(row, cols.longitude), issues);
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            debug!(id = ?id, "Station without coordinates dropped");
            issues.record(DataIssue::UnmappableRecord);
            continue;
        };

        if id.is_some_and(|id| !seen.insert(id.to_string())) {
            debug!(id = ?id, "Duplicate station id skipped");
            issues.record(DataIssue::DuplicateRecord);
            continue;
        }

        let county = cell(row, cols.county).and_then(normalize_county);
        let city = cell(row, cols.city).and_then(normalize_place);
        let region = county.clone().or_else(|| city.clone());

        stations.push(Station {
            id: id.map(str::to_string),
            station_name: owned(row, cols.station_name),
            status_code: owned(row, cols.status_code),
            network: owned(row, cols.network),
            network_web: owned(row, cols.network_web),
            city,
            county,
            state: owned(row, cols.state),
            zip: cell(row, cols.zip).and_then(normalize_code),
            latitude,
            longitude,
            level2_ports: parse_count(cell(row, cols.level2), MAX_STATION_PORTS, issues),
            dcfc_ports: parse_count(cell(row, cols.dcfc), MAX_STATION_PORTS, issues),
            connector_types: normalize_connectors(cell(row, cols.connectors)),
            access_hours: owned(row, cols.access_hours),
            facility_type: owned(row, cols.facility_type),
            phone: owned(row, cols.phone),
            region,
        });
    }

    info!(
        rows_in = table.len(),
        stations = stations.len(),
        "Stations normalized"
    );
    Ok(stations)
}

/// A canonical station read back from the persisted station table by a
/// downstream stage. Only the fields later stages use are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRow {
    pub id: Option<String>,
    pub station_name: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub network: Option<String>,
}

impl StationRow {
    pub fn total_ports(&self) -> u64 {
        self.level2_ports.saturating_add(self.dcfc_ports)
    }
}

/// Reads canonical station rows, failing if any of `required` is absent.
/// Other columns read as missing when absent.
pub fn read_station_rows(
    table: &RawTable,
    required: &[&str],
    issues: &mut IssueTally,
) -> Result<Vec<StationRow>, PipelineError> {
    table.require(required)?;
    let col = |name| table.column(name);
    let (id, name, city, county, state, zip) = (
        col("id"),
        col("station_name"),
        col("city"),
        col("county"),
        col("state"),
        col("zip"),
    );
    let (lat, lon, level2, dcfc, network) = (
        col("latitude"),
        col("longitude"),
        col("level2_ports"),
        col("dcfc_ports"),
        col("network"),
    );
    let owned = |row: &StringRecord, idx: Option<usize>| cell(row, idx).map(str::to_string);

    let rows = table
        .rows()
        .map(|row| StationRow {
            id: owned(row, id),
            station_name: owned(row, name),
            city: owned(row, city),
            county: owned(row, county),
            state: owned(row, state),
            zip: cell(row, zip).and_then(normalize_code),
            latitude: parse_float(cell(row, lat), issues),
            longitude: parse_float(cell(row, lon), issues),
            level2_ports: parse_count(cell(row, level2), MAX_STATION_PORTS, issues),
            dcfc_ports: parse_count(cell(row, dcfc), MAX_STATION_PORTS, issues),
            network: owned(row, network),
        })
        .collect();
    Ok(rows)
}
