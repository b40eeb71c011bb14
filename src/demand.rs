//! EV-registration demand and its join with county port supply.

use std::collections::HashMap;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::aggregate::CountySupplyRecord;
use crate::error::{DataIssue, IssueTally, PipelineError};
use crate::reference::{canonical_county, county_key};
use crate::table::{RawTable, cell, parse_count};

/// Largest registration count accepted for one county.
pub const MAX_EV_COUNT: u64 = 100_000_000;

/// Registered EVs in one canonical county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyDemandRecord {
    /// County spelling as given by the demand source, trimmed.
    pub county: String,
    pub ev_count: u64,
}

/// Demand with supply attached. Counties without mapped stations carry zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyJoinedRecord {
    pub county: String,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub ports_total: u64,
    pub ev_count: u64,
}

/// Reads the `(county, ev_count)` table, keeping only canonical counties.
///
/// Headers are matched after trimming and lower-casing. Rows naming a county
/// outside the canonical set are dropped and counted; a county that appears
/// twice keeps its first row. Non-numeric counts read as 0.
///
/// # Errors
///
/// Returns [`PipelineError::Schema`] if `county` or `ev_count` is absent.
pub fn load_demand(
    table: RawTable,
    issues: &mut IssueTally,
) -> Result<Vec<CountyDemandRecord>, PipelineError> {
    let table = table.normalize_headers();
    let cols = table.require(&["county", "ev_count"])?;
    let (county_idx, count_idx) = (Some(cols[0]), Some(cols[1]));

    let mut seen = HashSet::new();
    let mut dropped = 0usize;
    let mut demand = Vec::new();

    for row in table.rows() {
        let name = cell(row, county_idx).unwrap_or("");
        let Some(canonical) = canonical_county(name) else {
            debug!(county = name, "Non-canonical county dropped");
            issues.record(DataIssue::NonCanonicalCounty);
            dropped += 1;
            continue;
        };
        if !seen.insert(canonical) {
            issues.record(DataIssue::DuplicateRecord);
            continue;
        }
        demand.push(CountyDemandRecord {
            county: name.to_string(),
            ev_count: parse_count(cell(row, count_idx), MAX_EV_COUNT, issues),
        });
    }

    if dropped > 0 {
        warn!(dropped, "Demand rows outside the canonical county set dropped");
    }
    info!(counties = demand.len(), "County demand loaded");
    Ok(demand)
}

/// Left-joins supply onto demand by lower-cased county name.
///
/// Every demand county appears once, in demand order. Supply for counties
/// absent from the demand table is discarded.
pub fn join_supply(
    demand: &[CountyDemandRecord],
    supply: &[CountySupplyRecord],
) -> Vec<CountyJoinedRecord> {
    let by_key: HashMap<String, &CountySupplyRecord> =
        supply.iter().map(|s| (county_key(&s.county), s)).collect();

    let joined: Vec<_> = demand
        .iter()
        .map(|d| {
            let s = by_key.get(&county_key(&d.county));
            CountyJoinedRecord {
                county: d.county.clone(),
                level2_ports: s.map_or(0, |s| s.level2_ports),
                dcfc_ports: s.map_or(0, |s| s.dcfc_ports),
                ports_total: s.map_or(0, |s| s.ports_total),
                ev_count: d.ev_count,
            }
        })
        .collect();

    let demand_keys: HashSet<_> = demand.iter().map(|d| county_key(&d.county)).collect();
    let unmatched = by_key.keys().filter(|k| !demand_keys.contains(*k)).count();
    if unmatched > 0 {
        info!(unmatched, "Supply counties without demand left out");
    }

    joined
}
