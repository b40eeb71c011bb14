//! Coverage ratios, normalization and the county siting score.

use serde::Serialize;

use crate::demand::CountyJoinedRecord;

/// Siting-score weight on the coverage gap term.
pub const COVERAGE_GAP_WEIGHT: f64 = 0.6;
/// Siting-score weight on the EV demand term.
pub const DEMAND_WEIGHT: f64 = 0.4;

/// `part / whole`, or 0 when `whole` is not positive.
pub fn share(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole } else { 0.0 }
}

/// Min-max scales a series into [0, 1]. A zero-range series scales to all zeros.
pub fn minmax(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range > 0.0 {
        values.iter().map(|v| (v - min) / range).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// One county's demand, supply and derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyAnalyticsRecord {
    pub county: String,
    pub level2_ports: u64,
    pub dcfc_ports: u64,
    pub ports_total: u64,
    pub ev_count: u64,
    pub ports_per_1000_evs: f64,
    pub dcfc_share: f64,
    pub siting_score: f64,
}

impl CountyAnalyticsRecord {
    pub const HEADER: [&'static str; 8] = [
        "county",
        "level2_ports",
        "dcfc_ports",
        "ports_total",
        "ev_count",
        "ports_per_1000_evs",
        "dcfc_share",
        "siting_score",
    ];
}

/// Adds coverage ratios and the siting score.
///
/// `siting_score = 0.6 * (1 - minmax(ports_per_1000_evs)) + 0.4 * minmax(ev_count)`,
/// each term normalized against its own column.
pub fn compute_metrics(joined: &[CountyJoinedRecord]) -> Vec<CountyAnalyticsRecord> {
    let coverage: Vec<f64> = joined
        .iter()
        .map(|j| 1000.0 * share(j.ports_total as f64, j.ev_count as f64))
        .collect();
    let ev_counts: Vec<f64> = joined.iter().map(|j| j.ev_count as f64).collect();

    let norm_coverage = minmax(&coverage);
    let norm_demand = minmax(&ev_counts);

    joined
        .iter()
        .enumerate()
        .map(|(i, j)| CountyAnalyticsRecord {
            county: j.county.clone(),
            level2_ports: j.level2_ports,
            dcfc_ports: j.dcfc_ports,
            ports_total: j.ports_total,
            ev_count: j.ev_count,
            ports_per_1000_evs: coverage[i],
            dcfc_share: share(j.dcfc_ports as f64, j.ports_total as f64),
            siting_score: COVERAGE_GAP_WEIGHT * (1.0 - norm_coverage[i])
                + DEMAND_WEIGHT * norm_demand[i],
        })
        .collect()
}

/// The `n` highest siting scores; ties keep input order.
pub fn top_by_siting(records: &[CountyAnalyticsRecord], n: usize) -> Vec<CountyAnalyticsRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.siting_score.total_cmp(&a.siting_score));
    sorted.truncate(n);
    sorted
}
