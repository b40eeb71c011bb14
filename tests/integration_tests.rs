use ev_siting::config::PipelineConfig;
use ev_siting::error::{DataIssue, PipelineError};
use ev_siting::pipeline;
use ev_siting::reference::COUNTY_FIPS;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const RAW_STATIONS: &str = "\
id,station_name,status_code,ev_network,ev_network_web,city,county,state,zip,latitude,longitude,ev_dc_fast_num,ev_level2_evse_num,ev_connector_types,access_days_time,facility_type,station_phone
1,Mission Garage,E,ChargePoint,,san francisco,San Francisco County,CA,94105,37.79,-122.39,0,4,J1772,24 hours,PARKING_GARAGE,
2,Dogpatch Lot,E,Blink,,san francisco,san francisco,CA,94107,37.76,-122.39,,10,J1772,,,
3,Union Station,E,EVgo,,los angeles,Los Angeles County,CA,90012,34.05,-118.23,8,40,J1772 CHADEMO,,,
4,Chinatown Plaza,E,EVgo,,los angeles,los angeles,CA,90012,34.06,-118.24,1,11,J1772,,,
5,Markleeville Inn,E,,,markleeville,alpine,CA,96120,38.69,-119.78,0,10,J1772,,,
6,Ghost Station,E,,,sacramento,sacramento,CA,95814,,,2,2,,,,
7,Fresno Depot,E,,,fresno,,CA,99999,36.74,-119.78,2,6,,,,
8,Marysville Stop,E,,,marysville,yuba,CA,95901,39.15,-121.59,0,2,,,,
9,Bakersfield Hub,E,,,bakersfield,kern,CA,93301,35.37,-119.02,6,34,,,,
10,Nowhere,E,,,,,CA,,36.0,-120.0,1,1,,,,
";

const CROSSWALK: &str = "\
zip,county_fips
94105,06075
94107,06075
90012,06037
96120,06003
95901,06115
";

const EV_COUNTS: &str = "\
County,EV_Count
San Francisco,5000
Los Angeles,20000
Alpine,0
Napa,1000
Gotham,10
";

struct Fixture {
    dir: PathBuf,
    cfg: PipelineConfig,
}

impl Fixture {
    fn new(name: &str, ev_counts: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "ev_siting_it_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let cfg = PipelineConfig::new(&dir);

        write(&cfg.raw_stations(), RAW_STATIONS);
        write(&cfg.zip_crosswalk(), CROSSWALK);
        write(&cfg.ev_counts(), ev_counts);

        Self { dir, cfg }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read_rows(path: &Path) -> Vec<HashMap<String, String>> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    rdr.records()
        .map(|r| {
            let r = r.unwrap();
            headers
                .iter()
                .zip(r.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

fn num(row: &HashMap<String, String>, col: &str) -> f64 {
    row[col].parse().unwrap()
}

fn by_county(rows: &[HashMap<String, String>]) -> HashMap<String, HashMap<String, String>> {
    rows.iter()
        .map(|r| (r["county"].clone(), r.clone()))
        .collect()
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.clone(), fs::read(&path).unwrap());
            }
        }
    }
    out
}

#[test]
fn test_full_pipeline() {
    let fx = Fixture::new("full", EV_COUNTS);
    let summaries = pipeline::run_all(&fx.cfg).unwrap();
    assert_eq!(summaries.len(), 5);

    // station 6 has no coordinates
    let stations = read_rows(&fx.cfg.stations());
    assert_eq!(stations.len(), 9);
    assert!(stations.iter().all(|s| s["id"] != "6"));
    assert_eq!(stations[0]["county"], "San Francisco");
    assert_eq!(stations[0]["connector_types"], "j1772");
    assert_eq!(stations[2]["connector_types"], "j1772,chademo");

    let ports = read_rows(&fx.cfg.ports());
    assert_eq!(ports.len(), 136);
    assert_eq!(ports.iter().filter(|p| p["level"] == "DCFC").count(), 18);
}

#[test]
fn test_county_analytics_is_demand_anchored() {
    let fx = Fixture::new("anchored", EV_COUNTS);
    pipeline::clean_stations(&fx.cfg).unwrap();
    let summary = pipeline::county_supply(&fx.cfg).unwrap();

    let rows = read_rows(&fx.cfg.county_analytics());
    // Gotham is not canonical; Yuba has stations but no demand row.
    assert_eq!(rows.len(), 4);
    assert_eq!(summary.rows_for("ev_county_supply_vs_demand.csv"), Some(4));

    let counties = by_county(&rows);
    assert!(!counties.contains_key("Yuba"));
    assert!(!counties.contains_key("Gotham"));

    let sf = &counties["San Francisco"];
    assert_eq!(num(sf, "level2_ports"), 14.0);
    assert_eq!(num(sf, "dcfc_ports"), 0.0);
    assert_eq!(num(sf, "ports_total"), 14.0);

    let alpine = &counties["Alpine"];
    assert_eq!(num(alpine, "ports_total"), 10.0);
    assert_eq!(num(alpine, "ports_per_1000_evs"), 0.0);

    let napa = &counties["Napa"];
    assert_eq!(num(napa, "ports_total"), 0.0);
    assert_eq!(num(napa, "dcfc_share"), 0.0);

    for row in &rows {
        let share = num(row, "dcfc_share");
        let score = num(row, "siting_score");
        assert!((0.0..=1.0).contains(&share));
        assert!((0.0..=1.0).contains(&score));
    }

    let top = read_rows(&fx.cfg.siting_top10());
    assert_eq!(top.len(), 4);
    let scores: Vec<f64> = top.iter().map(|r| num(r, "siting_score")).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_station_busy_ranking() {
    let fx = Fixture::new("busy", EV_COUNTS);
    pipeline::clean_stations(&fx.cfg).unwrap();
    pipeline::station_busy(&fx.cfg).unwrap();

    let busy = read_rows(&fx.cfg.station_busy());
    assert_eq!(busy.len(), 9);
    assert_eq!(busy[0]["station_name"], "Union Station");
    assert_eq!(num(&busy[0], "likely_busy_score"), 22.0);
    assert_eq!(busy[0]["county"], "Los Angeles");

    let fresno = busy.iter().find(|b| b["station_name"] == "Fresno Depot").unwrap();
    assert_eq!(fresno["county"], "");

    let top = read_rows(&fx.cfg.station_busy_top25());
    assert_eq!(top.len(), 9);
}

#[test]
fn test_insight_tables() {
    let fx = Fixture::new("insights", EV_COUNTS);
    pipeline::run_all(&fx.cfg).unwrap();

    let top_ports = read_rows(&fx.cfg.insight("top10_ports_total.csv"));
    assert_eq!(top_ports[0]["county"], "Los Angeles");
    assert_eq!(num(&top_ports[0], "ports_total"), 60.0);
    // stations without a county form their own group
    assert!(top_ports.iter().any(|r| r["county"].is_empty()));

    let lagging = read_rows(&fx.cfg.insight("opportunity_regions_low_dcfc_share_high_ports.csv"));
    let regions: Vec<_> = lagging.iter().map(|r| r["region"].as_str()).collect();
    // Los Angeles: 60 ports at 0.15; Kern: 40 ports at 0.15 misses the gate.
    assert_eq!(regions, vec!["Los Angeles"]);

    let zero_dcfc = read_rows(&fx.cfg.insight("opportunity_regions_zero_dcfc_sorted_by_level2.csv"));
    let regions: Vec<_> = zero_dcfc.iter().map(|r| r["region"].as_str()).collect();
    assert_eq!(regions, vec!["San Francisco", "Alpine", "Yuba"]);

    let heavy = read_rows(&fx.cfg.insight("opportunity_stations_level2_no_dcfc_8plus.csv"));
    let ids: Vec<_> = heavy.iter().map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, vec!["2", "5"]);

    let by_dcfc = read_rows(&fx.cfg.insight("likely_busy_top_stations_by_dcfc_ports.csv"));
    assert_eq!(by_dcfc[0]["id"], "3");
    assert!(by_dcfc.iter().all(|r| num(r, "dcfc_ports") > 0.0));
}

#[test]
fn test_pipeline_is_idempotent() {
    let fx = Fixture::new("idempotent", EV_COUNTS);
    let processed = fx.cfg.processed_dir();

    pipeline::run_all(&fx.cfg).unwrap();
    let first = snapshot(&processed);
    pipeline::run_all(&fx.cfg).unwrap();
    let second = snapshot(&processed);

    assert_eq!(first.len(), 17);
    assert_eq!(first, second);
}

#[test]
fn test_missing_demand_column_is_a_schema_error() {
    let fx = Fixture::new("schema", "county,registrations\nAlpine,3\n");
    pipeline::clean_stations(&fx.cfg).unwrap();

    let err = pipeline::county_supply(&fx.cfg).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Schema { missing, .. }) => assert_eq!(missing, &vec!["ev_count"]),
        other => panic!("expected schema error, got {other:?}"),
    }
    assert!(!fx.cfg.county_analytics().exists());
}

#[test]
fn test_fips_and_name_joins_agree_for_every_county() {
    let fx = Fixture::new("crosscheck", EV_COUNTS);

    let mut stations = String::from("id,zip,latitude,longitude,ev_level2_evse_num,ev_dc_fast_num\n");
    let mut crosswalk = String::from("zip,county_fips\n");
    let mut demand = String::from("county,ev_count\n");
    for (i, (fips, name)) in COUNTY_FIPS.iter().enumerate() {
        let zip = format!("{:05}", 90000 + i);
        stations.push_str(&format!("{i},{zip},37.0,-120.0,1,0\n"));
        crosswalk.push_str(&format!("{zip},{fips}\n"));
        demand.push_str(&format!("{},100\n", name.to_uppercase()));
    }
    write(&fx.cfg.raw_stations(), &stations);
    write(&fx.cfg.zip_crosswalk(), &crosswalk);
    write(&fx.cfg.ev_counts(), &demand);

    pipeline::clean_stations(&fx.cfg).unwrap();
    pipeline::county_supply(&fx.cfg).unwrap();

    let rows = read_rows(&fx.cfg.county_analytics());
    assert_eq!(rows.len(), 58);
    assert!(rows.iter().all(|r| num(r, "ports_total") == 1.0));
}

#[test]
fn test_invalid_utf8_cell_does_not_abort_clean_stations() {
    let fx = Fixture::new("latin1", EV_COUNTS);
    fs::write(
        fx.cfg.raw_stations(),
        b"id,station_name,latitude,longitude,ev_level2_evse_num\n1,Caf\xE9,37.0,-120.0,4\n2,Depot,36.0,-119.0,2\n",
    )
    .unwrap();

    let summary = pipeline::clean_stations(&fx.cfg).unwrap();
    assert_eq!(summary.rows_for("stations_ca.csv"), Some(2));
    assert_eq!(summary.rows_for("ports_ca.csv"), Some(6));
    assert_eq!(summary.issues.count(DataIssue::ValueCoercion), 1);

    let stations = read_rows(&fx.cfg.stations());
    assert_eq!(stations[0]["station_name"], "Caf\u{FFFD}");
}
