//! County reference data and the zip→county crosswalk.
//!
//! The FIPS→name table is the single source of county spelling for both the
//! FIPS-keyed crosswalk join and the name-keyed demand join.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{DataIssue, IssueTally, PipelineError};
use crate::table::{RawTable, cell};

/// The 58 California counties, keyed by five-digit county FIPS code.
pub const COUNTY_FIPS: [(&str, &str); 58] = [
    ("06001", "Alameda"),
    ("06003", "Alpine"),
    ("06005", "Amador"),
    ("06007", "Butte"),
    ("06009", "Calaveras"),
    ("06011", "Colusa"),
    ("06013", "Contra Costa"),
    ("06015", "Del Norte"),
    ("06017", "El Dorado"),
    ("06019", "Fresno"),
    ("06021", "Glenn"),
    ("06023", "Humboldt"),
    ("06025", "Imperial"),
    ("06027", "Inyo"),
    ("06029", "Kern"),
    ("06031", "Kings"),
    ("06033", "Lake"),
    ("06035", "Lassen"),
    ("06037", "Los Angeles"),
    ("06039", "Madera"),
    ("06041", "Marin"),
    ("06043", "Mariposa"),
    ("06045", "Mendocino"),
    ("06047", "Merced"),
    ("06049", "Modoc"),
    ("06051", "Mono"),
    ("06053", "Monterey"),
    ("06055", "Napa"),
    ("06057", "Nevada"),
    ("06059", "Orange"),
    ("06061", "Placer"),
    ("06063", "Plumas"),
    ("06065", "Riverside"),
    ("06067", "Sacramento"),
    ("06069", "San Benito"),
    ("06071", "San Bernardino"),
    ("06073", "San Diego"),
    ("06075", "San Francisco"),
    ("06077", "San Joaquin"),
    ("06079", "San Luis Obispo"),
    ("06081", "San Mateo"),
    ("06083", "Santa Barbara"),
    ("06085", "Santa Clara"),
    ("06087", "Santa Cruz"),
    ("06089", "Shasta"),
    ("06091", "Sierra"),
    ("06093", "Siskiyou"),
    ("06095", "Solano"),
    ("06097", "Sonoma"),
    ("06099", "Stanislaus"),
    ("06101", "Sutter"),
    ("06103", "Tehama"),
    ("06105", "Trinity"),
    ("06107", "Tulare"),
    ("06109", "Tuolumne"),
    ("06111", "Ventura"),
    ("06113", "Yolo"),
    ("06115", "Yuba"),
];

/// Maps a county FIPS code to its canonical name.
#[must_use]
pub fn county_name(fips: &str) -> Option<&'static str> {
    let fips = normalize_code(fips)?;
    COUNTY_FIPS
        .iter()
        .find(|(code, _)| *code == fips)
        .map(|(_, name)| *name)
}

/// Join key for name-based matching: trimmed and lower-cased.
#[must_use]
pub fn county_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolves a free-form county name to its canonical spelling, if it is one
/// of the 58.
#[must_use]
pub fn canonical_county(name: &str) -> Option<&'static str> {
    let key = county_key(name);
    COUNTY_FIPS
        .iter()
        .find(|(_, n)| n.to_lowercase() == key)
        .map(|(_, n)| *n)
}

/// Canonicalizes a zip or FIPS code: trims, drops a `-NNNN` suffix and
/// left-pads short numeric codes to five digits.
#[must_use]
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().split('-').next().unwrap_or("").trim();
    if code.is_empty() {
        return None;
    }
    if code.len() < 5 && code.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{code:0>5}"))
    } else {
        Some(code.to_string())
    }
}

/// Zip→county lookup. Each zip maps to one county; the first row wins.
#[derive(Debug, Default, Clone)]
pub struct Crosswalk {
    by_zip: HashMap<String, &'static str>,
}

impl Crosswalk {
    pub fn read(path: &Path, issues: &mut IssueTally) -> Result<Self, PipelineError> {
        let table = RawTable::read(path, issues)?.normalize_headers();
        Self::from_table(&table, issues)
    }

    /// Builds the lookup from a `(zip, county_fips)` table. Rows whose FIPS
    /// code is not one of the 58 counties are skipped.
    pub fn from_table(table: &RawTable, issues: &mut IssueTally) -> Result<Self, PipelineError> {
        let cols = table.require(&["zip", "county_fips"])?;
        let (zip_idx, fips_idx) = (Some(cols[0]), Some(cols[1]));

        let mut by_zip = HashMap::new();
        for row in table.rows() {
            let Some(zip) = cell(row, zip_idx).and_then(normalize_code) else {
                issues.record(DataIssue::UnmappableRecord);
                continue;
            };
            let Some(county) = cell(row, fips_idx).and_then(county_name) else {
                debug!(zip = %zip, "Crosswalk row has no canonical county");
                issues.record(DataIssue::UnmappableRecord);
                continue;
            };
            match by_zip.entry(zip) {
                Entry::Vacant(slot) => {
                    slot.insert(county);
                }
                Entry::Occupied(_) => issues.record(DataIssue::DuplicateRecord),
            }
        }

        info!(zips = by_zip.len(), "Crosswalk loaded");
        Ok(Self { by_zip })
    }

    /// Canonical county for a zip, if the zip is present.
    pub fn resolve(&self, zip: Option<&str>) -> Option<&'static str> {
        let zip = normalize_code(zip?)?;
        self.by_zip.get(&zip).copied()
    }
}

#[cfg(test)]
impl Crosswalk {
    pub(crate) fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut by_zip = HashMap::new();
        for (zip, fips) in pairs {
            if let (Some(zip), Some(county)) = (normalize_code(zip), county_name(fips)) {
                by_zip.entry(zip).or_insert(county);
            }
        }
        Self { by_zip }
    }

    pub(crate) fn len(&self) -> usize {
        self.by_zip.len()
    }
}
