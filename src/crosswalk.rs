//! State and county FIPS crosswalks.
//!
//! Both tables are derived once from TIGER boundary frames, persisted under
//! `data_clean/crosswalks/`, and loaded from disk on every later use.

use std::fs::File;

use arrow::array::BooleanArray;
use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::StateAbbrev;
use crate::error::GeodataError;
use crate::frame::Frame;
use crate::store::Store;

pub const STATE_FIPS: &str = "STATE_FIPS";
pub const STATE_ABRV: &str = "STATE_ABRV";
pub const STATEFP: &str = "STATEFP";
pub const COUNTYFP: &str = "COUNTYFP";
pub const NAME: &str = "NAME";
/// TIGER state file column holding the USPS abbreviation.
pub const STUSPS: &str = "STUSPS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRow {
    pub fips: String,
    pub abbrev: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCrosswalk {
    rows: Vec<StateRow>,
}

impl StateCrosswalk {
    /// Projects a TIGER states frame to (FIPS, abbreviation), keeping the
    /// first row seen for each FIPS code, sorted by FIPS.
    pub fn derive(states: &Frame) -> Result<Self, GeodataError> {
        let fips = states.string_values(STATEFP)?;
        let abbrevs = states.string_values(STUSPS)?;
        Ok(Self::from_pairs(fips, abbrevs))
    }

    fn from_pairs(fips: Vec<Option<String>>, abbrevs: Vec<Option<String>>) -> Self {
        let mut rows: Vec<StateRow> = Vec::with_capacity(fips.len());
        for (fips, abbrev) in fips.into_iter().zip(abbrevs) {
            let (Some(fips), Some(abbrev)) = (fips, abbrev) else {
                continue;
            };
            if rows.iter().any(|row| row.fips == fips) {
                continue;
            }
            rows.push(StateRow { fips, abbrev });
        }
        rows.sort_by(|a, b| a.fips.cmp(&b.fips));
        Self { rows }
    }

    pub fn rows(&self) -> &[StateRow] {
        &self.rows
    }

    pub fn to_frame(&self) -> Result<Frame, GeodataError> {
        Frame::from_string_columns(vec![
            (
                STATE_FIPS,
                self.rows.iter().map(|row| Some(row.fips.clone())).collect(),
            ),
            (
                STATE_ABRV,
                self.rows.iter().map(|row| Some(row.abbrev.clone())).collect(),
            ),
        ])
    }

    pub fn load(path: &Utf8Path) -> Result<Self, GeodataError> {
        let mut file = File::open(path.as_std_path())
            .map_err(|err| GeodataError::Filesystem(format!("open {path}: {err}")))?;
        let frame = Frame::read_csv_as_strings(&mut file)?;
        Ok(Self::from_pairs(
            frame.string_values(STATE_FIPS)?,
            frame.string_values(STATE_ABRV)?,
        ))
    }

    pub fn persist(&self, path: &Utf8Path) -> Result<(), GeodataError> {
        let frame = self.to_frame()?;
        Store::write_atomic(path, |file| frame.write_csv(file))
    }

    /// Loads the persisted table, or derives and persists it from the frame
    /// returned by `states` when nothing is on disk yet.
    pub fn load_or_derive<F>(path: &Utf8Path, states: F) -> Result<Self, GeodataError>
    where
        F: FnOnce() -> Result<Frame, GeodataError>,
    {
        if path.as_std_path().is_file() {
            debug!(path = %path, "loading state crosswalk");
            return Self::load(path);
        }
        let crosswalk = Self::derive(&states()?)?;
        info!(path = %path, rows = crosswalk.rows.len(), "persisting state crosswalk");
        crosswalk.persist(path)?;
        Ok(crosswalk)
    }

    /// Case-insensitive; the abbreviation must name a US state or territory.
    pub fn fips_for_abbrev(&self, abbrev: &str) -> Result<&str, GeodataError> {
        let state: StateAbbrev = abbrev.parse()?;
        self.rows
            .iter()
            .find(|row| row.abbrev.eq_ignore_ascii_case(state.as_str()))
            .map(|row| row.fips.as_str())
            .ok_or_else(|| GeodataError::StateNotFound(state.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountyRow {
    pub state_fips: String,
    pub county_fips: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyCrosswalk {
    rows: Vec<CountyRow>,
}

impl CountyCrosswalk {
    /// Projects a TIGER counties frame to (STATEFP, COUNTYFP, NAME) sorted
    /// by state then county code.
    pub fn derive(counties: &Frame) -> Result<Self, GeodataError> {
        Self::from_frame(counties)
    }

    fn from_frame(frame: &Frame) -> Result<Self, GeodataError> {
        let states = frame.string_values(STATEFP)?;
        let counties = frame.string_values(COUNTYFP)?;
        let names = frame.string_values(NAME)?;
        let mut rows = states
            .into_iter()
            .zip(counties)
            .zip(names)
            .filter_map(|((state_fips, county_fips), name)| {
                Some(CountyRow {
                    state_fips: state_fips?,
                    county_fips: county_fips?,
                    name: name?,
                })
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            (a.state_fips.as_str(), a.county_fips.as_str())
                .cmp(&(b.state_fips.as_str(), b.county_fips.as_str()))
        });
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[CountyRow] {
        &self.rows
    }

    pub fn to_frame(&self) -> Result<Frame, GeodataError> {
        Frame::from_string_columns(vec![
            (
                STATEFP,
                self.rows.iter().map(|row| Some(row.state_fips.clone())).collect(),
            ),
            (
                COUNTYFP,
                self.rows.iter().map(|row| Some(row.county_fips.clone())).collect(),
            ),
            (
                NAME,
                self.rows.iter().map(|row| Some(row.name.clone())).collect(),
            ),
        ])
    }

    pub fn load_csv(path: &Utf8Path) -> Result<Self, GeodataError> {
        let mut file = File::open(path.as_std_path())
            .map_err(|err| GeodataError::Filesystem(format!("open {path}: {err}")))?;
        Self::from_frame(&Frame::read_csv_as_strings(&mut file)?)
    }

    pub fn load_parquet(path: &Utf8Path) -> Result<Self, GeodataError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| GeodataError::Filesystem(format!("open {path}: {err}")))?;
        Self::from_frame(&Frame::read_parquet(file)?)
    }

    pub fn persist(&self, csv_path: &Utf8Path, parquet_path: &Utf8Path) -> Result<(), GeodataError> {
        let frame = self.to_frame()?;
        Store::write_atomic(csv_path, |file| frame.write_csv(file))?;
        Store::write_atomic(parquet_path, |file| frame.write_parquet(file))
    }

    /// Prefers the csv, then the parquet copy; derives from `counties` only
    /// when neither exists. A persisted table is never re-derived.
    pub fn load_or_derive<F>(
        csv_path: &Utf8Path,
        parquet_path: &Utf8Path,
        counties: F,
    ) -> Result<Self, GeodataError>
    where
        F: FnOnce() -> Result<Frame, GeodataError>,
    {
        if csv_path.as_std_path().is_file() {
            debug!(path = %csv_path, "loading county crosswalk");
            return Self::load_csv(csv_path);
        }
        if parquet_path.as_std_path().is_file() {
            debug!(path = %parquet_path, "loading county crosswalk");
            return Self::load_parquet(parquet_path);
        }
        let crosswalk = Self::derive(&counties()?)?;
        info!(path = %csv_path, rows = crosswalk.rows.len(), "persisting county crosswalk");
        crosswalk.persist(csv_path, parquet_path)?;
        Ok(crosswalk)
    }

    /// Rows in `state_fips` whose name equals `name`, ignoring case, in
    /// ascending county code order.
    pub fn matches(&self, state_fips: &str, name: &str) -> Vec<&CountyRow> {
        let wanted = name.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.state_fips == state_fips && row.name.to_lowercase() == wanted)
            .collect()
    }
}

/// Resolves the state, then returns the first county whose name matches.
/// Several matches (Virginia's Richmond county and Richmond city share a
/// NAME) resolve to the lowest county code and log a warning.
pub fn county_fips_for_name(
    states: &StateCrosswalk,
    counties: &CountyCrosswalk,
    state_abbrev: &str,
    county_name: &str,
) -> Result<String, GeodataError> {
    let state_fips = states.fips_for_abbrev(state_abbrev)?;
    let matches = counties.matches(state_fips, county_name);
    let first = matches.first().ok_or_else(|| GeodataError::CountyNotFound {
        state: state_abbrev.trim().to_ascii_uppercase(),
        name: county_name.to_string(),
    })?;
    if matches.len() > 1 {
        warn!(
            state = state_abbrev,
            county = county_name,
            candidates = matches.len(),
            chosen = %first.county_fips,
            "county name is ambiguous; using lowest county code"
        );
    }
    Ok(first.county_fips.clone())
}

/// Rows of a counties frame for one county, matched by state code and
/// case-insensitive name. The result may be empty.
pub fn county_geometry(
    counties: &Frame,
    state_fips: &str,
    county_name: &str,
) -> Result<Frame, GeodataError> {
    let wanted = county_name.trim().to_lowercase();
    let states = counties.string_values(STATEFP)?;
    let names = counties.string_values(NAME)?;
    let mask = states
        .iter()
        .zip(&names)
        .map(|(state, name)| {
            let hit = state.as_deref() == Some(state_fips)
                && name.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str());
            Some(hit)
        })
        .collect::<BooleanArray>();
    counties.filter(&mask)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;
    use crate::frame::Cell;

    fn text(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|value| Cell::Text(value.to_string()))
            .collect()
    }

    fn states_frame() -> Frame {
        Frame::from_cells(
            vec![
                ("STATEFP".to_string(), text(&["36", "06", "06", "72"])),
                ("STUSPS".to_string(), text(&["NY", "CA", "CA", "PR"])),
                ("NAME".to_string(), text(&["New York", "California", "California", "Puerto Rico"])),
            ],
            Some(vec![None, None, None, None]),
            Some("EPSG:4269".to_string()),
        )
        .unwrap()
    }

    fn counties_frame() -> Frame {
        Frame::from_cells(
            vec![
                ("STATEFP".to_string(), text(&["51", "06", "51", "06"])),
                ("COUNTYFP".to_string(), text(&["760", "037", "159", "001"])),
                ("NAME".to_string(), text(&["Richmond", "Los Angeles", "Richmond", "Alameda"])),
            ],
            Some(vec![None, None, None, None]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn state_crosswalk_is_sorted_and_deduplicated() {
        let crosswalk = StateCrosswalk::derive(&states_frame()).unwrap();
        let fips = crosswalk
            .rows()
            .iter()
            .map(|row| row.fips.as_str())
            .collect::<Vec<_>>();
        assert_eq!(fips, vec!["06", "36", "72"]);
    }

    #[test]
    fn state_lookup_ignores_case() {
        let crosswalk = StateCrosswalk::derive(&states_frame()).unwrap();
        assert_eq!(crosswalk.fips_for_abbrev("ca").unwrap(), "06");
        assert_eq!(crosswalk.fips_for_abbrev("CA").unwrap(), "06");
        assert_matches!(
            crosswalk.fips_for_abbrev("ZZ"),
            Err(GeodataError::UnknownState(_))
        );
        assert_matches!(
            crosswalk.fips_for_abbrev("TX"),
            Err(GeodataError::StateNotFound(_))
        );
    }

    #[test]
    fn county_crosswalk_sorts_by_state_then_county() {
        let crosswalk = CountyCrosswalk::derive(&counties_frame()).unwrap();
        let keys = crosswalk
            .rows()
            .iter()
            .map(|row| format!("{}{}", row.state_fips, row.county_fips))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["06001", "06037", "51159", "51760"]);
    }

    #[test]
    fn ambiguous_county_name_takes_lowest_code() {
        let states = StateCrosswalk::from_pairs(
            vec![Some("51".to_string())],
            vec![Some("VA".to_string())],
        );
        let counties = CountyCrosswalk::derive(&counties_frame()).unwrap();
        let fips = county_fips_for_name(&states, &counties, "va", "RICHMOND").unwrap();
        assert_eq!(fips, "159");
    }

    #[test]
    fn county_crosswalk_round_trips_through_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let csv_path = root.join("counties.csv");
        let parquet_path = root.join("counties.parquet");
        let derived = CountyCrosswalk::derive(&counties_frame()).unwrap();
        derived.persist(&csv_path, &parquet_path).unwrap();

        assert_eq!(CountyCrosswalk::load_parquet(&parquet_path).unwrap(), derived);
        assert_eq!(CountyCrosswalk::load_csv(&csv_path).unwrap(), derived);
    }

    #[test]
    fn county_geometry_filters_rows() {
        let frame = counties_frame();
        let hit = county_geometry(&frame, "06", "los ANGELES").unwrap();
        assert_eq!(hit.num_rows(), 1);
        assert!(hit.is_geospatial());
        let miss = county_geometry(&frame, "36", "Los Angeles").unwrap();
        assert_eq!(miss.num_rows(), 0);
    }
}
