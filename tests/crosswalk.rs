use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use geodata_cache::crosswalk::{CountyCrosswalk, StateCrosswalk, county_fips_for_name};
use geodata_cache::error::GeodataError;
use geodata_cache::frame::{Cell, Frame};

fn text(values: &[&str]) -> Vec<Cell> {
    values
        .iter()
        .map(|value| Cell::Text(value.to_string()))
        .collect()
}

fn states_frame() -> Frame {
    Frame::from_cells(
        vec![
            ("STATEFP".to_string(), text(&["36", "06", "02"])),
            ("STUSPS".to_string(), text(&["NY", "CA", "AK"])),
        ],
        None,
        None,
    )
    .unwrap()
}

fn counties_frame() -> Frame {
    Frame::from_cells(
        vec![
            ("STATEFP".to_string(), text(&["06", "06", "36"])),
            ("COUNTYFP".to_string(), text(&["037", "001", "061"])),
            ("NAME".to_string(), text(&["Los Angeles", "Alameda", "New York"])),
        ],
        None,
        None,
    )
    .unwrap()
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

#[test]
fn state_crosswalk_round_trip_keeps_leading_zeros() {
    let (_dir, root) = temp_root();
    let path = root.join("crosswalks/state_fips_crosswalk.csv");

    let derived = StateCrosswalk::load_or_derive(&path, || Ok(states_frame())).unwrap();
    let reloaded = StateCrosswalk::load(&path).unwrap();

    assert_eq!(derived, reloaded);
    let pairs = reloaded
        .rows()
        .iter()
        .map(|row| (row.fips.as_str(), row.abbrev.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(pairs, vec![("02", "AK"), ("06", "CA"), ("36", "NY")]);
}

#[test]
fn persisted_crosswalk_is_not_derived_again() {
    let (_dir, root) = temp_root();
    let csv_path = root.join("county.csv");
    let parquet_path = root.join("county.parquet");
    CountyCrosswalk::load_or_derive(&csv_path, &parquet_path, || Ok(counties_frame())).unwrap();

    let loaded = CountyCrosswalk::load_or_derive(&csv_path, &parquet_path, || {
        Err(GeodataError::Http("should not download".to_string()))
    })
    .unwrap();

    assert_eq!(loaded.rows().len(), 3);
    assert_eq!(loaded.rows()[0].county_fips, "001");
}

#[test]
fn parquet_copy_is_used_when_csv_is_missing() {
    let (_dir, root) = temp_root();
    let csv_path = root.join("county.csv");
    let parquet_path = root.join("county.parquet");
    CountyCrosswalk::derive(&counties_frame())
        .unwrap()
        .persist(&csv_path, &parquet_path)
        .unwrap();
    std::fs::remove_file(csv_path.as_std_path()).unwrap();

    let loaded = CountyCrosswalk::load_or_derive(&csv_path, &parquet_path, || {
        Err(GeodataError::Http("should not download".to_string()))
    })
    .unwrap();

    assert_eq!(loaded.rows()[1].name, "Los Angeles");
    assert!(!csv_path.as_std_path().exists());
}

#[test]
fn unknown_keys_fail() {
    let states = StateCrosswalk::derive(&states_frame()).unwrap();
    let counties = CountyCrosswalk::derive(&counties_frame()).unwrap();

    assert_matches!(
        county_fips_for_name(&states, &counties, "ZZ", "Los Angeles"),
        Err(GeodataError::UnknownState(_))
    );
    let err = county_fips_for_name(&states, &counties, "CA", "Nonexistent County").unwrap_err();
    assert_matches!(err, GeodataError::CountyNotFound { state, name } => {
        assert_eq!(state, "CA");
        assert_eq!(name, "Nonexistent County");
    });
    assert_eq!(
        county_fips_for_name(&states, &counties, "CA", "Los Angeles").unwrap(),
        "037"
    );
}
