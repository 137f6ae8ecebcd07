use camino::Utf8PathBuf;

use geodata_cache::catalog::{Catalog, DatasetDescriptor};
use geodata_cache::domain::{DataFormat, DatasetRequest, Year};
use geodata_cache::store::Store;

#[test]
fn layout_paths() {
    let store = Store::new(Utf8PathBuf::from("/srv/project"));

    let descriptor = DatasetDescriptor::new(
        "rail-lines",
        "https://example.test/lines.geojson",
        "north_american_rail_lines.geojson",
        DataFormat::Geojson,
    );
    assert_eq!(
        store.raw_path(&descriptor),
        Utf8PathBuf::from("/srv/project/data_raw/north_american_rail_lines.geojson")
    );

    let request: DatasetRequest = "tiger-counties:2021".parse().unwrap();
    let counties = Catalog::resolve(&request, None).unwrap();
    assert!(
        store
            .raw_path(&counties)
            .ends_with("data_raw/census_tiger_county_lines_2021.zip")
    );

    assert!(
        store
            .state_crosswalk_path()
            .ends_with("data_clean/crosswalks/state_fips_crosswalk.csv")
    );
    let year = Year::new(2019).unwrap();
    assert!(
        store
            .county_crosswalk_csv_path(year)
            .ends_with("data_clean/crosswalks/county_fips_crosswalk_2019.csv")
    );
}

#[test]
fn atomic_write_replaces_content() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let store = Store::new(root);
    let path = store.output_dir().join("notes.txt");

    Store::write_bytes_atomic(&path, b"first").unwrap();
    Store::write_bytes_atomic(&path, b"second").unwrap();

    assert!(store.exists(&path));
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"second");
    let entries = std::fs::read_dir(store.output_dir().as_std_path())
        .unwrap()
        .count();
    assert_eq!(entries, 1);
}
