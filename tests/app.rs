use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use geodata_cache::app::{App, FetchOptions};
use geodata_cache::cache::CacheAction;
use geodata_cache::catalog::DatasetDescriptor;
use geodata_cache::client::DatasetClient;
use geodata_cache::config::ResolvedConfig;
use geodata_cache::domain::{DataFormat, DatasetKind, DatasetRequest, StateAbbrev, Year};
use geodata_cache::error::GeodataError;
use geodata_cache::output::JsonOutput;
use geodata_cache::store::Store;

const GEOGRAPHY_LOOKUP_URL: &str =
    "https://opendata.fcc.gov/api/views/v5vt-e7vw/rows.csv?accessType=DOWNLOAD&sorting=true";
const PROVIDERS_URL: &str =
    "https://opendata.fcc.gov/api/views/2ra3-4jd4/rows.csv?accessType=DOWNLOAD&sorting=true";

/// Serves canned bodies by URL and records every request.
#[derive(Default)]
struct MockClient {
    bodies: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DatasetClient for MockClient {
    fn download(&self, url: &str, destination: &mut File) -> Result<u64, GeodataError> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self.bodies.get(url).ok_or_else(|| GeodataError::HttpStatus {
            status: 404,
            message: url.to_string(),
        })?;
        destination.write_all(body.as_bytes()).unwrap();
        Ok(body.len() as u64)
    }
}

fn project() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, Store::new(root))
}

fn seed_state_crosswalk(store: &Store) {
    Store::write_bytes_atomic(
        &store.state_crosswalk_path(),
        b"STATE_FIPS,STATE_ABRV\n06,CA\n36,NY\n",
    )
    .unwrap();
}

fn tract_collection(state: &str, tracts: &[&str]) -> String {
    let features = tracts
        .iter()
        .map(|tract| {
            format!(
                r#"{{"type":"Feature","properties":{{"STATE":"{state}","TRACTCE":"{tract}"}},"geometry":{{"type":"Point","coordinates":[0.0,0.0]}}}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(r#"{{"type":"FeatureCollection","features":[{features}]}}"#)
}

#[test]
fn second_fetch_is_a_cache_hit() {
    let (_temp, store) = project();
    let url = GEOGRAPHY_LOOKUP_URL;
    let client = MockClient::default().with_body(url, "LinkID,Name\n1,Alpha\n");
    let app = App::new(store, client);
    let request = DatasetRequest::new(DatasetKind::FccGeographyLookup);

    let first = app
        .fetch(&request, FetchOptions::default(), &JsonOutput)
        .unwrap();
    let second = app
        .fetch(&request, FetchOptions::default(), &JsonOutput)
        .unwrap();

    assert_eq!(first.action, CacheAction::Downloaded);
    assert_eq!(second.action, CacheAction::Hit);
    assert_eq!(first.path, second.path);
    assert!(first.path.ends_with("data_raw/fcc_broadband_geography_lookup_table.csv"));
}

#[test]
fn force_fetch_downloads_again() {
    let (_temp, store) = project();
    let descriptor = DatasetDescriptor::new(
        "stations",
        "https://example.test/stations.geojson",
        "stations.geojson",
        DataFormat::Geojson,
    );
    let client = MockClient::default().with_body(&descriptor.url, &tract_collection("CA", &["1"]));
    let app = App::new(store, client);

    app.fetch_descriptor(&descriptor, FetchOptions::default(), &JsonOutput)
        .unwrap();
    let forced = app
        .fetch_descriptor(&descriptor, FetchOptions { force: true }, &JsonOutput)
        .unwrap();

    assert_eq!(forced.action, CacheAction::Refreshed);
    assert_eq!(forced.bytes.map(|bytes| bytes > 0), Some(true));
}

#[test]
fn load_all_keeps_input_order() {
    let (_temp, store) = project();
    let california = DatasetDescriptor::new(
        "ca",
        "https://example.test/ca.geojson",
        "ca.geojson",
        DataFormat::Geojson,
    );
    let new_york = DatasetDescriptor::new(
        "ny",
        "https://example.test/ny.geojson",
        "ny.geojson",
        DataFormat::Geojson,
    );
    let client = MockClient::default()
        .with_body(&california.url, &tract_collection("CA", &["100", "200"]))
        .with_body(&new_york.url, &tract_collection("NY", &["300", "400", "500"]));
    let app = App::new(store, client);

    let frame = app
        .load_all(
            &[california.clone(), new_york.clone()],
            FetchOptions::default(),
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(frame.num_rows(), 5);
    let states = frame.string_values("STATE").unwrap();
    let states = states.iter().map(|value| value.as_deref()).collect::<Vec<_>>();
    assert_eq!(
        states,
        vec![Some("CA"), Some("CA"), Some("NY"), Some("NY"), Some("NY")]
    );
    assert!(frame.is_geospatial());
}

#[test]
fn tract_descriptors_follow_state_order() {
    let (_temp, store) = project();
    seed_state_crosswalk(&store);
    let app = App::new(store, MockClient::default());
    let year = Year::new(2021).unwrap();
    let states: Vec<StateAbbrev> = vec!["ca".parse().unwrap(), "NY".parse().unwrap()];

    let descriptors = app.tract_descriptors(year, &states, &JsonOutput).unwrap();

    let files = descriptors
        .iter()
        .map(|descriptor| descriptor.file_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        files,
        vec![
            "census_tiger_tracts_2021_06.zip",
            "census_tiger_tracts_2021_36.zip"
        ]
    );
    assert!(app.client().calls().is_empty());
}

#[test]
fn state_lookup_reads_persisted_crosswalk() {
    let (_temp, store) = project();
    seed_state_crosswalk(&store);
    let app = App::new(store, MockClient::default());

    assert_eq!(app.state_fips_for_abbrev("ca", &JsonOutput).unwrap(), "06");
    assert_eq!(app.state_fips_for_abbrev("CA", &JsonOutput).unwrap(), "06");
    assert_matches!(
        app.state_fips_for_abbrev("ZZ", &JsonOutput),
        Err(GeodataError::UnknownState(_))
    );
}

#[test]
fn county_lookup_for_los_angeles() {
    let (_temp, store) = project();
    seed_state_crosswalk(&store);
    let year = Year::new(2021).unwrap();
    Store::write_bytes_atomic(
        &store.county_crosswalk_csv_path(year),
        b"STATEFP,COUNTYFP,NAME\n06,001,Alameda\n06,037,Los Angeles\n36,061,New York\n",
    )
    .unwrap();
    let app = App::new(store, MockClient::default());

    let fips = app
        .county_fips_for_name("CA", "Los Angeles", year, &JsonOutput)
        .unwrap();
    assert_eq!(fips, "037");
    assert_eq!(
        app.county_fips_for_name("ca", "los angeles", year, &JsonOutput)
            .unwrap(),
        "037"
    );
    assert_matches!(
        app.county_fips_for_name("CA", "Nonexistent County", year, &JsonOutput),
        Err(GeodataError::CountyNotFound { .. })
    );
}

#[test]
fn missing_parameter_is_reported_before_download() {
    let (_temp, store) = project();
    let app = App::new(store, MockClient::default());
    let request = DatasetRequest::new(DatasetKind::TigerCounties);

    let err = app
        .fetch(&request, FetchOptions::default(), &JsonOutput)
        .unwrap_err();

    assert_matches!(err, GeodataError::MissingParameter { .. });
}

#[test]
fn fetch_config_fetches_each_dataset() {
    let (_temp, store) = project();
    let client = MockClient::default()
        .with_body(GEOGRAPHY_LOOKUP_URL, "LinkID\n1\n")
        .with_body(PROVIDERS_URL, "ProviderID\n7\n");
    let app = App::new(store, client);
    let config = ResolvedConfig {
        datasets: vec![
            "fcc-geography-lookup".parse().unwrap(),
            "fcc-providers-2020".parse().unwrap(),
        ],
        ..ResolvedConfig::default()
    };

    let result = app
        .fetch_config(&config, FetchOptions::default(), &JsonOutput)
        .unwrap();

    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[1].dataset, "fcc-providers-2020");
}

#[test]
fn setup_creates_layout() {
    let (_temp, store) = project();
    let app = App::new(store.clone(), MockClient::default());

    let result = app.setup(&JsonOutput).unwrap();

    assert_eq!(result.directories.len(), 5);
    assert!(store.crosswalk_dir().as_std_path().is_dir());
    assert!(store.data_raw_dir().join("roads").as_std_path().is_dir());
}
