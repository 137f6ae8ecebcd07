use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::{self, CacheAction};
use crate::catalog::{Catalog, DatasetDescriptor, Param};
use crate::client::DatasetClient;
use crate::config::ResolvedConfig;
use crate::crosswalk::{self, CountyCrosswalk, StateCrosswalk};
use crate::domain::{DataFormat, DatasetKind, DatasetRequest, StateAbbrev, Year};
use crate::error::GeodataError;
use crate::frame::Frame;
use crate::parse;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<FetchItemResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub dataset: String,
    pub url: String,
    pub path: String,
    pub format: DataFormat,
    pub action: CacheAction,
    pub bytes: Option<u64>,
    pub checked_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub datasets: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub dataset: String,
    pub format: DataFormat,
    pub params: Vec<Param>,
    pub documentation: String,
    /// Local path for datasets without parameters.
    pub path: Option<String>,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupResult {
    pub project_root: String,
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrosswalkResult {
    pub year: Year,
    pub state_path: String,
    pub county_csv_path: String,
    pub county_parquet_path: String,
    pub states: usize,
    pub counties: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupResult {
    pub query: String,
    pub fips: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub crs: Option<String>,
}

impl FrameSummary {
    pub fn of(frame: &Frame) -> Self {
        Self {
            rows: frame.num_rows(),
            columns: frame.column_names(),
            crs: frame.crs().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<C: DatasetClient> {
    store: Store,
    client: C,
    reference_year: Year,
}

impl<C: DatasetClient> App<C> {
    pub fn new(store: Store, client: C) -> Self {
        Self {
            store,
            client,
            reference_year: Year::reference(),
        }
    }

    /// TIGER vintage the state crosswalk is derived from.
    pub fn with_reference_year(mut self, year: Year) -> Self {
        self.reference_year = year;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fills catalog templates for `request`, looking up the state FIPS code
    /// through the state crosswalk when the entry needs one.
    pub fn resolve_descriptor(
        &self,
        request: &DatasetRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DatasetDescriptor, GeodataError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {request}"),
            elapsed: None,
        });
        let needs_state = Catalog::entry(request.kind).params.contains(&Param::State);
        let state_fips = match (&request.state, needs_state) {
            (Some(state), true) => Some(
                self.state_crosswalk(sink)?
                    .fips_for_abbrev(state.as_str())?
                    .to_string(),
            ),
            _ => None,
        };
        Catalog::resolve(request, state_fips.as_deref())
    }

    pub fn fetch(
        &self,
        request: &DatasetRequest,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchItemResult, GeodataError> {
        let descriptor = self.resolve_descriptor(request, sink)?;
        self.fetch_descriptor(&descriptor, options, sink)
    }

    pub fn fetch_descriptor(
        &self,
        descriptor: &DatasetDescriptor,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchItemResult, GeodataError> {
        let path = self.store.raw_path(descriptor);
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {}", descriptor.name),
            elapsed: None,
        });
        let start = Instant::now();
        let outcome = cache::ensure_local(&self.client, &path, &descriptor.url, options.force)?;
        let message = match outcome.action {
            CacheAction::Hit => format!("phase=Store; already cached at {path}"),
            CacheAction::Downloaded | CacheAction::Refreshed => {
                format!("phase=Store; wrote {path}")
            }
        };
        sink.event(ProgressEvent {
            message,
            elapsed: Some(start.elapsed()),
        });

        Ok(FetchItemResult {
            dataset: descriptor.name.clone(),
            url: descriptor.url.clone(),
            path: path.to_string(),
            format: descriptor.format,
            action: outcome.action,
            bytes: outcome.bytes,
            checked_at: iso_timestamp(),
        })
    }

    pub fn load(
        &self,
        request: &DatasetRequest,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Frame, GeodataError> {
        let descriptor = self.resolve_descriptor(request, sink)?;
        self.load_descriptor(&descriptor, options, sink)
    }

    pub fn load_descriptor(
        &self,
        descriptor: &DatasetDescriptor,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Frame, GeodataError> {
        let item = self.fetch_descriptor(descriptor, options, sink)?;
        sink.event(ProgressEvent {
            message: format!("phase=Parse; {} as {}", item.path, descriptor.format),
            elapsed: None,
        });
        let start = Instant::now();
        let frame = parse::parse(self.store.raw_path(descriptor).as_std_path(), descriptor.format)?;
        sink.event(ProgressEvent {
            message: format!("phase=Parse; {} rows", frame.num_rows()),
            elapsed: Some(start.elapsed()),
        });
        Ok(frame)
    }

    /// Fetches and parses each descriptor in order and stacks the frames.
    /// Rows keep input order and are numbered 0..N-1.
    pub fn load_all(
        &self,
        descriptors: &[DatasetDescriptor],
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Frame, GeodataError> {
        let frames = descriptors
            .iter()
            .map(|descriptor| self.load_descriptor(descriptor, options, sink))
            .collect::<Result<Vec<_>, _>>()?;
        Frame::concat(frames)
    }

    pub fn tract_descriptors(
        &self,
        year: Year,
        states: &[StateAbbrev],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DatasetDescriptor>, GeodataError> {
        states
            .iter()
            .map(|state| {
                let request = DatasetRequest::new(DatasetKind::TigerTracts)
                    .with_year(year)
                    .with_state(state.clone());
                self.resolve_descriptor(&request, sink)
            })
            .collect()
    }

    pub fn tracts_for_states(
        &self,
        year: Year,
        states: &[StateAbbrev],
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Frame, GeodataError> {
        let descriptors = self.tract_descriptors(year, states, sink)?;
        self.load_all(&descriptors, options, sink)
    }

    pub fn fetch_config(
        &self,
        config: &ResolvedConfig,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, GeodataError> {
        let items = config
            .datasets
            .iter()
            .map(|request| self.fetch(request, options, sink))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FetchResult { items })
    }

    pub fn list(&self, sink: &dyn ProgressSink) -> Result<ListResult, GeodataError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; scanning catalog".to_string(),
            elapsed: None,
        });
        let mut datasets = Vec::with_capacity(Catalog::entries().len());
        for entry in Catalog::entries() {
            let path = if entry.params.is_empty() {
                let descriptor = Catalog::resolve(&DatasetRequest::new(entry.kind), None)?;
                Some(self.store.raw_path(&descriptor))
            } else {
                None
            };
            datasets.push(ListEntry {
                dataset: entry.kind.to_string(),
                format: entry.format,
                params: entry.params.to_vec(),
                documentation: entry.documentation.to_string(),
                cached: path.as_ref().is_some_and(|path| self.store.exists(path)),
                path: path.map(|path| path.to_string()),
            });
        }
        Ok(ListResult { datasets })
    }

    pub fn setup(&self, sink: &dyn ProgressSink) -> Result<SetupResult, GeodataError> {
        sink.event(ProgressEvent {
            message: format!("phase=Store; preparing {}", self.store.project_root()),
            elapsed: None,
        });
        self.store.setup_project_structure()?;
        Ok(SetupResult {
            project_root: self.store.project_root().to_string(),
            directories: self
                .store
                .project_directories()
                .iter()
                .map(|dir| dir.to_string())
                .collect(),
        })
    }

    /// Loads the persisted state crosswalk, deriving it from the TIGER
    /// states file of the reference year on first use.
    pub fn state_crosswalk(&self, sink: &dyn ProgressSink) -> Result<StateCrosswalk, GeodataError> {
        StateCrosswalk::load_or_derive(&self.store.state_crosswalk_path(), || {
            let request = DatasetRequest::new(DatasetKind::TigerStates).with_year(self.reference_year);
            self.load(&request, FetchOptions::default(), sink)
        })
    }

    pub fn county_crosswalk(
        &self,
        year: Year,
        sink: &dyn ProgressSink,
    ) -> Result<CountyCrosswalk, GeodataError> {
        CountyCrosswalk::load_or_derive(
            &self.store.county_crosswalk_csv_path(year),
            &self.store.county_crosswalk_parquet_path(year),
            || self.load(&counties_request(year), FetchOptions::default(), sink),
        )
    }

    pub fn build_crosswalks(
        &self,
        year: Year,
        sink: &dyn ProgressSink,
    ) -> Result<CrosswalkResult, GeodataError> {
        let states = self.state_crosswalk(sink)?;
        let counties = self.county_crosswalk(year, sink)?;
        Ok(CrosswalkResult {
            year,
            state_path: self.store.state_crosswalk_path().to_string(),
            county_csv_path: self.store.county_crosswalk_csv_path(year).to_string(),
            county_parquet_path: self.store.county_crosswalk_parquet_path(year).to_string(),
            states: states.rows().len(),
            counties: counties.rows().len(),
        })
    }

    pub fn state_fips_for_abbrev(
        &self,
        abbrev: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, GeodataError> {
        let states = self.state_crosswalk(sink)?;
        states.fips_for_abbrev(abbrev).map(str::to_string)
    }

    pub fn county_fips_for_name(
        &self,
        state_abbrev: &str,
        county_name: &str,
        year: Year,
        sink: &dyn ProgressSink,
    ) -> Result<String, GeodataError> {
        let states = self.state_crosswalk(sink)?;
        let counties = self.county_crosswalk(year, sink)?;
        crosswalk::county_fips_for_name(&states, &counties, state_abbrev, county_name)
    }

    /// Boundary rows for one county from the TIGER counties file of `year`.
    pub fn county_geometry(
        &self,
        state_abbrev: &str,
        county_name: &str,
        year: Year,
        sink: &dyn ProgressSink,
    ) -> Result<Frame, GeodataError> {
        let state_fips = self.state_fips_for_abbrev(state_abbrev, sink)?;
        let counties = self.load(&counties_request(year), FetchOptions::default(), sink)?;
        crosswalk::county_geometry(&counties, &state_fips, county_name)
    }
}

fn counties_request(year: Year) -> DatasetRequest {
    DatasetRequest::new(DatasetKind::TigerCounties).with_year(year)
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::output::JsonOutput;

    #[derive(Default)]
    struct MockClient {
        calls: Mutex<usize>,
    }

    impl DatasetClient for MockClient {
        fn download(&self, _url: &str, destination: &mut File) -> Result<u64, GeodataError> {
            *self.calls.lock().unwrap() += 1;
            destination.write_all(b"LinkID,MaxAdDown\n1,25.5\n").unwrap();
            Ok(24)
        }
    }

    #[test]
    fn fetch_prefers_cached_file_over_download() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new(root);
        let request = DatasetRequest::new(DatasetKind::FccGeographyLookup);
        let descriptor = Catalog::resolve(&request, None).unwrap();
        let path = store.raw_path(&descriptor);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"LinkID\n7\n").unwrap();

        let app = App::new(store, MockClient::default());
        let item = app
            .fetch(&request, FetchOptions::default(), &JsonOutput)
            .unwrap();

        assert_eq!(item.action, CacheAction::Hit);
        assert_eq!(*app.client().calls.lock().unwrap(), 0);
    }

    #[test]
    fn list_reports_cache_state() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let app = App::new(Store::new(root), MockClient::default());
        app.fetch(
            &DatasetRequest::new(DatasetKind::FccProviders2020),
            FetchOptions::default(),
            &JsonOutput,
        )
        .unwrap();

        let list = app.list(&JsonOutput).unwrap();
        let cached = list
            .datasets
            .iter()
            .filter(|entry| entry.cached)
            .map(|entry| entry.dataset.as_str())
            .collect::<Vec<_>>();
        assert_eq!(cached, vec!["fcc-providers-2020"]);
        let roads = list
            .datasets
            .iter()
            .find(|entry| entry.dataset == "tiger-roads")
            .unwrap();
        assert_eq!(roads.params, vec![Param::Year, Param::State, Param::County]);
        assert!(roads.path.is_none());
    }
}
