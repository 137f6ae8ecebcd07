use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{DatasetRequest, REFERENCE_YEAR, Year};
use crate::error::GeodataError;

pub const DEFAULT_CONFIG_FILE: &str = "geodata.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub project_root: Option<String>,
    #[serde(default)]
    pub reference_year: Option<u16>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DatasetEntry {
    Shorthand(String),
    Detailed(DatasetEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatasetEntryObject {
    pub dataset: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub project_root: Option<Utf8PathBuf>,
    pub reference_year: Year,
    pub timeout: Option<Duration>,
    pub datasets: Vec<DatasetRequest>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            project_root: None,
            reference_year: Year::reference(),
            timeout: None,
            datasets: Vec::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must be readable; without one, `geodata.json` in
    /// the current directory is used and its absence is `MissingConfig`.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GeodataError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(GeodataError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GeodataError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GeodataError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GeodataError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let reference_year = match config.reference_year {
            Some(year) => Year::new(year)?,
            None => Year::reference(),
        };

        let datasets = config
            .datasets
            .into_iter()
            .map(|entry| -> Result<DatasetRequest, GeodataError> {
                match entry {
                    DatasetEntry::Shorthand(value) => value.parse(),
                    DatasetEntry::Detailed(obj) => {
                        let mut request = DatasetRequest::new(obj.dataset.parse()?);
                        if let Some(year) = obj.year {
                            request = request.with_year(Year::new(year)?);
                        }
                        if let Some(state) = obj.state {
                            request = request.with_state(state.parse()?);
                        }
                        if let Some(county) = obj.county {
                            request = request.with_county(county.parse()?);
                        }
                        Ok(request)
                    }
                }
            })
            .collect::<Result<Vec<_>, GeodataError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            project_root: config.project_root.map(Utf8PathBuf::from),
            reference_year,
            timeout: config.timeout_secs.map(Duration::from_secs),
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::DatasetKind;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            schema_version: None,
            project_root: None,
            reference_year: None,
            timeout_secs: None,
            datasets: vec![DatasetEntry::Shorthand("tiger-counties:2020".to_string())],
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.reference_year.get(), REFERENCE_YEAR);
        assert_eq!(resolved.timeout, None);
        assert_eq!(resolved.datasets.len(), 1);
        assert_eq!(resolved.datasets[0].kind, DatasetKind::TigerCounties);
        assert_eq!(resolved.datasets[0].year.map(|year| year.get()), Some(2020));
    }

    #[test]
    fn detailed_entry_validates_year() {
        let config = Config {
            schema_version: Some(1),
            project_root: None,
            reference_year: None,
            timeout_secs: None,
            datasets: vec![DatasetEntry::Detailed(DatasetEntryObject {
                dataset: "tiger-states".to_string(),
                year: Some(1999),
                state: None,
                county: None,
            })],
        };

        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(GeodataError::InvalidYear(_))
        );
    }
}
