use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeodataError;

/// Every abbreviation published in the TIGER state file: the 50 states, DC,
/// and the five inhabited territories.
pub const STATE_ABBREVIATIONS: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY", "AS", "GU", "MP", "PR", "VI",
];

/// First vintage published with the `tl_<year>_` file layout.
pub const FIRST_TIGER_YEAR: u16 = 2011;
/// TIGER vintage used for reference tables when no year is configured.
pub const REFERENCE_YEAR: u16 = 2021;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Shapefile,
    Geojson,
}

impl DataFormat {
    /// Extensions accepted when picking the payload out of a zip archive.
    pub fn member_extensions(&self) -> &'static [&'static str] {
        match self {
            DataFormat::Csv => &["csv"],
            DataFormat::Shapefile => &["shp"],
            DataFormat::Geojson => &["geojson", "json"],
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Shapefile => write!(f, "shapefile"),
            DataFormat::Geojson => write!(f, "geojson"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" | "zipped_csv" => Ok(DataFormat::Csv),
            "shp" | "shapefile" => Ok(DataFormat::Shapefile),
            "geojson" | "json" => Ok(DataFormat::Geojson),
            _ => Err(GeodataError::UnsupportedFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateAbbrev(String);

impl StateAbbrev {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateAbbrev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StateAbbrev {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        if !STATE_ABBREVIATIONS.contains(&normalized.as_str()) {
            return Err(GeodataError::UnknownState(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Year(u16);

impl Year {
    pub fn new(year: u16) -> Result<Self, GeodataError> {
        if !(FIRST_TIGER_YEAR..=2099).contains(&year) {
            return Err(GeodataError::InvalidYear(year.to_string()));
        }
        Ok(Self(year))
    }

    pub fn reference() -> Self {
        Self(REFERENCE_YEAR)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Year {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let year = value
            .trim()
            .parse::<u16>()
            .map_err(|_| GeodataError::InvalidYear(value.to_string()))?;
        Self::new(year)
    }
}

/// Three-digit county FIPS code, unique within a state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountyFips(String);

impl CountyFips {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountyFips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CountyFips {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = (1..=3).contains(&trimmed.len())
            && trimmed.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(GeodataError::InvalidCountyFips(value.to_string()));
        }
        Ok(Self(format!("{trimmed:0>3}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    FccGeographyLookup,
    FccProviders2020,
    FccAreaCoverage2020,
    FccWiFixed2020,
    FccMiFixed2020,
    TigerStates,
    TigerCounties,
    TigerRails,
    TigerTracts,
    TigerRoads,
    RailNodes,
    RailLines,
    AmtrakRoutes,
    AmtrakStations,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 14] = [
        DatasetKind::FccGeographyLookup,
        DatasetKind::FccProviders2020,
        DatasetKind::FccAreaCoverage2020,
        DatasetKind::FccWiFixed2020,
        DatasetKind::FccMiFixed2020,
        DatasetKind::TigerStates,
        DatasetKind::TigerCounties,
        DatasetKind::TigerRails,
        DatasetKind::TigerTracts,
        DatasetKind::TigerRoads,
        DatasetKind::RailNodes,
        DatasetKind::RailLines,
        DatasetKind::AmtrakRoutes,
        DatasetKind::AmtrakStations,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            DatasetKind::FccGeographyLookup => "fcc-geography-lookup",
            DatasetKind::FccProviders2020 => "fcc-providers-2020",
            DatasetKind::FccAreaCoverage2020 => "fcc-area-coverage-2020",
            DatasetKind::FccWiFixed2020 => "fcc-wi-fixed-2020",
            DatasetKind::FccMiFixed2020 => "fcc-mi-fixed-2020",
            DatasetKind::TigerStates => "tiger-states",
            DatasetKind::TigerCounties => "tiger-counties",
            DatasetKind::TigerRails => "tiger-rails",
            DatasetKind::TigerTracts => "tiger-tracts",
            DatasetKind::TigerRoads => "tiger-roads",
            DatasetKind::RailNodes => "rail-nodes",
            DatasetKind::RailLines => "rail-lines",
            DatasetKind::AmtrakRoutes => "amtrak-routes",
            DatasetKind::AmtrakStations => "amtrak-stations",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for DatasetKind {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        DatasetKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized)
            .ok_or_else(|| GeodataError::UnknownDataset(value.to_string()))
    }
}

/// A catalog dataset plus the parameters its templates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequest {
    pub kind: DatasetKind,
    pub year: Option<Year>,
    pub state: Option<StateAbbrev>,
    pub county: Option<CountyFips>,
}

impl DatasetRequest {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            year: None,
            state: None,
            county: None,
        }
    }

    pub fn with_year(mut self, year: Year) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_state(mut self, state: StateAbbrev) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_county(mut self, county: CountyFips) -> Self {
        self.county = Some(county);
        self
    }
}

impl fmt::Display for DatasetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(year) = &self.year {
            write!(f, ":{year}")?;
        }
        if let Some(state) = &self.state {
            write!(f, ":{state}")?;
        }
        if let Some(county) = &self.county {
            write!(f, ":{county}")?;
        }
        Ok(())
    }
}

/// Parses `kind[:year[:state[:county]]]`, e.g. `tiger-roads:2021:CA:037`.
impl FromStr for DatasetRequest {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GeodataError::InvalidSpecifier(value.to_string()));
        }
        let mut parts = trimmed.split(':');
        let kind: DatasetKind = parts
            .next()
            .ok_or_else(|| GeodataError::InvalidSpecifier(value.to_string()))?
            .parse()?;
        let mut request = DatasetRequest::new(kind);
        if let Some(year) = parts.next() {
            request.year = Some(year.parse()?);
        }
        if let Some(state) = parts.next() {
            request.state = Some(state.parse()?);
        }
        if let Some(county) = parts.next() {
            request.county = Some(county.parse()?);
        }
        if parts.next().is_some() {
            return Err(GeodataError::InvalidSpecifier(value.to_string()));
        }
        Ok(request)
    }
}
