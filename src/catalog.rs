//! Data-driven dataset catalog.
//!
//! Each [`CatalogEntry`] holds URL and file-name templates with `{year}`,
//! `{state_fips}` and `{county_fips}` placeholders. [`Catalog::resolve`]
//! turns a [`DatasetRequest`] into a concrete [`DatasetDescriptor`].

use serde::Serialize;

use crate::domain::{DataFormat, DatasetKind, DatasetRequest};
use crate::error::GeodataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Year,
    State,
    County,
}

impl Param {
    fn name(&self) -> &'static str {
        match self {
            Param::Year => "year",
            Param::State => "state",
            Param::County => "county",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub kind: DatasetKind,
    pub url: &'static str,
    pub file_name: &'static str,
    pub subdir: Option<&'static str>,
    pub format: DataFormat,
    pub params: &'static [Param],
    pub documentation: &'static str,
}

/// A fully resolved dataset: where it comes from and where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    pub name: String,
    pub url: String,
    pub file_name: String,
    pub subdir: Option<String>,
    pub format: DataFormat,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        file_name: impl Into<String>,
        format: DataFormat,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            file_name: file_name.into(),
            subdir: None,
            format,
        }
    }
}

const TIGER_DOCS: &str = "https://www.census.gov/programs-surveys/geography/technical-documentation/complete-technical-documentation/tiger-geo-line.html";
const FCC_477_DOCS: &str = "https://www.fcc.gov/general/explanation-broadband-deployment-data";

/// Form 477 fixed broadband deployment extracts hosted on the FCC box share.
const FCC_WI_FIXED_2020_URL: &str = concat!(
    "https://public.boxcloud.com/d/1/b1!MLzsLVgzxBl-hChTRyvk-prUAoAy4OLuDCE5J8",
    "Yt-q5ci9a5gyeTFLIeiH8ZKkLF1VQ4Wvu6GaGyrszfNGMQn_seQUYjHO3irK8v6rt6gTWgfY4",
    "BtJDc6SWkdOyEMRKre_8RAIVgLVZL3-y7rJMOXgW7VzTJuoszd-rp6t36zGabqxbFqkJFWvR9",
    "L0WCboq7rwlGgu8RfXy-QYh5TESK5v1mMF91V_K6wlkzw17Pir_NgdP0TkmpzY_RcD-xWFshc",
    "S_JL_RMLmH_HycBE0NAVIs7twrNbJROMgIQjg83AWqYZD502E7upG5C8YYfWb6s3ZrFudUH5V",
    "3LnebtT2tqrT2InmdHPLePfUxqmNjdABdq1KXQWbV5PPC3Sadyt3n6p7_tjE4YoE5KEPCETzn",
    "oteC4YHFJq0AHPleoE9H2fSjNL6AYBmk--MuehsywN851ztNKRlpIGJBXw1XOEIaWiatjz8sb",
    "m-YPtjnt7AMouwXHGHtQLwc1jawBzo82FRkbV9bvXUDLfwCAyaGWsBr8PJJUBQhaBTV70oPCE",
    "Mzflv75cBAdZGayVkeGnIEoX3MfaiQTuRydrLKLjC9iK1XaFwe-ShizvMMJx-_-5fGeAfgcX6",
    "oBoZyexv3344D2vl8cwomwF1UuYCHKpPSkEBnssdb56bZ0HLoAxoVcicqU7JQAWKGdwB3YP5P",
    "-QGzOzd51132ggfOnDelkYGJJW1JLZae3K8B7Mbp5OLEYuU1V_jszrc6lndhUD9ohZtrpUQZb",
    "D9xd9DOdT9BYwUuAXw2SpGXt7cQEfTt5SgIOnQ2w1NnxxTav7ce1rhyvVU081qAUZmCTReBjt",
    "0RgMl6UWOod39oHENR1QY1fQ8Jk_nmgn3PqbxHwv3V_tmypXWVrZdiErp34YkWBy85Sjc-XF_",
    "XaoA9Ad_Pfly7uPzDXdp_nTmDXmahsmGHV5QKAcvmsFfcZwcWe9FcYiFNv_c56ZyX4pyKyPy7",
    "GSYPeL9Y3__v2ROCpgMntJD1ccmaz_05hoa8-B0CoDYhjNYlhbdC_lRlsK0Ii_Doi6l26Z8XG",
    "YEgUGy6WnmJYUn9JhLDnN3FcxfowKUTtZ-7Q93-YzvBB0hsuwtqLLHXQPz8G3w9qlU-5yGdDq",
    "3H3PHZfG1FdHRIMULNvj7Lpo5Nal2hJbDMc0gT-iurz0tSiLysqIBXlPZwP2zB6g2Y8C6Enw1",
    "bRnfyA0tJyzqd0mleo0EazvkVG-iXn5z0gH8gdIsfRuYQKHYz-QnzDdOEywcXgoSeIOBcetWP",
    "Wlv50JYtz2T9rXjzu5CUi1Zc2wJfqx6Q_4gci/download",
);

const FCC_MI_FIXED_2020_URL: &str = concat!(
    "https://public.boxcloud.com/d/1/b1!COa6U5tDIOCIcV4k4q1lKubvVXfqq3Oc-f3DTzSyw",
    "cffjnKxp2uujAI9l69J7WLaDdoh7SKQh9WzPqe2Af4PGn7uNy4fqmETjF8yu9ciez6Ia0XEIammt",
    "2DNguZwtHmogsagYqx5uPmzazTFtCppjkRF7WaFKZkKMLMDRXarYhRp9i_tT3jdv66CE45P9K-w_",
    "mjA-uoNqGIwBDS3opgaQonDbQPVnubxx2dE87GYB_SsPxAGXEeRXnrJ0QTL_jMN0s8TFUP9uWtE5",
    "PUOsBd2sWsHoAlU8SlqY86rjb1Yxxz5sws0sCZ8NRew6ImyHsPS-GEFfOjMkd04y9f7hJsjSvkTi",
    "TjBjdtIJwy_tt06kQSA3AafiQ5cqgyTjCsuVWl8hrX9EdSB474YAfm497rXdVUnlvrTjzU6Hp-s-",
    "5yV3nXWeNg9nIhRc1YWeEA_SNkeXFe2FXJbul5qiwNPymPriJ3hR0VgPuOgHKPhobgrY-VwRp4lX",
    "aPcnX02r6hKCNYx1kwzFC66-7VAfJ-4lIe9hNkj9cdun6V5ooDHGJ64b57GcZQ69OTQLw1J4fb48",
    "T6N41ovzUX-m6p1GMUqyrZWodX2T0I_yPc15ZFIPRJzjUvwlOrLApW_eEmMA8wenEOMaErpuRD5V",
    "IJXzqGqcsPLoVxFJuolsMZkE6BzS9CY8YkQPUG0F3yzmidEnM7-cMCx-J2djl8R6zJJIbYNts4rF",
    "WtmGBkijMPqdliiLlikCK5Zo6Brq8kN4llG0kiTnIWLIUo5uIaOB19RdU9NuHUM80Edh7RtyV7wI",
    "JSVnTkBQhcBq6Rvq6RvVVUhO5bEN4TQeg5TyxFXWHJjOhSdy4rMg-Gy8a6zvad5H29Y3C5BdeRHQ",
    "oSAgmDPXoUzShS61lojpODTJz6zRV20pnizJmQZ-Kn3C36Qg1aQIFG4Q8P7sY1C5JI7VTahSKVBE",
    "vukxWngqZozWThY79Ntbib5FkK9oNTrkhH8KR_xgT_8CzpPQwnuI33dmL5pr6_CM-8M5OzLhKvex",
    "38GuWEJaqh8yqifxzvMJX_fkhGgyUjWJf8A4UApeUtQU9XRwy8LofAZcNTWLyfhWLcX37eFo05CK",
    "qTZ4sedoFp1Ioz7XOc-cVxUOs3PtX-RlxGK-RNlnlSMN-aOfweYInwz1mlKCBFBlDpMdlfOj4Qt-",
    "AZH00T5Id93UHA1ncjmlYMi2WJSeKfMCUV8YilY0utq1uiTSCveZZssRvD7gUsFY2ZvE6-hy9yIu",
    "z-WYwkyYMoGLH7_bA7CGFtNmQ1Im5sd7ZGacISJEJhjyvuuk2t9n0x18UG_/download",
);

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        kind: DatasetKind::FccGeographyLookup,
        url: "https://opendata.fcc.gov/api/views/v5vt-e7vw/rows.csv?accessType=DOWNLOAD&sorting=true",
        file_name: "fcc_broadband_geography_lookup_table.csv",
        subdir: None,
        format: DataFormat::Csv,
        params: &[],
        documentation: "https://opendata.fcc.gov/Wireline/Geography-Lookup-Table/v5vt-e7vw",
    },
    CatalogEntry {
        kind: DatasetKind::FccProviders2020,
        url: "https://opendata.fcc.gov/api/views/2ra3-4jd4/rows.csv?accessType=DOWNLOAD&sorting=true",
        file_name: "fcc_broadband_provider_table_12_2020.csv",
        subdir: None,
        format: DataFormat::Csv,
        params: &[],
        documentation: "https://opendata.fcc.gov/Wireline/Provider-Table-December-2020/2ra3-4jd4",
    },
    CatalogEntry {
        kind: DatasetKind::FccAreaCoverage2020,
        url: "https://opendata.fcc.gov/api/views/ymd4-xaiz/rows.csv?accessType=DOWNLOAD&sorting=true",
        file_name: "fcc_broadband_area_coverage_12_2020.csv",
        subdir: None,
        format: DataFormat::Csv,
        params: &[],
        documentation: "https://opendata.fcc.gov/Wireline/Area-Table-December-2020/ymd4-xaiz",
    },
    CatalogEntry {
        kind: DatasetKind::FccWiFixed2020,
        url: FCC_WI_FIXED_2020_URL,
        file_name: "fcc_broadband_wi_fixed_12_2020.zip",
        subdir: None,
        format: DataFormat::Csv,
        params: &[],
        documentation: FCC_477_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::FccMiFixed2020,
        url: FCC_MI_FIXED_2020_URL,
        file_name: "fcc_broadband_mi_fixed_12_2020.zip",
        subdir: None,
        format: DataFormat::Csv,
        params: &[],
        documentation: FCC_477_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::TigerStates,
        url: "https://www2.census.gov/geo/tiger/TIGER{year}/STATE/tl_{year}_us_state.zip",
        file_name: "census_tiger_state_lines_{year}.zip",
        subdir: None,
        format: DataFormat::Shapefile,
        params: &[Param::Year],
        documentation: TIGER_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::TigerCounties,
        url: "https://www2.census.gov/geo/tiger/TIGER{year}/COUNTY/tl_{year}_us_county.zip",
        file_name: "census_tiger_county_lines_{year}.zip",
        subdir: None,
        format: DataFormat::Shapefile,
        params: &[Param::Year],
        documentation: TIGER_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::TigerRails,
        url: "https://www2.census.gov/geo/tiger/TIGER{year}/RAILS/tl_{year}_us_rails.zip",
        file_name: "census_tiger_rail_lines_{year}.zip",
        subdir: None,
        format: DataFormat::Shapefile,
        params: &[Param::Year],
        documentation: TIGER_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::TigerTracts,
        url: "https://www2.census.gov/geo/tiger/TIGER{year}/TRACT/tl_{year}_{state_fips}_tract.zip",
        file_name: "census_tiger_tracts_{year}_{state_fips}.zip",
        subdir: None,
        format: DataFormat::Shapefile,
        params: &[Param::Year, Param::State],
        documentation: TIGER_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::TigerRoads,
        url: "https://www2.census.gov/geo/tiger/TIGER{year}/ROADS/tl_{year}_{state_fips}{county_fips}_roads.zip",
        file_name: "census_tiger_roads_{year}_{state_fips}{county_fips}.zip",
        subdir: Some("roads"),
        format: DataFormat::Shapefile,
        params: &[Param::Year, Param::State, Param::County],
        documentation: TIGER_DOCS,
    },
    CatalogEntry {
        kind: DatasetKind::RailNodes,
        url: "https://opendata.arcgis.com/api/v3/datasets/7958468db586471d94f97e99b916175a_0/downloads/data?format=geojson&spatialRefId=4326",
        file_name: "north_american_rail_nodes.geojson",
        subdir: None,
        format: DataFormat::Geojson,
        params: &[],
        documentation: "https://data-usdot.opendata.arcgis.com/datasets/usdot::north-american-rail-nodes/about",
    },
    CatalogEntry {
        kind: DatasetKind::RailLines,
        url: "https://opendata.arcgis.com/api/v3/datasets/d83e85154a304da995837889cc4012e3_0/downloads/data?format=geojson&spatialRefId=4326",
        file_name: "north_american_rail_lines.geojson",
        subdir: None,
        format: DataFormat::Geojson,
        params: &[],
        documentation: "https://data-usdot.opendata.arcgis.com/datasets/usdot::north-american-rail-lines/about",
    },
    CatalogEntry {
        kind: DatasetKind::AmtrakRoutes,
        url: "https://opendata.arcgis.com/api/v3/datasets/baa5a6c4d4ae4034850e99aaca38cfbb_0/downloads/data?format=geojson&spatialRefId=4326",
        file_name: "amtrak_routes.geojson",
        subdir: None,
        format: DataFormat::Geojson,
        params: &[],
        documentation: "https://data-usdot.opendata.arcgis.com/datasets/usdot::amtrak-routes/about",
    },
    CatalogEntry {
        kind: DatasetKind::AmtrakStations,
        url: "https://opendata.arcgis.com/api/v3/datasets/4cf728602fa3428ba0a08d30efbb5f45_0/downloads/data?format=geojson&spatialRefId=4326",
        file_name: "amtrak_stations.geojson",
        subdir: None,
        format: DataFormat::Geojson,
        params: &[],
        documentation: "https://data-usdot.opendata.arcgis.com/datasets/usdot::amtrak-stations-1/about",
    },
];

pub struct Catalog;

impl Catalog {
    pub fn entries() -> &'static [CatalogEntry] {
        ENTRIES
    }

    pub fn entry(kind: DatasetKind) -> &'static CatalogEntry {
        // every DatasetKind variant has exactly one entry
        ENTRIES
            .iter()
            .find(|entry| entry.kind == kind)
            .unwrap_or_else(|| unreachable!("catalog entry missing for {kind}"))
    }

    /// Fills the entry templates for `request`. `state_fips` is the
    /// two-digit code for `request.state`, resolved by the caller.
    pub fn resolve(
        request: &DatasetRequest,
        state_fips: Option<&str>,
    ) -> Result<DatasetDescriptor, GeodataError> {
        let entry = Self::entry(request.kind);
        let mut values: Vec<(&str, String)> = Vec::new();

        for param in entry.params {
            let value = match param {
                Param::Year => request.year.map(|year| year.to_string()),
                Param::State => request
                    .state
                    .as_ref()
                    .and(state_fips)
                    .map(str::to_string),
                Param::County => request.county.as_ref().map(|county| county.to_string()),
            };
            let value = value.ok_or_else(|| GeodataError::MissingParameter {
                dataset: request.kind.to_string(),
                parameter: param.name().to_string(),
            })?;
            let placeholder = match param {
                Param::Year => "{year}",
                Param::State => "{state_fips}",
                Param::County => "{county_fips}",
            };
            values.push((placeholder, value));
        }

        let fill = |template: &str| {
            values
                .iter()
                .fold(template.to_string(), |acc, (placeholder, value)| {
                    acc.replace(placeholder, value)
                })
        };

        Ok(DatasetDescriptor {
            name: request.to_string(),
            url: fill(entry.url),
            file_name: fill(entry.file_name),
            subdir: entry.subdir.map(str::to_string),
            format: entry.format,
        })
    }
}
