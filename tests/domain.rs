use assert_matches::assert_matches;

use geodata_cache::domain::{CountyFips, DataFormat, DatasetKind, DatasetRequest, Year};
use geodata_cache::error::GeodataError;

#[test]
fn every_slug_parses_back() {
    for kind in DatasetKind::ALL {
        let parsed: DatasetKind = kind.slug().parse().unwrap();
        assert_eq!(parsed, kind);
    }
}

#[test]
fn unknown_dataset_is_rejected() {
    let err = "tiger-rivers:2021".parse::<DatasetRequest>().unwrap_err();
    assert_matches!(err, GeodataError::UnknownDataset(_));
}

#[test]
fn year_before_first_vintage_is_rejected() {
    assert_matches!(Year::new(2010), Err(GeodataError::InvalidYear(_)));
    assert_matches!("20x1".parse::<Year>(), Err(GeodataError::InvalidYear(_)));
    assert_eq!(Year::new(2011).unwrap().get(), 2011);
}

#[test]
fn too_many_specifier_parts() {
    let err = "tiger-roads:2021:CA:037:extra"
        .parse::<DatasetRequest>()
        .unwrap_err();
    assert_matches!(err, GeodataError::InvalidSpecifier(_));
}

#[test]
fn county_fips_rejects_letters() {
    assert_matches!(
        "03a".parse::<CountyFips>(),
        Err(GeodataError::InvalidCountyFips(_))
    );
    assert_matches!(
        "1234".parse::<CountyFips>(),
        Err(GeodataError::InvalidCountyFips(_))
    );
}

#[test]
fn unsupported_format_is_an_error() {
    assert_matches!(
        "xlsx".parse::<DataFormat>(),
        Err(GeodataError::UnsupportedFormat(_))
    );
    assert_eq!("JSON".parse::<DataFormat>().unwrap(), DataFormat::Geojson);
}

#[test]
fn request_without_parameters_displays_as_slug() {
    let request: DatasetRequest = "amtrak-stations".parse().unwrap();
    assert_eq!(request.kind, DatasetKind::AmtrakStations);
    assert_eq!(request.to_string(), "amtrak-stations");
}
