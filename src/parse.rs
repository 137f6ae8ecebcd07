//! Format parser: turns a cached file into a [`Frame`].
//!
//! Dispatch is a closed match over [`DataFormat`]. Zip payloads are unpacked
//! into a temporary directory first and the member matching the declared
//! format is parsed.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;

use geojson::{Feature, GeoJson, Geometry, Value};
use shapefile::dbase::FieldValue;
use shapefile::{Point, PointM, PointZ, PolygonRing, Shape};
use tracing::debug;

use crate::domain::DataFormat;
use crate::error::GeodataError;
use crate::frame::{Cell, Frame};
use crate::fs_util::{extract_zip, find_member, is_zip};

/// RFC 7946 coordinates are always WGS 84.
const GEOJSON_DEFAULT_CRS: &str = "EPSG:4326";

pub fn parse(path: &Path, format: DataFormat) -> Result<Frame, GeodataError> {
    if is_zip(path)? {
        let temp_dir = tempfile::Builder::new()
            .prefix("geodata-unzip")
            .tempdir()
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        extract_zip(path, temp_dir.path())?;
        let member = find_member(temp_dir.path(), format.member_extensions())?.ok_or_else(|| {
            GeodataError::Archive(format!(
                "{} contains no {format} member",
                path.display()
            ))
        })?;
        debug!(archive = %path.display(), member = %member.display(), "parsing archive member");
        return parse_plain(&member, format);
    }
    parse_plain(path, format)
}

fn parse_plain(path: &Path, format: DataFormat) -> Result<Frame, GeodataError> {
    match format {
        DataFormat::Csv => parse_csv(path),
        DataFormat::Shapefile => parse_shapefile(path),
        DataFormat::Geojson => parse_geojson(path),
    }
}

fn parse_error(path: &Path, message: impl ToString) -> GeodataError {
    GeodataError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn parse_csv(path: &Path) -> Result<Frame, GeodataError> {
    let mut file = File::open(path).map_err(|err| parse_error(path, err))?;
    Frame::read_csv_inferred(&mut file).map_err(|err| parse_error(path, err))
}

fn parse_shapefile(path: &Path) -> Result<Frame, GeodataError> {
    let crs = fs::read_to_string(path.with_extension("prj"))
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    let header = dbf_field_order(path);

    let mut reader = shapefile::Reader::from_path(path).map_err(|err| parse_error(path, err))?;
    let mut columns = ColumnSet::default();
    let mut geometry = Vec::new();
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item.map_err(|err| parse_error(path, err))?;
        geometry.push(shape_geometry(&shape).map_err(|err| parse_error(path, err))?);
        columns.push_row(record.into_iter().map(|(name, value)| (name, field_cell(value))));
    }

    let mut named = columns.into_columns();
    named.sort_by_key(|(name, _)| {
        let position = header.get(name).copied().unwrap_or(usize::MAX);
        (position, name.clone())
    });
    Frame::from_cells(named, Some(geometry), crs)
}

/// Column positions from the `.dbf` header, so attributes keep their
/// published order. Missing or unreadable headers fall back to name order.
fn dbf_field_order(path: &Path) -> HashMap<String, usize> {
    match shapefile::dbase::Reader::from_path(path.with_extension("dbf")) {
        Ok(reader) => reader
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name().to_string(), index))
            .collect(),
        Err(_) => HashMap::new(),
    }
}

fn field_cell(value: FieldValue) -> Cell {
    match value {
        FieldValue::Character(Some(text)) => Cell::Text(text),
        FieldValue::Numeric(Some(number)) => number_cell(number),
        FieldValue::Float(Some(number)) => Cell::Float(f64::from(number)),
        FieldValue::Integer(number) => Cell::Int(i64::from(number)),
        FieldValue::Double(number) => Cell::Float(number),
        FieldValue::Logical(Some(flag)) => Cell::Bool(flag),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None) => Cell::Null,
        other => Cell::Text(format!("{other:?}")),
    }
}

fn number_cell(number: f64) -> Cell {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Cell::Int(number as i64)
    } else {
        Cell::Float(number)
    }
}

trait Xy {
    fn position(&self) -> Vec<f64>;
}

impl Xy for Point {
    fn position(&self) -> Vec<f64> {
        vec![self.x, self.y]
    }
}

impl Xy for PointM {
    fn position(&self) -> Vec<f64> {
        vec![self.x, self.y]
    }
}

impl Xy for PointZ {
    fn position(&self) -> Vec<f64> {
        vec![self.x, self.y]
    }
}

fn positions<P: Xy>(points: &[P]) -> Vec<Vec<f64>> {
    points.iter().map(Xy::position).collect()
}

fn lines_value<P: Xy>(parts: &[Vec<P>]) -> Value {
    let mut lines = parts.iter().map(|part| positions(part)).collect::<Vec<_>>();
    if lines.len() == 1 {
        Value::LineString(lines.remove(0))
    } else {
        Value::MultiLineString(lines)
    }
}

/// Each outer ring opens a polygon; inner rings are holes of the polygon
/// opened most recently.
fn polygon_value<P: Xy>(rings: &[PolygonRing<P>]) -> Value {
    let mut polygons: Vec<Vec<Vec<Vec<f64>>>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(vec![positions(points)]),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(polygon) => polygon.push(positions(points)),
                None => polygons.push(vec![positions(points)]),
            },
        }
    }
    if polygons.len() == 1 {
        Value::Polygon(polygons.remove(0))
    } else {
        Value::MultiPolygon(polygons)
    }
}

/// GeoJSON text for one shape; null shapes and multipatches have none.
pub fn shape_geometry(shape: &Shape) -> Result<Option<String>, serde_json::Error> {
    let value = match shape {
        Shape::NullShape | Shape::Multipatch(_) => return Ok(None),
        Shape::Point(point) => Value::Point(point.position()),
        Shape::PointM(point) => Value::Point(point.position()),
        Shape::PointZ(point) => Value::Point(point.position()),
        Shape::Polyline(line) => lines_value(line.parts()),
        Shape::PolylineM(line) => lines_value(line.parts()),
        Shape::PolylineZ(line) => lines_value(line.parts()),
        Shape::Polygon(polygon) => polygon_value(polygon.rings()),
        Shape::PolygonM(polygon) => polygon_value(polygon.rings()),
        Shape::PolygonZ(polygon) => polygon_value(polygon.rings()),
        Shape::Multipoint(points) => Value::MultiPoint(positions(points.points())),
        Shape::MultipointM(points) => Value::MultiPoint(positions(points.points())),
        Shape::MultipointZ(points) => Value::MultiPoint(positions(points.points())),
    };
    serde_json::to_string(&Geometry::new(value)).map(Some)
}

fn parse_geojson(path: &Path) -> Result<Frame, GeodataError> {
    let text = fs::read_to_string(path).map_err(|err| parse_error(path, err))?;
    parse_geojson_str(&text).map_err(|err| parse_error(path, err))
}

pub fn parse_geojson_str(text: &str) -> Result<Frame, GeodataError> {
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|err| GeodataError::Frame(err.to_string()))?;
    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(collection) => {
            (collection.features, collection.foreign_members)
        }
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(geometry) => (vec![Feature::from(geometry)], None),
    };

    let crs = foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .map(|crs| {
            crs.pointer("/properties/name")
                .and_then(|name| name.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| crs.to_string())
        })
        .unwrap_or_else(|| GEOJSON_DEFAULT_CRS.to_string());

    let mut columns = ColumnSet::default();
    let mut geometry = Vec::with_capacity(features.len());
    for feature in features {
        let shape = feature
            .geometry
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| GeodataError::Frame(err.to_string()))?;
        geometry.push(shape);
        let properties = feature.properties.unwrap_or_default();
        columns.push_row(
            properties
                .into_iter()
                .map(|(name, value)| (name, json_cell(value))),
        );
    }

    Frame::from_cells(columns.into_columns(), Some(geometry), Some(crs))
}

fn json_cell(value: serde_json::Value) -> Cell {
    match value {
        serde_json::Value::Null => Cell::Null,
        serde_json::Value::Bool(flag) => Cell::Bool(flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => Cell::Int(int),
            None => number.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        },
        serde_json::Value::String(text) => Cell::Text(text),
        other => Cell::Text(other.to_string()),
    }
}

/// Accumulates ragged rows into aligned columns in first-seen order.
#[derive(Default)]
struct ColumnSet {
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
    rows: usize,
}

impl ColumnSet {
    fn push_row(&mut self, cells: impl Iterator<Item = (String, Cell)>) {
        for (name, cell) in cells {
            let index = match self.names.iter().position(|known| *known == name) {
                Some(index) => index,
                None => {
                    self.names.push(name);
                    self.columns.push(vec![Cell::Null; self.rows]);
                    self.names.len() - 1
                }
            };
            self.columns[index].push(cell);
        }
        self.rows += 1;
        for column in &mut self.columns {
            column.resize(self.rows, Cell::Null);
        }
    }

    fn into_columns(self) -> Vec<(String, Vec<Cell>)> {
        self.names.into_iter().zip(self.columns).collect()
    }
}
