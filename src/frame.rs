//! In-memory tabular and geospatial frames backed by an Arrow `RecordBatch`.
//!
//! Geospatial frames carry a `geometry` column holding one GeoJSON geometry
//! per row and record their coordinate reference system under the `crs`
//! schema metadata key.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray, new_null_array,
};
use arrow::compute::{cast, concat_batches, filter_record_batch};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, Writer};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::GeodataError;

pub const GEOMETRY_COLUMN: &str = "geometry";
pub const CRS_METADATA_KEY: &str = "crs";

#[derive(Debug, Clone)]
pub struct Frame {
    batch: RecordBatch,
}

impl Frame {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn empty() -> Self {
        Self::new(RecordBatch::new_empty(Arc::new(Schema::empty())))
    }

    /// Builds an all-Utf8 frame; every column must have the same length.
    pub fn from_string_columns(
        columns: Vec<(&str, Vec<Option<String>>)>,
    ) -> Result<Self, GeodataError> {
        let fields = columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>();
        let arrays = columns
            .into_iter()
            .map(|(_, values)| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect::<Vec<_>>();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self::new(batch))
    }

    /// Builds a frame from inferred cell columns plus an optional geometry
    /// column and CRS.
    pub fn from_cells(
        columns: Vec<(String, Vec<Cell>)>,
        geometry: Option<Vec<Option<String>>>,
        crs: Option<String>,
    ) -> Result<Self, GeodataError> {
        let mut fields = Vec::with_capacity(columns.len() + 1);
        let mut arrays = Vec::with_capacity(columns.len() + 1);
        for (name, cells) in columns {
            let (data_type, array) = build_column(cells);
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }
        if let Some(geometry) = geometry {
            fields.push(Field::new(GEOMETRY_COLUMN, DataType::Utf8, true));
            arrays.push(Arc::new(StringArray::from(geometry)) as ArrayRef);
        }
        let mut metadata = HashMap::new();
        if let Some(crs) = crs {
            metadata.insert(CRS_METADATA_KEY.to_string(), crs);
        }
        let schema = Schema::new(fields).with_metadata(metadata);
        let batch = if arrays.is_empty() {
            RecordBatch::new_empty(Arc::new(schema))
        } else {
            RecordBatch::try_new(Arc::new(schema), arrays)?
        };
        Ok(Self::new(batch))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.column_by_name(name).is_some()
    }

    pub fn is_geospatial(&self) -> bool {
        self.has_column(GEOMETRY_COLUMN)
    }

    pub fn crs(&self) -> Option<&str> {
        self.batch
            .schema_ref()
            .metadata()
            .get(CRS_METADATA_KEY)
            .map(String::as_str)
    }

    /// Column values rendered as text, whatever their Arrow type.
    pub fn string_values(&self, name: &str) -> Result<Vec<Option<String>>, GeodataError> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| GeodataError::MissingColumn(name.to_string()))?;
        let text = cast(column, &DataType::Utf8)?;
        Ok(text
            .as_string::<i32>()
            .iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    pub fn filter(&self, mask: &BooleanArray) -> Result<Frame, GeodataError> {
        Ok(Self::new(filter_record_batch(&self.batch, mask)?))
    }

    /// Stacks frames top to bottom in the given order. Columns are unioned
    /// in first-seen order; a column absent from a frame is null there, and
    /// a column whose type differs between frames becomes Utf8.
    pub fn concat(frames: Vec<Frame>) -> Result<Frame, GeodataError> {
        let Some(first) = frames.first() else {
            return Ok(Frame::empty());
        };

        let mut union: Vec<(String, DataType)> = Vec::new();
        for frame in &frames {
            for field in frame.batch.schema_ref().fields() {
                match union.iter_mut().find(|(name, _)| name == field.name()) {
                    Some((_, data_type)) if data_type != field.data_type() => {
                        *data_type = DataType::Utf8;
                    }
                    Some(_) => {}
                    None => union.push((field.name().clone(), field.data_type().clone())),
                }
            }
        }

        if union.is_empty() {
            return Ok(Frame::empty());
        }

        let fields = union
            .iter()
            .map(|(name, data_type)| Field::new(name, data_type.clone(), true))
            .collect::<Vec<_>>();
        let schema = Arc::new(
            Schema::new(fields).with_metadata(first.batch.schema_ref().metadata().clone()),
        );

        let mut aligned = Vec::with_capacity(frames.len());
        for frame in &frames {
            let rows = frame.num_rows();
            let mut columns = Vec::with_capacity(union.len());
            for (name, data_type) in &union {
                let column = match frame.batch.column_by_name(name) {
                    Some(column) if column.data_type() == data_type => column.clone(),
                    Some(column) => cast(column, data_type)?,
                    None => new_null_array(data_type, rows),
                };
                columns.push(column);
            }
            aligned.push(RecordBatch::try_new(schema.clone(), columns)?);
        }

        Ok(Self::new(concat_batches(&schema, &aligned)?))
    }

    pub fn write_csv(&self, file: &mut File) -> Result<(), GeodataError> {
        let mut writer = Writer::new(file);
        writer.write(&self.batch)?;
        Ok(())
    }

    /// Reads a csv with every column typed Utf8, so codes like `06` keep
    /// their leading zeros.
    pub fn read_csv_as_strings(file: &mut File) -> Result<Frame, GeodataError> {
        let (header, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut *file, Some(1))?;
        let fields = header
            .fields()
            .iter()
            .map(|field| Field::new(field.name(), DataType::Utf8, true))
            .collect::<Vec<_>>();
        rewind(file)?;
        read_csv_with_schema(file, Arc::new(Schema::new(fields)))
    }

    /// Reads a csv, inferring column types over every record.
    pub fn read_csv_inferred(file: &mut File) -> Result<Frame, GeodataError> {
        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut *file, None)?;
        rewind(file)?;
        read_csv_with_schema(file, Arc::new(schema))
    }

    pub fn write_parquet(&self, file: &mut File) -> Result<(), GeodataError> {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, self.batch.schema(), Some(props))?;
        writer.write(&self.batch)?;
        writer.close()?;
        Ok(())
    }

    pub fn read_parquet(file: File) -> Result<Frame, GeodataError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(concat_batches(&schema, &batches)?))
    }
}

fn rewind(file: &mut File) -> Result<(), GeodataError> {
    file.seek(SeekFrom::Start(0))
        .map(|_| ())
        .map_err(|err| GeodataError::Filesystem(err.to_string()))
}

fn read_csv_with_schema(file: &mut File, schema: SchemaRef) -> Result<Frame, GeodataError> {
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Frame::new(concat_batches(&schema, &batches)?))
}

/// One attribute value before its column type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn into_text(self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(value) => Some(value.to_string()),
            Cell::Int(value) => Some(value.to_string()),
            Cell::Float(value) => Some(value.to_string()),
            Cell::Text(value) => Some(value),
        }
    }
}

/// Picks the narrowest Arrow type that holds every non-null cell: Boolean,
/// Int64, Float64 (ints and floats mixed), otherwise Utf8.
pub fn build_column(cells: Vec<Cell>) -> (DataType, ArrayRef) {
    let mut saw_bool = false;
    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_text = false;
    for cell in &cells {
        match cell {
            Cell::Null => {}
            Cell::Bool(_) => saw_bool = true,
            Cell::Int(_) => saw_int = true,
            Cell::Float(_) => saw_float = true,
            Cell::Text(_) => saw_text = true,
        }
    }

    let numeric = saw_int || saw_float;
    if saw_text || (saw_bool && numeric) || !(saw_bool || numeric) {
        let values = cells.into_iter().map(Cell::into_text).collect::<Vec<_>>();
        return (DataType::Utf8, Arc::new(StringArray::from(values)));
    }

    if saw_bool {
        let values = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Bool(value) => Some(value),
                _ => None,
            })
            .collect::<Vec<_>>();
        return (DataType::Boolean, Arc::new(BooleanArray::from(values)));
    }

    if saw_float {
        let values = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Int(value) => Some(value as f64),
                Cell::Float(value) => Some(value),
                _ => None,
            })
            .collect::<Vec<_>>();
        return (DataType::Float64, Arc::new(Float64Array::from(values)));
    }

    let values = cells
        .into_iter()
        .map(|cell| match cell {
            Cell::Int(value) => Some(value),
            _ => None,
        })
        .collect::<Vec<_>>();
    (DataType::Int64, Arc::new(Int64Array::from(values)))
}
