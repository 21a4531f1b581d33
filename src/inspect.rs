//! Schema inspection and previews
//!
//! Reads only the Parquet footer for the summary, and at most one row group
//! for a preview. Never scans the whole file.

use crate::error::{ConvertError, Result};
use crate::source::Source;
use crate::transcode::is_complex;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use tracing::info;

/// Semantic column category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    String,
    Timestamp,
    List,
    Struct,
    Map,
    Other,
}

impl ColumnKind {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnKind::Integer,
            DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => ColumnKind::Float,
            DataType::Boolean => ColumnKind::Boolean,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnKind::String,
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                ColumnKind::Timestamp
            }
            DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => {
                ColumnKind::List
            }
            DataType::Struct(_) => ColumnKind::Struct,
            DataType::Map(_, _) => ColumnKind::Map,
            DataType::Dictionary(_, value) => ColumnKind::of(value),
            _ => ColumnKind::Other,
        }
    }
}

/// One field of a source schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    /// Arrow type as displayed by Arrow, e.g. `List(Field { .. })`
    pub data_type: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    /// Whether the column is written as JSON text when flattening
    pub complex: bool,
}

/// Footer-level summary of a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub num_rows: u64,
    pub num_columns: usize,
    pub num_row_groups: usize,
    pub fields: Vec<FieldSummary>,
}

/// Summary plus the first rows of the first row group
#[derive(Debug, Clone)]
pub struct Preview {
    pub summary: SourceSummary,
    pub rows: RecordBatch,
}

/// Read the Arrow schema of a source
pub fn read_schema(source: &Source) -> Result<SchemaRef> {
    let builder = source
        .reader_builder()
        .map_err(|e| ConvertError::unreadable(source.name(), e))?;
    Ok(builder.schema().clone())
}

/// Summarize a source from its footer
pub fn inspect(source: &Source) -> Result<SourceSummary> {
    let builder = source
        .reader_builder()
        .map_err(|e| ConvertError::unreadable(source.name(), e))?;
    Ok(summarize(source.name(), builder.schema(), builder.metadata()))
}

/// Summarize a source and read up to `num_rows` rows from its first row group
pub fn preview(source: &Source, num_rows: usize) -> Result<Preview> {
    let builder = source
        .reader_builder()
        .map_err(|e| ConvertError::unreadable(source.name(), e))?;
    let summary = summarize(source.name(), builder.schema(), builder.metadata());
    let schema = builder.schema().clone();

    let rows = if summary.num_row_groups == 0 || num_rows == 0 {
        RecordBatch::new_empty(schema)
    } else {
        let mut reader = builder
            .with_row_groups(vec![0])
            .with_batch_size(num_rows)
            .with_limit(num_rows)
            .build()
            .map_err(|e| ConvertError::unreadable(source.name(), e))?;

        match reader.next() {
            Some(batch) => batch.map_err(|e| ConvertError::unreadable(source.name(), e))?,
            None => RecordBatch::new_empty(schema),
        }
    };

    info!(
        "Preview loaded: {} total rows, showing {} rows",
        summary.num_rows,
        rows.num_rows()
    );

    Ok(Preview { summary, rows })
}

fn summarize(
    name: &str,
    schema: &SchemaRef,
    metadata: &parquet::file::metadata::ParquetMetaData,
) -> SourceSummary {
    let fields = schema
        .fields()
        .iter()
        .map(|f| FieldSummary {
            name: f.name().clone(),
            data_type: f.data_type().to_string(),
            kind: ColumnKind::of(f.data_type()),
            nullable: f.is_nullable(),
            complex: is_complex(f.data_type()),
        })
        .collect::<Vec<_>>();

    SourceSummary {
        name: name.to_string(),
        num_rows: metadata.file_metadata().num_rows().max(0) as u64,
        num_columns: fields.len(),
        num_row_groups: metadata.num_row_groups(),
        fields,
    }
}
