//! UNION merge: concatenate the rows of every source under one schema

use super::unify::{unify_schemas, SchemaWarning, UnifiedSchema};
use crate::config::ConvertOptions;
use crate::error::{ConvertError, Result};
use crate::progress::FileProgress;
use crate::source::Source;
use crate::transcode::flatten::{flatten_column, is_complex};
use crate::transcode::BatchTranscoder;
use arrow::array::{new_null_array, Array, ArrayRef, StringArray, StringBuilder};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Options for the union merger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionOptions {
    /// CSV output options
    pub convert: ConvertOptions,

    /// Append a column with each row's source file name
    pub add_source_column: bool,
}

impl UnionOptions {
    pub fn new(convert: ConvertOptions) -> Self {
        Self {
            convert,
            add_source_column: false,
        }
    }

    pub fn with_source_column(mut self, add_source_column: bool) -> Self {
        self.add_source_column = add_source_column;
        self
    }
}

/// Result of a union merge
#[derive(Debug, Clone, Default)]
pub struct UnionStats {
    pub rows: u64,
    pub files: usize,
    pub columns: usize,
    /// Encoded bytes written to the sink
    pub bytes: u64,
    pub warnings: Vec<SchemaWarning>,
}

/// Merge every source into one CSV document
pub fn merge_union(
    sources: &[Source],
    options: &UnionOptions,
    on_progress: Option<FileProgress<'_>>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    merge_union_to_writer(sources, options, &mut out, on_progress)?;
    Ok(out)
}

/// Merge every source, streaming CSV text into `sink`
///
/// Rows appear in input order: all rows of the first source, then the second,
/// and so on. The header, if requested, is written exactly once.
pub fn merge_union_to_writer<W: Write>(
    sources: &[Source],
    options: &UnionOptions,
    sink: &mut W,
    mut on_progress: Option<FileProgress<'_>>,
) -> Result<UnionStats> {
    options.convert.validate()?;
    info!("Starting UNION merge of {} files", sources.len());

    let (mut unified, warnings) = unify_schemas(sources)?;
    if let Some((file, reason)) = warnings.iter().find_map(|w| match w {
        SchemaWarning::Unreadable { file, reason } => Some((file, reason)),
        _ => None,
    }) {
        return Err(ConvertError::merge(file, reason));
    }
    if options.add_source_column {
        unified = unified.with_source_column();
    }

    let total = sources.len();
    let mut transcoder = BatchTranscoder::new(sink, &options.convert);

    for (i, source) in sources.iter().enumerate() {
        let name = source.name();
        info!("Reading file {}/{}: {}", i + 1, total, name);
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(i, total, name);
        }

        let reader = source
            .reader_builder()
            .and_then(|b| b.with_batch_size(options.convert.batch_size).build())
            .map_err(|e| ConvertError::merge(name, e))?;

        let label = options.add_source_column.then_some(name);
        for batch in reader {
            let batch = batch.map_err(|e| ConvertError::merge(name, e))?;
            let aligned =
                cast_to_unified(&batch, &unified, label).map_err(|e| ConvertError::merge(name, e))?;
            transcoder
                .write_batch(&aligned)
                .map_err(|e| ConvertError::merge(name, e))?;
        }
        debug!(file = name, rows = transcoder.rows_written(), "Source merged");
    }

    let label = sources.last().map(|s| s.name()).unwrap_or("union");
    transcoder
        .write_pending_header(unified.schema())
        .map_err(|e| ConvertError::merge(label, e))?;
    let rows = transcoder.rows_written();
    let bytes = transcoder.bytes_written();
    transcoder
        .finish(unified.schema())
        .map_err(|e| ConvertError::merge(label, e))?;

    info!("UNION merge complete: {} rows from {} files", rows, total);
    Ok(UnionStats {
        rows,
        files: total,
        columns: unified.schema().fields().len(),
        bytes,
        warnings,
    })
}

/// Rewrite a batch into the unified schema
///
/// Columns missing from the batch become null columns. Columns whose type
/// differs are converted to the unified type. `source_label` fills the
/// source-file column when the unified schema has one.
pub fn cast_to_unified(
    batch: &RecordBatch,
    unified: &UnifiedSchema,
    source_label: Option<&str>,
) -> std::result::Result<RecordBatch, ArrowError> {
    let schema = unified.schema();
    let rows = batch.num_rows();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        if unified.source_column() == Some(field.name().as_str()) {
            let label = source_label.unwrap_or_default();
            columns.push(Arc::new(StringArray::from_iter_values(
                std::iter::repeat(label).take(rows),
            )));
            continue;
        }

        let column = match batch.column_by_name(field.name()) {
            Some(column) => column,
            None => {
                columns.push(new_null_array(field.data_type(), rows));
                continue;
            }
        };

        columns.push(coerce(column, field.data_type())?);
    }

    RecordBatch::try_new(schema.clone(), columns)
}

fn coerce(column: &ArrayRef, target: &DataType) -> std::result::Result<ArrayRef, ArrowError> {
    let from = column.data_type();
    if from == target {
        return Ok(column.clone());
    }

    if *target == DataType::Utf8 && is_complex(from) {
        return Ok(flatten_with_nulls(column.as_ref()));
    }

    if can_cast_types(from, target) {
        // Safe casting: values that cannot be converted become null
        return cast(column, target);
    }

    if *target == DataType::Utf8 {
        return display_text(column.as_ref());
    }

    debug!(from = %from, to = %target, "No conversion available, filling with nulls");
    Ok(new_null_array(target, column.len()))
}

/// JSON text, keeping nulls as nulls so the column can stay nullable
fn flatten_with_nulls(array: &dyn Array) -> ArrayRef {
    let text = flatten_column(array);
    if array.null_count() == 0 {
        return text;
    }
    let text = text.as_any().downcast_ref::<StringArray>();
    let values = (0..array.len()).map(|row| {
        if array.is_null(row) {
            None
        } else {
            text.map(|t| t.value(row))
        }
    });
    Arc::new(values.collect::<StringArray>())
}

/// Per-value display text for types the cast kernels cannot convert
fn display_text(array: &dyn Array) -> std::result::Result<ArrayRef, ArrowError> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * 8);
    for row in 0..array.len() {
        if array.is_null(row) {
            builder.append_null();
            continue;
        }
        match formatter.value(row).try_to_string() {
            Ok(text) => builder.append_value(text),
            Err(_) => builder.append_null(),
        }
    }
    Ok(Arc::new(builder.finish()))
}
