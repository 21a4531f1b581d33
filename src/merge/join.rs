//! Equi-join merge on a shared key column
//!
//! The first source is the anchor. Every later source is joined to it on
//! `anchor.key = source.key` with the same join type, in input order:
//!
//! ```text
//! s0 JOIN s1 ON s0.key = s1.key JOIN s2 ON s0.key = s2.key ...
//! ```
//!
//! The query is built with the DataFusion DataFrame API only. Sources are
//! copied into a private temporary directory that lives for the duration of
//! the call and is removed on every exit path. It is created under
//! [`JoinOptions::temp_root`] when set.

use crate::config::{JoinOptions, JoinType};
use crate::error::{ConvertError, Result, TranscodeResult};
use crate::inspect::read_schema;
use crate::progress::FileProgress;
use crate::source::Source;
use crate::transcode::BatchTranscoder;
use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion::common::{Column, JoinType as PlanJoinType, TableReference};
use datafusion::prelude::{Expr, ParquetReadOptions, SessionConfig, SessionContext};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One column of the joined output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    /// Input index of the source the column comes from
    pub source_index: usize,
    /// Column name in that source
    pub column: String,
    /// Column name in the output
    pub output_name: String,
}

/// Decide the output columns of a join
///
/// Anchor columns come first, key included. Later sources contribute their
/// non-key columns; a name that is already taken gets `_<i>` appended, where
/// `i` is the source's input index, until it is unique.
pub fn plan_projection(schemas: &[SchemaRef], key: &str) -> Vec<ProjectedColumn> {
    let mut used = HashSet::new();
    let mut projection = Vec::new();

    for (index, schema) in schemas.iter().enumerate() {
        for field in schema.fields() {
            let column = field.name();
            if index > 0 && column == key {
                continue;
            }

            let mut output_name = column.clone();
            while used.contains(&output_name) {
                output_name = format!("{}_{}", output_name, index);
            }
            used.insert(output_name.clone());

            projection.push(ProjectedColumn {
                source_index: index,
                column: column.clone(),
                output_name,
            });
        }
    }

    projection
}

/// Join every source on `options.key` and serialize the result as CSV
pub fn merge_join(
    sources: &[Source],
    options: &JoinOptions,
    mut on_progress: Option<FileProgress<'_>>,
) -> Result<Vec<u8>> {
    options.convert_options().validate()?;
    if sources.len() < 2 {
        return Err(ConvertError::InsufficientSources {
            required: 2,
            supplied: sources.len(),
        });
    }

    info!(
        "Starting {} JOIN of {} files on '{}'",
        options.join_type,
        sources.len(),
        options.key
    );

    let mut schemas = Vec::with_capacity(sources.len());
    for source in sources {
        let schema = read_schema(source)?;
        if schema.field_with_name(&options.key).is_err() {
            return Err(ConvertError::JoinKeyMissing {
                key: options.key.clone(),
                name: source.name().to_string(),
            });
        }
        schemas.push(schema);
    }
    let projection = plan_projection(&schemas, &options.key);

    let steps = sources.len() + 1;
    let workdir = match &options.temp_root {
        Some(root) => tempfile::Builder::new()
            .prefix("parquet2csv-join-")
            .tempdir_in(root)?,
        None => tempfile::tempdir()?,
    };
    debug!(dir = %workdir.path().display(), "Join working directory");
    let mut paths = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(i, steps, source.name());
        }
        let path = workdir.path().join(format!("source_{}.parquet", i));
        let bytes = source.write_to(&path)?;
        debug!(file = source.name(), bytes, "Prepared join input");
        paths.push(path);
    }

    if let Some(cb) = on_progress.as_deref_mut() {
        cb(sources.len(), steps, "Executing join");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (schema, batches) = runtime
        .block_on(execute_join(&paths, options, &projection))
        .map_err(join_error)?;

    let mut transcoder = BatchTranscoder::new(Vec::new(), &options.convert_options());
    for batch in &batches {
        let batch = normalize_batch(batch).map_err(join_error)?;
        transcoder.write_batch(&batch).map_err(join_error)?;
    }
    let rows = transcoder.rows_written();
    let out = transcoder
        .finish(&normalize_schema(&schema))
        .map_err(join_error)?;

    if let Some(cb) = on_progress.as_deref_mut() {
        cb(steps, steps, "Complete");
    }

    info!("JOIN complete: {} rows, {} columns", rows, projection.len());
    Ok(out)
}

fn join_error(e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Join {
        reason: e.to_string(),
    }
}

fn alias(index: usize) -> String {
    format!("s{}", index)
}

fn qualified(index: usize, column: &str) -> Expr {
    Expr::Column(Column::new(Some(TableReference::bare(alias(index))), column))
}

fn plan_join_type(join_type: JoinType) -> PlanJoinType {
    match join_type {
        JoinType::Inner => PlanJoinType::Inner,
        JoinType::Left => PlanJoinType::Left,
        JoinType::Right => PlanJoinType::Right,
        JoinType::Full => PlanJoinType::Full,
    }
}

async fn execute_join(
    paths: &[PathBuf],
    options: &JoinOptions,
    projection: &[ProjectedColumn],
) -> TranscodeResult<(SchemaRef, Vec<RecordBatch>)> {
    let config = SessionConfig::new().with_target_partitions(1);
    let ctx = SessionContext::new_with_config(config);

    let mut frames = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let location = path.to_string_lossy();
        let frame = ctx
            .read_parquet(location.as_ref(), ParquetReadOptions::default())
            .await?
            .alias(&alias(i))?;
        frames.push(frame);
    }

    let join_type = plan_join_type(options.join_type);
    let mut frames = frames.into_iter().enumerate();
    let (_, mut joined) = frames
        .next()
        .ok_or_else(|| datafusion::error::DataFusionError::Plan("no join inputs".into()))?;
    for (i, right) in frames {
        let on = qualified(0, &options.key).eq(qualified(i, &options.key));
        joined = joined.join_on(right, join_type, [on])?;
    }

    let select: Vec<Expr> = projection
        .iter()
        .map(|p| qualified(p.source_index, &p.column).alias(&p.output_name))
        .collect();
    let joined = joined.select(select)?;

    let schema = Arc::new(joined.schema().as_arrow().clone());
    let batches = joined.collect().await?;
    Ok((schema, batches))
}

fn plain_type(data_type: &DataType) -> Option<DataType> {
    match data_type {
        DataType::Utf8View => Some(DataType::Utf8),
        DataType::BinaryView => Some(DataType::Binary),
        _ => None,
    }
}

/// Replace view string/binary types with their plain counterparts
fn normalize_schema(schema: &SchemaRef) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match plain_type(f.data_type()) {
            Some(plain) => f.as_ref().clone().with_data_type(plain),
            None => f.as_ref().clone(),
        })
        .collect();
    Arc::new(Schema::new(fields))
}

fn normalize_batch(batch: &RecordBatch) -> TranscodeResult<RecordBatch> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| plain_type(f.data_type()).is_some())
    {
        return Ok(batch.clone());
    }

    let columns = batch
        .columns()
        .iter()
        .map(|column| match plain_type(column.data_type()) {
            Some(plain) => cast(column, &plain),
            None => Ok(column.clone()),
        })
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
    Ok(RecordBatch::try_new(normalize_schema(&schema), columns)?)
}
