//! Single-file Parquet to CSV conversion
//!
//! Streams fixed-size batches from one source through the batch transcoder.
//! Memory use is bounded by the batch size, not the file size.

use crate::config::ConvertOptions;
use crate::error::{ConvertError, Result};
use crate::progress::RowProgress;
use crate::source::Source;
use crate::transcode::BatchTranscoder;
use std::io::Write;
use tracing::{debug, info};

/// Statistics from a conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub rows: u64,
    pub batches: usize,
    /// Encoded bytes written to the sink
    pub bytes: u64,
}

/// Convert a source into CSV bytes
///
/// Nothing is returned unless the whole source converted successfully.
pub fn convert(
    source: &Source,
    options: &ConvertOptions,
    on_progress: Option<RowProgress<'_>>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    convert_to_writer(source, options, &mut out, on_progress)?;
    Ok(out)
}

/// Convert a source, streaming CSV text into `sink`
pub fn convert_to_writer<W: Write>(
    source: &Source,
    options: &ConvertOptions,
    sink: &mut W,
    mut on_progress: Option<RowProgress<'_>>,
) -> Result<ConvertStats> {
    options.validate()?;
    let name = source.name();
    info!(
        "Starting Parquet to CSV conversion of {} (batch_size={})",
        name, options.batch_size
    );

    let builder = source
        .reader_builder()
        .map_err(|e| ConvertError::unreadable(name, e))?;
    let total_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;
    let schema = builder.schema().clone();

    let reader = builder
        .with_batch_size(options.batch_size)
        .build()
        .map_err(|e| ConvertError::conversion(name, e))?;

    let mut transcoder = BatchTranscoder::new(sink, options);
    let mut batches = 0;

    for batch in reader {
        let batch = batch.map_err(|e| ConvertError::conversion(name, e))?;
        transcoder
            .write_batch(&batch)
            .map_err(|e| ConvertError::conversion(name, e))?;
        batches += 1;

        debug!(batch = batches, rows = batch.num_rows(), "Batch transcoded");
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(transcoder.rows_written(), total_rows);
        }
    }

    transcoder
        .write_pending_header(&schema)
        .map_err(|e| ConvertError::conversion(name, e))?;
    let rows = transcoder.rows_written();
    let bytes = transcoder.bytes_written();
    transcoder
        .finish(&schema)
        .map_err(|e| ConvertError::conversion(name, e))?;

    info!("Conversion complete: {} rows, {} bytes written", rows, bytes);
    Ok(ConvertStats {
        rows,
        batches,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{complex_batch, parquet_bytes, simple_batch};
    use crate::transcode::OutputEncoding;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn simple_source() -> Source {
        Source::from_bytes("simple.parquet", parquet_bytes(&[simple_batch()], None))
    }

    #[test]
    fn test_convert_simple_file() {
        let csv = convert(&simple_source(), &ConvertOptions::default(), None).unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "id,name,score");
        assert_eq!(lines[1], "1,Alice,95.5");
        assert_eq!(lines[5], "5,Eve,94.7");
    }

    #[test]
    fn test_convert_without_header() {
        let options = ConvertOptions::default().with_header(false);
        let text = String::from_utf8(convert(&simple_source(), &options, None).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(!lines[0].contains("id"));
    }

    #[test]
    fn test_convert_with_semicolon_separator() {
        let options = ConvertOptions::default().with_delimiter(b';');
        let text = String::from_utf8(convert(&simple_source(), &options, None).unwrap()).unwrap();
        assert_eq!(text.lines().next().unwrap(), "id;name;score");
        assert!(text.contains("2;Bob;87.3"));
    }

    #[test]
    fn test_small_batches_keep_order_and_single_header() {
        let options = ConvertOptions::default().with_batch_size(2);
        let mut progress = Vec::new();
        let mut cb = |done: u64, total: u64| progress.push((done, total));

        let text =
            String::from_utf8(convert(&simple_source(), &options, Some(&mut cb)).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(text.matches("id,name,score").count(), 1);
        let ids: Vec<&str> = lines[1..].iter().map(|l| &l[..1]).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(progress, vec![(2, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_convert_complex_types_to_json() {
        let source = Source::from_bytes("complex.parquet", parquet_bytes(&[complex_batch()], None));
        let text = String::from_utf8(convert(&source, &ConvertOptions::default(), None).unwrap())
            .unwrap();

        assert_eq!(text.lines().count(), 4);
        assert!(text.contains(r#""[""python"", ""data""]""#));
        assert!(text.contains(r#""{""city"": ""Paris"", ""age"": 30}""#));
    }

    #[test]
    fn test_convert_complex_without_flattening_fails() {
        let source = Source::from_bytes("complex.parquet", parquet_bytes(&[complex_batch()], None));
        let options = ConvertOptions::default().with_flatten_complex(false);
        let err = convert(&source, &options, None).unwrap_err();
        assert!(matches!(err, ConvertError::Conversion { .. }));
    }

    #[test]
    fn test_convert_empty_file_writes_header() {
        let source = Source::from_bytes(
            "empty.parquet",
            parquet_bytes(&[RecordBatch::new_empty(simple_batch().schema())], None),
        );
        let mut calls = 0;
        let mut cb = |_: u64, _: u64| calls += 1;
        let mut out = Vec::new();
        let stats =
            convert_to_writer(&source, &ConvertOptions::default(), &mut out, Some(&mut cb)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name,score\n");
        assert_eq!(calls, 0);
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.bytes, 14);
    }

    #[test]
    fn test_convert_latin1() {
        let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["Café", "Ñoño"]))],
        )
        .unwrap();
        let source = Source::from_bytes("names.parquet", parquet_bytes(&[batch], None));

        let options = ConvertOptions::default().with_encoding(OutputEncoding::Latin1);
        let mut csv = Vec::new();
        let stats = convert_to_writer(&source, &options, &mut csv, None).unwrap();
        assert_eq!(csv, b"name\nCaf\xe9\n\xd1o\xf1o\n");
        // Counted after encoding: one byte per accented character
        assert_eq!(stats.bytes, csv.len() as u64);
        assert_eq!(stats.bytes, 15);
    }

    #[test]
    fn test_convert_unreadable_source() {
        let source = Source::from_bytes("broken.parquet", b"garbage".to_vec());
        let err = convert(&source, &ConvertOptions::default(), None).unwrap_err();
        assert!(matches!(err, ConvertError::SourceUnreadable { .. }));
        assert!(err.to_string().contains("broken.parquet"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ConvertOptions::default().with_batch_size(0);
        let err = convert(&simple_source(), &options, None).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }
}
