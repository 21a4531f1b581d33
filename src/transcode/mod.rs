//! Batch transcoding
//!
//! Turns Arrow record batches into delimited text:
//!
//! 1. complex columns are flattened to JSON text (optional)
//! 2. the batch is written with Arrow's CSV writer (RFC 4180 quoting)
//! 3. the UTF-8 text is re-encoded into the requested output encoding
//!
//! # Module Structure
//!
//! - `flatten`: list/struct/map → JSON text
//! - `encoding`: UTF-8 → latin-1 / windows-1252

pub mod encoding;
pub mod flatten;

pub use encoding::OutputEncoding;
pub use flatten::{flatten_batch, is_complex, CellValue};

use crate::config::ConvertOptions;
use crate::error::TranscodeResult;
use arrow::csv::WriterBuilder;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use std::io::Write;

/// Streaming batch-to-text writer
///
/// The header is written with the first batch only. If the stream ends
/// without any batch, [`BatchTranscoder::finish`] still writes the header.
pub struct BatchTranscoder<W: Write> {
    sink: W,
    delimiter: u8,
    encoding: OutputEncoding,
    flatten_complex: bool,
    header_pending: bool,
    started: bool,
    scratch: Vec<u8>,
    rows_written: u64,
    bytes_written: u64,
}

impl<W: Write> BatchTranscoder<W> {
    pub fn new(sink: W, options: &ConvertOptions) -> Self {
        Self {
            sink,
            delimiter: options.delimiter,
            encoding: options.encoding,
            flatten_complex: options.flatten_complex,
            header_pending: options.include_header,
            started: false,
            scratch: Vec::new(),
            rows_written: 0,
            bytes_written: 0,
        }
    }

    /// Transcode one batch and append it to the sink
    pub fn write_batch(&mut self, batch: &RecordBatch) -> TranscodeResult<()> {
        let prepared = if self.flatten_complex {
            flatten_batch(batch)?
        } else {
            batch.clone()
        };

        self.scratch.clear();
        {
            let mut writer = WriterBuilder::new()
                .with_header(self.header_pending)
                .with_delimiter(self.delimiter)
                .build(&mut self.scratch);
            writer.write(&prepared)?;
        }
        self.header_pending = false;
        self.started = true;

        if self.encoding.is_utf8() {
            self.sink.write_all(&self.scratch)?;
            self.bytes_written += self.scratch.len() as u64;
        } else {
            let text = String::from_utf8_lossy(&self.scratch);
            let encoded = self.encoding.encode(&text);
            self.sink.write_all(&encoded)?;
            self.bytes_written += encoded.len() as u64;
        }

        self.rows_written += batch.num_rows() as u64;
        Ok(())
    }

    /// Rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Encoded bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write the header of a stream that has seen no batches yet
    ///
    /// Does nothing once a batch has been written or when the header is off.
    pub fn write_pending_header(&mut self, schema: &SchemaRef) -> TranscodeResult<()> {
        if !self.started && self.header_pending {
            self.write_batch(&RecordBatch::new_empty(schema.clone()))?;
        }
        Ok(())
    }

    /// Finish the stream and hand back the sink
    ///
    /// `schema` is only used to emit the header of a stream that saw no
    /// batches.
    pub fn finish(mut self, schema: &SchemaRef) -> TranscodeResult<W> {
        self.write_pending_header(schema)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Transcode a single batch into encoded text
pub fn transcode_batch(
    batch: &RecordBatch,
    options: &ConvertOptions,
    include_header: bool,
) -> TranscodeResult<Vec<u8>> {
    let options = options.clone().with_header(include_header);
    let mut transcoder = BatchTranscoder::new(Vec::new(), &options);
    transcoder.write_batch(batch)?;
    transcoder.finish(&batch.schema())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, ListBuilder, StringArray, StringBuilder};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![
                    Some("Alice"),
                    Some("Smith, Bob"),
                    Some("say \"hi\""),
                ])),
                Arc::new(Float64Array::from(vec![95.5, 87.25, 92.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_header_and_quoting() {
        let out = transcode_batch(&sample_batch(), &ConvertOptions::default(), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "id,name,score");
        assert_eq!(lines[1], "1,Alice,95.5");
        assert_eq!(lines[2], "2,\"Smith, Bob\",87.25");
        assert_eq!(lines[3], "3,\"say \"\"hi\"\"\",92.0");
    }

    #[test]
    fn test_custom_delimiter_without_header() {
        let options = ConvertOptions::default().with_delimiter(b';');
        let out = transcode_batch(&sample_batch(), &options, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().next().unwrap(), "1;Alice;95.5");
        // The comma no longer needs quoting
        assert!(text.contains("2;Smith, Bob;87.25"));
    }

    #[test]
    fn test_header_only_on_first_batch() {
        let mut transcoder = BatchTranscoder::new(Vec::new(), &ConvertOptions::default());
        transcoder.write_batch(&sample_batch()).unwrap();
        transcoder.write_batch(&sample_batch()).unwrap();
        assert_eq!(transcoder.rows_written(), 6);

        let out = transcoder.finish(&sample_batch().schema()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 7);
        assert_eq!(text.matches("id,name,score").count(), 1);
    }

    #[test]
    fn test_empty_stream_still_writes_header() {
        let transcoder = BatchTranscoder::new(Vec::new(), &ConvertOptions::default());
        let out = transcoder.finish(&sample_batch().schema()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name,score\n");

        let options = ConvertOptions::default().with_header(false);
        let transcoder = BatchTranscoder::new(Vec::new(), &options);
        assert!(transcoder.finish(&sample_batch().schema()).unwrap().is_empty());
    }

    #[test]
    fn test_reencodes_output() {
        let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["Café", "日本"]))],
        )
        .unwrap();

        let options = ConvertOptions::default().with_encoding(OutputEncoding::Latin1);
        let out = transcode_batch(&batch, &options, true).unwrap();
        assert_eq!(out, b"name\nCaf\xe9\n??\n");
    }

    #[test]
    fn test_complex_column_requires_flattening() {
        let mut builder = ListBuilder::new(StringBuilder::new());
        builder.values().append_value("a");
        builder.append(true);
        let tags: ArrayRef = Arc::new(builder.finish());
        let schema = Arc::new(Schema::new(vec![Field::new(
            "tags",
            tags.data_type().clone(),
            true,
        )]));
        let batch = RecordBatch::try_new(schema, vec![tags]).unwrap();

        let flat = transcode_batch(&batch, &ConvertOptions::default(), true).unwrap();
        assert_eq!(String::from_utf8(flat).unwrap(), "tags\n\"[\"\"a\"\"]\"\n");

        let options = ConvertOptions::default().with_flatten_complex(false);
        assert!(transcode_batch(&batch, &options, true).is_err());
    }
}
