//! parquet2csv - Streaming Parquet to CSV Conversion
//!
//! Converts Parquet files into delimited text one bounded batch at a time,
//! and merges several files into a single CSV document.
//!
//! # Features
//!
//! - **Streaming Conversion**: Files are read in fixed-size batches, so memory
//!   use depends on the batch size rather than the file size.
//!
//! - **Complex Types**: List, struct and map columns are written as single-line
//!   JSON text in a single CSV cell.
//!
//! - **Archives**: Many files can be converted into one ZIP archive. A file
//!   that fails gets an error entry and does not stop the others.
//!
//! - **Merges**: UNION stacks rows under a unified schema; JOIN combines files
//!   on a shared key column (feature `join`, backed by DataFusion).
//!
//! # Architecture
//!
//! ```text
//!  Source (file / bytes)
//!        │
//!        ▼
//!  ParquetRecordBatchReader ──► RecordBatch ──┐
//!                                             │
//!         ┌───────────────────────────────────┤
//!         │                                   │
//!   merge::union                         merge::join
//!   (cast_to_unified)                   (DataFusion plan)
//!         │                                   │
//!         └──────────────┬────────────────────┘
//!                        ▼
//!               transcode::BatchTranscoder
//!          flatten ─► arrow CSV writer ─► encode
//!                        │
//!                        ▼
//!                 CSV bytes / ZIP entry
//! ```
//!
//! # Example
//!
//! ```bash
//! # Single file
//! parquet2csv convert data.parquet -o data.csv
//!
//! # Stack monthly files, recording where each row came from
//! parquet2csv union jan.parquet feb.parquet --add-source-column -o merged.csv
//!
//! # Join on a key
//! parquet2csv join users.parquet orders.parquet --key user_id --how left
//! ```

pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod inspect;
pub mod merge;
pub mod progress;
pub mod source;
pub mod transcode;

#[cfg(test)]
mod test_util;

pub use archive::{csv_entry_name, package_many, package_many_report, ArchiveReport, EntryOutcome};
pub use config::{ConvertOptions, JoinOptions, JoinType};
pub use convert::{convert, convert_to_writer, ConvertStats};
pub use error::{ConfigError, ConvertError, Result, TranscodeError};
pub use inspect::{inspect, preview, read_schema, Preview, SourceSummary};
pub use merge::{merge_union, merge_union_to_writer, unify_schemas, SchemaWarning, UnionOptions};
pub use source::Source;
pub use transcode::OutputEncoding;

#[cfg(feature = "join")]
pub use merge::merge_join;
