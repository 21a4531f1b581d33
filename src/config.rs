//! Configuration types for parquet2csv
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime conversion options with validation
//! - Join options and join type parsing

use crate::error::ConfigError;
use crate::transcode::OutputEncoding;
use clap::{Args, Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default number of rows per streamed batch
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Default number of rows in a preview
pub const DEFAULT_PREVIEW_ROWS: usize = 50;

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 10_000_000;

/// Convert Parquet files to CSV, or merge several into one CSV
#[derive(Parser, Debug, Clone)]
#[command(
    name = "parquet2csv",
    version,
    about = "Convert Parquet files to CSV, or merge several into one CSV",
    long_about = "Streams Parquet files batch by batch into delimited text.\n\n\
                  Multiple files can be packaged into a ZIP archive, stacked into a single \
                  CSV (union) or joined on a shared key column.",
    after_help = "EXAMPLES:\n    \
        parquet2csv inspect data.parquet -n 10\n    \
        parquet2csv convert data.parquet -o data.csv --delimiter ';'\n    \
        parquet2csv archive a.parquet b.parquet -o converted.zip\n    \
        parquet2csv union jan.parquet feb.parquet --add-source-column\n    \
        parquet2csv join users.parquet orders.parquet --key id --how left"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// CSV output options shared by all writing subcommands
#[derive(Args, Debug, Clone)]
pub struct CsvArgs {
    /// Field delimiter: a single character, or tab/comma/semicolon/pipe
    #[arg(short = 'd', long, default_value = ",", value_name = "CHAR")]
    pub delimiter: String,

    /// Output text encoding (utf-8, latin-1, windows-1252)
    #[arg(short = 'e', long, default_value = "utf-8", value_name = "ENCODING")]
    pub encoding: String,

    /// Omit the header line
    #[arg(long)]
    pub no_header: bool,

    /// Fail on list/struct/map columns instead of writing them as JSON
    #[arg(long)]
    pub no_flatten: bool,

    /// Rows per streamed batch
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub batch_size: usize,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show row counts, schema and the first rows of a Parquet file
    Inspect {
        /// Parquet file to inspect
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Number of preview rows
        #[arg(short = 'n', long, default_value_t = DEFAULT_PREVIEW_ROWS, value_name = "NUM")]
        rows: usize,

        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Convert one Parquet file to CSV
    Convert {
        /// Parquet file to convert
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output CSV file (defaults to <stem>.csv next to the input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        csv: CsvArgs,
    },

    /// Convert several Parquet files into a ZIP archive of CSV files
    Archive {
        /// Parquet files to convert
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output ZIP archive
        #[arg(short, long, default_value = "converted.zip", value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        csv: CsvArgs,
    },

    /// Print the unified schema of several Parquet files
    Unify {
        /// Parquet files to unify
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Stack the rows of several Parquet files into one CSV
    Union {
        /// Parquet files to merge, in output order
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output CSV file
        #[arg(short, long, default_value = "merged.csv", value_name = "FILE")]
        output: PathBuf,

        /// Append a column holding each row's source file name
        #[arg(long)]
        add_source_column: bool,

        #[command(flatten)]
        csv: CsvArgs,
    },

    /// Join several Parquet files on a shared key column
    #[cfg(feature = "join")]
    Join {
        /// Parquet files to join; the first one is the anchor
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Join key column present in every file
        #[arg(short, long, value_name = "COLUMN")]
        key: String,

        /// Join type: inner, left, right, full
        #[arg(long = "how", default_value = "inner", value_name = "TYPE")]
        join_type: String,

        /// Output CSV file
        #[arg(short, long, default_value = "joined.csv", value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        csv: CsvArgs,
    },
}

/// Validated options for converting Parquet batches to CSV text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Field delimiter byte
    pub delimiter: u8,

    /// Output text encoding
    pub encoding: OutputEncoding,

    /// Write a header line before the first batch
    pub include_header: bool,

    /// Serialize list/struct/map columns as JSON text
    pub flatten_complex: bool,

    /// Rows per streamed batch
    pub batch_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: OutputEncoding::Utf8,
            include_header: true,
            flatten_complex: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ConvertOptions {
    /// Create and validate options from CLI arguments
    pub fn from_args(args: &CsvArgs) -> Result<Self, ConfigError> {
        let options = Self {
            delimiter: parse_delimiter(&args.delimiter)?,
            encoding: args.encoding.parse()?,
            include_header: !args.no_header,
            flatten_complex: !args.no_flatten,
            batch_size: args.batch_size,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check invariants that the builder-style fields cannot enforce
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size < MIN_BATCH_SIZE || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(ConfigError::InvalidDelimiter {
                value: (self.delimiter as char).to_string(),
            });
        }

        Ok(())
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn with_flatten_complex(mut self, flatten_complex: bool) -> Self {
        self.flatten_complex = flatten_complex;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Parse a delimiter argument into a single byte
///
/// Accepts a literal single ASCII character or one of the names
/// `tab`, `comma`, `semicolon`, `pipe` (and the escape `\t`).
pub fn parse_delimiter(value: &str) -> Result<u8, ConfigError> {
    let byte = match value.to_ascii_lowercase().as_str() {
        "tab" | "\\t" => b'\t',
        "comma" => b',',
        "semicolon" => b';',
        "pipe" => b'|',
        _ => match value.as_bytes() {
            [b] if b.is_ascii() && !matches!(b, b'"' | b'\n' | b'\r') => *b,
            _ => {
                return Err(ConfigError::InvalidDelimiter {
                    value: value.to_string(),
                })
            }
        },
    };
    Ok(byte)
}

/// Join type applied uniformly to every link of a chained join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl FromStr for JoinType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" | "left-outer" | "left_outer" => Ok(JoinType::Left),
            "right" | "right-outer" | "right_outer" => Ok(JoinType::Right),
            "full" | "outer" | "full-outer" | "full_outer" => Ok(JoinType::Full),
            _ => Err(ConfigError::InvalidJoinType {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
        };
        f.write_str(name)
    }
}

/// Options for the equi-join merger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    /// Column present in every source
    pub key: String,

    /// Join type for every link of the chain
    pub join_type: JoinType,

    /// Field delimiter byte
    pub delimiter: u8,

    /// Output text encoding
    pub encoding: OutputEncoding,

    /// Directory under which the per-call working directory is created
    /// (system temp dir when unset)
    pub temp_root: Option<PathBuf>,
}

impl JoinOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            join_type: JoinType::Inner,
            delimiter: b',',
            encoding: OutputEncoding::Utf8,
            temp_root: None,
        }
    }

    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(temp_root.into());
        self
    }

    /// Create and validate join options from CLI arguments
    pub fn from_args(key: &str, join_type: &str, csv: &CsvArgs) -> Result<Self, ConfigError> {
        let convert = ConvertOptions::from_args(csv)?;
        Ok(Self {
            key: key.to_string(),
            join_type: join_type.parse()?,
            delimiter: convert.delimiter,
            encoding: convert.encoding,
            temp_root: None,
        })
    }

    /// Options used to serialize the joined result
    pub(crate) fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::default()
            .with_delimiter(self.delimiter)
            .with_encoding(self.encoding)
    }
}

/// Check that an output path is writable and does not overwrite an input
pub fn validate_output_path(path: &Path, inputs: &[PathBuf]) -> Result<(), ConfigError> {
    if path.is_dir() {
        return Err(ConfigError::InvalidOutputPath {
            path: path.to_path_buf(),
            reason: "is a directory".into(),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(ConfigError::InvalidOutputPath {
                path: path.to_path_buf(),
                reason: format!("directory '{}' does not exist", parent.display()),
            });
        }
    }

    if inputs.iter().any(|input| input == path) {
        return Err(ConfigError::InvalidOutputPath {
            path: path.to_path_buf(),
            reason: "same as an input file".into(),
        });
    }

    Ok(())
}
