//! Error types for parquet2csv
//!
//! This module defines the error hierarchy for the conversion engine:
//! - Source and conversion failures for single files
//! - Merge failures for UNION and JOIN operations
//! - Configuration errors raised while validating options
//!
//! Every user-facing variant carries the file name and the underlying cause
//! as text, so the message can be shown as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for parquet2csv
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The byte stream is not valid Parquet or its schema cannot be read
    #[error("Cannot read Parquet file '{name}': {reason}")]
    SourceUnreadable { name: String, reason: String },

    /// A read or transcode failure in the middle of a single-file conversion
    #[error("Failed to convert '{name}' to CSV: {reason}")]
    Conversion { name: String, reason: String },

    /// Any source failure during a UNION merge
    #[error("Union merge failed on '{name}': {reason}")]
    Merge { name: String, reason: String },

    /// None of the supplied sources had a readable schema
    #[error("No readable schema among {count} source file(s)")]
    NoReadableSchema { count: usize },

    /// Too few sources for a join
    #[error("Join requires at least {required} files, got {supplied}")]
    InsufficientSources { required: usize, supplied: usize },

    /// The join key is absent from one of the sources
    #[error("Join key '{key}' not found in '{name}'")]
    JoinKeyMissing { key: String, name: String },

    /// The join query failed
    #[error("Join failed: {reason}")]
    Join { reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// ZIP archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub(crate) fn unreadable(name: &str, reason: impl std::fmt::Display) -> Self {
        ConvertError::SourceUnreadable {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn conversion(name: &str, reason: impl std::fmt::Display) -> Self {
        ConvertError::Conversion {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn merge(name: &str, reason: impl std::fmt::Display) -> Self {
        ConvertError::Merge {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The source file this error is attributed to, if any
    pub fn source_name(&self) -> Option<&str> {
        match self {
            ConvertError::SourceUnreadable { name, .. }
            | ConvertError::Conversion { name, .. }
            | ConvertError::Merge { name, .. }
            | ConvertError::JoinKeyMissing { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Low-level failures while decoding, casting or rendering a batch
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFusion query error
    #[cfg(feature = "join")]
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Delimiter is not a single ASCII character
    #[error("Invalid delimiter '{value}': must be a single ASCII character, or one of tab, comma, semicolon, pipe")]
    InvalidDelimiter { value: String },

    /// Unknown output encoding
    #[error("Unsupported encoding '{value}': expected utf-8, latin-1 or windows-1252")]
    InvalidEncoding { value: String },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Unknown join type
    #[error("Invalid join type '{value}': expected inner, left, right or full")]
    InvalidJoinType { value: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Result type alias for ConvertError
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Result type alias for TranscodeError
pub type TranscodeResult<T> = std::result::Result<T, TranscodeError>;
