//! Parquet input sources
//!
//! A [`Source`] is a named, read-only byte source that the parquet reader can
//! open any number of times from offset 0. Files are read on demand; buffers
//! are shared without copying.

use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::Result as ParquetResult;
use parquet::file::reader::{ChunkReader, Length};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum SourceData {
    File(Arc<File>),
    Memory(Bytes),
}

/// A named Parquet byte source
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    data: SourceData,
}

impl Source {
    /// Open a file; the display name is the file name without directories
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            data: SourceData::File(Arc::new(file)),
        })
    }

    /// Wrap an in-memory buffer (e.g. an uploaded file)
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: SourceData::Memory(data.into()),
        }
    }

    /// Display name used in outputs, warnings and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the underlying data in bytes
    pub fn size(&self) -> u64 {
        Length::len(self)
    }

    /// Open a fresh reader builder positioned at the start of the data
    pub(crate) fn reader_builder(&self) -> ParquetResult<ParquetRecordBatchReaderBuilder<Source>> {
        ParquetRecordBatchReaderBuilder::try_new(self.clone())
    }

    /// Copy the whole byte source into a new file at `path`
    #[cfg(feature = "join")]
    pub(crate) fn write_to(&self, path: &Path) -> std::io::Result<u64> {
        use std::io::{self, Seek, SeekFrom, Write};

        let mut out = File::create(path)?;
        let copied = match &self.data {
            SourceData::File(file) => {
                let mut reader = file.try_clone()?;
                reader.seek(SeekFrom::Start(0))?;
                io::copy(&mut reader, &mut out)?
            }
            SourceData::Memory(bytes) => {
                out.write_all(bytes)?;
                bytes.len() as u64
            }
        };
        out.flush()?;
        Ok(copied)
    }
}

impl Length for Source {
    fn len(&self) -> u64 {
        match &self.data {
            SourceData::File(file) => Length::len(file.as_ref()),
            SourceData::Memory(bytes) => bytes.len() as u64,
        }
    }
}

impl ChunkReader for Source {
    type T = Box<dyn Read + Send>;

    fn get_read(&self, start: u64) -> ParquetResult<Self::T> {
        match &self.data {
            SourceData::File(file) => {
                let reader = ChunkReader::get_read(file.as_ref(), start)?;
                Ok(Box::new(reader))
            }
            SourceData::Memory(bytes) => {
                let reader = ChunkReader::get_read(bytes, start)?;
                Ok(Box::new(reader))
            }
        }
    }

    fn get_bytes(&self, start: u64, length: usize) -> ParquetResult<Bytes> {
        match &self.data {
            SourceData::File(file) => ChunkReader::get_bytes(file.as_ref(), start, length),
            SourceData::Memory(bytes) => ChunkReader::get_bytes(bytes, start, length),
        }
    }
}
