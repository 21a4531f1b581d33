//! Multi-file conversion into a ZIP archive
//!
//! Each source becomes one `<stem>.csv` entry. A source that fails to convert
//! gets a `<name>.error.txt` entry instead, and the remaining sources are
//! still converted.

use crate::config::ConvertOptions;
use crate::convert::convert;
use crate::error::Result;
use crate::progress::FileProgress;
use crate::source::Source;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Outcome of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Converted { source: String, entry: String, bytes: usize },
    Failed { source: String, entry: String, reason: String },
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EntryOutcome::Converted { .. })
    }

    /// Name of the entry written to the archive
    pub fn entry(&self) -> &str {
        match self {
            EntryOutcome::Converted { entry, .. } | EntryOutcome::Failed { entry, .. } => entry,
        }
    }
}

/// Archive bytes plus per-source outcomes
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub bytes: Vec<u8>,
    pub entries: Vec<EntryOutcome>,
}

impl ArchiveReport {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_success()).count()
    }
}

/// Swap the last extension of a file name for `.csv`
///
/// A name whose only dot is the leading one (`.hidden`) has no extension and
/// keeps its full text: `.hidden.csv`.
pub fn csv_entry_name(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    format!("{}.csv", stem)
}

/// Convert every source and package the results as a ZIP archive
pub fn package_many(
    sources: &[Source],
    options: &ConvertOptions,
    on_progress: Option<FileProgress<'_>>,
) -> Result<Vec<u8>> {
    Ok(package_many_report(sources, options, on_progress)?.bytes)
}

/// Same as [`package_many`], also returning what happened to each source
pub fn package_many_report(
    sources: &[Source],
    options: &ConvertOptions,
    mut on_progress: Option<FileProgress<'_>>,
) -> Result<ArchiveReport> {
    options.validate()?;
    info!("Converting {} files to ZIP archive", sources.len());

    let total = sources.len();
    let zip_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used_names = HashSet::new();
    let mut entries = Vec::with_capacity(total);

    for (i, source) in sources.iter().enumerate() {
        let name = source.name();
        info!("Processing file {}/{}: {}", i + 1, total, name);
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(i, total, name);
        }

        match convert(source, options, None) {
            Ok(csv) => {
                let entry = unique_name(&mut used_names, csv_entry_name(name));
                zip.start_file(entry.as_str(), zip_options)?;
                zip.write_all(&csv)?;
                info!("Added {} to archive ({} bytes)", entry, csv.len());
                entries.push(EntryOutcome::Converted {
                    source: name.to_string(),
                    entry,
                    bytes: csv.len(),
                });
            }
            Err(e) => {
                error!("Failed to process {}: {}", name, e);
                let entry = unique_name(&mut used_names, format!("{}.error.txt", name));
                let message = format!("Error converting {}: {}", name, e);
                zip.start_file(entry.as_str(), zip_options)?;
                zip.write_all(message.as_bytes())?;
                entries.push(EntryOutcome::Failed {
                    source: name.to_string(),
                    entry,
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(cb) = on_progress.as_deref_mut() {
        cb(total, total, "Complete");
    }

    let bytes = zip.finish()?.into_inner();
    info!("ZIP archive created: {} bytes", bytes.len());
    Ok(ArchiveReport { bytes, entries })
}

/// Disambiguate repeated entry names: `a.csv`, `a_2.csv`, `a_3.csv`
fn unique_name(used: &mut HashSet<String>, candidate: String) -> String {
    if used.insert(candidate.clone()) {
        return candidate;
    }

    let (stem, ext) = match candidate.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
        None => (candidate.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let name = format!("{}_{}{}", stem, n, ext);
        if used.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{parquet_bytes, simple_batch};
    use std::io::Read;
    use zip::ZipArchive;

    fn simple_source(name: &str) -> Source {
        Source::from_bytes(name, parquet_bytes(&[simple_batch()], None))
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_csv_entry_name() {
        assert_eq!(csv_entry_name("file1.parquet"), "file1.csv");
        assert_eq!(csv_entry_name("data.v2.parquet"), "data.v2.csv");
        assert_eq!(csv_entry_name("noext"), "noext.csv");
        assert_eq!(csv_entry_name(".hidden"), ".hidden.csv");
        assert_eq!(csv_entry_name(".hidden.parquet"), ".hidden.csv");
    }

    #[test]
    fn test_convert_multiple_to_zip() {
        let sources = vec![simple_source("file1.parquet"), simple_source("file2.parquet")];
        let bytes = package_many(&sources, &ConvertOptions::default(), None).unwrap();

        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"file1.csv"));
        assert!(names.contains(&"file2.csv"));
        assert!(read_entry(&bytes, "file1.csv").contains("Alice"));
    }

    #[test]
    fn test_corrupt_file_is_isolated() {
        let sources = vec![
            simple_source("a.parquet"),
            Source::from_bytes("b.parquet", b"corrupt".to_vec()),
            simple_source("c.parquet"),
        ];
        let mut calls = Vec::new();
        let mut cb = |done: usize, total: usize, label: &str| calls.push((done, total, label.to_string()));

        let report = package_many_report(&sources, &ConvertOptions::default(), Some(&mut cb)).unwrap();
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.entries[1].entry(), "b.parquet.error.txt");

        assert_eq!(read_entry(&report.bytes, "a.csv").lines().count(), 6);
        assert_eq!(read_entry(&report.bytes, "c.csv").lines().count(), 6);
        let error_text = read_entry(&report.bytes, "b.parquet.error.txt");
        assert!(error_text.starts_with("Error converting b.parquet:"));

        assert_eq!(
            calls,
            vec![
                (0, 3, "a.parquet".to_string()),
                (1, 3, "b.parquet".to_string()),
                (2, 3, "c.parquet".to_string()),
                (3, 3, "Complete".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let sources = vec![simple_source("data.parquet"), simple_source("data.parquet")];
        let report = package_many_report(&sources, &ConvertOptions::default(), None).unwrap();
        assert_eq!(report.entries[0].entry(), "data.csv");
        assert_eq!(report.entries[1].entry(), "data_2.csv");
    }

    #[test]
    fn test_options_apply_to_every_entry() {
        let sources = vec![simple_source("data.parquet")];
        let options = ConvertOptions::default().with_delimiter(b';');
        let bytes = package_many(&sources, &options, None).unwrap();
        let content = read_entry(&bytes, "data.csv");
        assert!(content.starts_with("id;name;score\n"));
    }
}
