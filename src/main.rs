//! parquet2csv - Streaming Parquet to CSV Converter
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use parquet2csv::config::{validate_output_path, CliArgs, Command, ConvertOptions, CsvArgs};
use parquet2csv::merge::{unify_schemas, UnionOptions};
use parquet2csv::progress::{print_header, print_summary, print_warnings, ProgressReporter};
use parquet2csv::{convert_to_writer, inspect, merge_union_to_writer, package_many_report, Source};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose)?;

    let show_progress = !args.quiet;
    match args.command {
        Command::Inspect { input, rows, json } => run_inspect(&input, rows, json),
        Command::Convert { input, output, csv } => run_convert(&input, output, &csv, show_progress),
        Command::Archive {
            inputs,
            output,
            csv,
        } => run_archive(&inputs, &output, &csv, show_progress),
        Command::Unify { inputs } => run_unify(&inputs),
        Command::Union {
            inputs,
            output,
            add_source_column,
            csv,
        } => run_union(&inputs, &output, add_source_column, &csv, show_progress),
        #[cfg(feature = "join")]
        Command::Join {
            inputs,
            key,
            join_type,
            output,
            csv,
        } => run_join(&inputs, &key, &join_type, &output, &csv, show_progress),
    }
}

fn run_inspect(input: &Path, rows: usize, json: bool) -> Result<()> {
    let source = open_source(input)?;
    let preview = inspect::preview(&source, rows)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview.summary)?);
        return Ok(());
    }

    let summary = &preview.summary;
    println!("File:       {}", summary.name);
    println!("Rows:       {}", summary.num_rows);
    println!("Columns:    {}", summary.num_columns);
    println!("Row groups: {}", summary.num_row_groups);
    println!();
    for field in &summary.fields {
        let flags = match (field.nullable, field.complex) {
            (true, true) => " (nullable, json)",
            (true, false) => " (nullable)",
            (false, true) => " (json)",
            (false, false) => "",
        };
        println!("  {:<24} {}{}", field.name, field.data_type, flags);
    }

    if preview.rows.num_rows() > 0 {
        println!();
        println!("{}", pretty_format_batches(&[preview.rows.clone()])?);
    }
    Ok(())
}

fn run_convert(
    input: &Path,
    output: Option<PathBuf>,
    csv: &CsvArgs,
    show_progress: bool,
) -> Result<()> {
    let options = ConvertOptions::from_args(csv).context("Invalid configuration")?;
    let output = output.unwrap_or_else(|| input.with_extension("csv"));
    validate_output_path(&output, &[input.to_path_buf()])?;

    if show_progress {
        print_header("convert", &display_paths(&[input.to_path_buf()]), &output.display().to_string());
    }

    let source = open_source(input)?;
    let start = Instant::now();
    let progress = show_progress.then(|| ProgressReporter::rows(0));
    let mut on_rows = |done: u64, total: u64| {
        if let Some(p) = &progress {
            p.update_rows(done, total);
        }
    };

    let stats = write_output(&output, |sink| {
        Ok(convert_to_writer(&source, &options, sink, Some(&mut on_rows))?)
    })?;

    if let Some(p) = &progress {
        p.finish("Conversion complete");
        print_summary(
            "Conversion complete",
            1,
            Some(stats.rows),
            start.elapsed(),
            &output.display().to_string(),
            Some(stats.bytes),
        );
    }
    Ok(())
}

fn run_archive(inputs: &[PathBuf], output: &Path, csv: &CsvArgs, show_progress: bool) -> Result<()> {
    let options = ConvertOptions::from_args(csv).context("Invalid configuration")?;
    validate_output_path(output, inputs)?;

    if show_progress {
        print_header("archive", &display_paths(inputs), &output.display().to_string());
    }

    let sources = open_sources(inputs)?;
    let start = Instant::now();
    let progress = show_progress.then(|| ProgressReporter::files(sources.len()));
    let mut on_file = |done: usize, total: usize, label: &str| {
        if let Some(p) = &progress {
            p.update_files(done, total, label);
        }
    };

    let report = package_many_report(&sources, &options, Some(&mut on_file))?;
    fs::write(output, &report.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(p) = &progress {
        p.finish_and_clear();
    }
    if report.failures() > 0 {
        warn!("{} of {} files failed to convert", report.failures(), sources.len());
        let failed: Vec<String> = report
            .entries
            .iter()
            .filter(|e| !e.is_success())
            .map(|e| format!("see {} in the archive", e.entry()))
            .collect();
        print_warnings(&failed);
    }
    if show_progress {
        print_summary(
            "Archive complete",
            sources.len(),
            None,
            start.elapsed(),
            &output.display().to_string(),
            Some(report.bytes.len() as u64),
        );
    }
    Ok(())
}

fn run_unify(inputs: &[PathBuf]) -> Result<()> {
    let sources = open_sources(inputs)?;
    let (unified, warnings) = unify_schemas(&sources)?;

    println!("Unified schema ({} columns):", unified.fields().len());
    for field in unified.fields() {
        let marker = if field.promoted { " (promoted to text)" } else { "" };
        println!(
            "  {:<24} {:<12} present in {}/{}{}",
            field.field.name(),
            field.field.data_type().to_string(),
            field.present_in.len(),
            sources.len(),
            marker
        );
    }
    print_warnings(&warnings);
    Ok(())
}

fn run_union(
    inputs: &[PathBuf],
    output: &Path,
    add_source_column: bool,
    csv: &CsvArgs,
    show_progress: bool,
) -> Result<()> {
    let options = UnionOptions::new(ConvertOptions::from_args(csv).context("Invalid configuration")?)
        .with_source_column(add_source_column);
    validate_output_path(output, inputs)?;

    if show_progress {
        print_header("union", &display_paths(inputs), &output.display().to_string());
    }

    let sources = open_sources(inputs)?;
    let start = Instant::now();
    let progress = show_progress.then(|| ProgressReporter::files(sources.len()));
    let mut on_file = |done: usize, total: usize, label: &str| {
        if let Some(p) = &progress {
            p.update_files(done, total, label);
        }
    };

    let stats = write_output(output, |sink| {
        Ok(merge_union_to_writer(&sources, &options, sink, Some(&mut on_file))?)
    })?;

    if let Some(p) = &progress {
        p.finish_and_clear();
    }
    print_warnings(&stats.warnings);
    if show_progress {
        print_summary(
            "Union complete",
            stats.files,
            Some(stats.rows),
            start.elapsed(),
            &output.display().to_string(),
            Some(stats.bytes),
        );
    }
    Ok(())
}

#[cfg(feature = "join")]
fn run_join(
    inputs: &[PathBuf],
    key: &str,
    join_type: &str,
    output: &Path,
    csv: &CsvArgs,
    show_progress: bool,
) -> Result<()> {
    use parquet2csv::config::JoinOptions;
    use parquet2csv::merge_join;

    let options = JoinOptions::from_args(key, join_type, csv).context("Invalid configuration")?;
    validate_output_path(output, inputs)?;

    if show_progress {
        print_header(
            &format!("{} join on '{}'", options.join_type, options.key),
            &display_paths(inputs),
            &output.display().to_string(),
        );
    }

    let sources = open_sources(inputs)?;
    let start = Instant::now();
    let progress = show_progress.then(|| ProgressReporter::files(sources.len() + 1));
    let mut on_step = |done: usize, total: usize, label: &str| {
        if let Some(p) = &progress {
            p.update_files(done, total, label);
        }
    };

    let csv_bytes = merge_join(&sources, &options, Some(&mut on_step))?;
    fs::write(output, &csv_bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(p) = &progress {
        p.finish_and_clear();
        let rows = csv_bytes.iter().filter(|&&b| b == b'\n').count().saturating_sub(1);
        print_summary(
            "Join complete",
            sources.len(),
            Some(rows as u64),
            start.elapsed(),
            &output.display().to_string(),
            Some(csv_bytes.len() as u64),
        );
    }
    Ok(())
}

fn open_source(path: &Path) -> Result<Source> {
    Source::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn open_sources(paths: &[PathBuf]) -> Result<Vec<Source>> {
    paths.iter().map(|p| open_source(p)).collect()
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Stream into `path`, removing the partial file if the writer fails
fn write_output<T>(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<T>) -> Result<T> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut sink = BufWriter::new(file);

    let result = write(&mut sink).and_then(|value| {
        sink.flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(value)
    });

    if result.is_err() {
        drop(sink);
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    } else {
        info!("Wrote {}", path.display());
    }
    result
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("parquet2csv=debug,warn")
    } else {
        EnvFilter::new("parquet2csv=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
