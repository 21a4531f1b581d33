//! Progress reporting
//!
//! The conversion engine reports progress through plain synchronous callbacks.
//! The CLI renders them with indicatif progress bars.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Called after each batch with (rows processed, total rows)
pub type RowProgress<'a> = &'a mut dyn FnMut(u64, u64);

/// Called per file with (files done, total files, current label)
pub type FileProgress<'a> = &'a mut dyn FnMut(usize, usize, &str);

/// Progress bar for row- or file-based work
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar counting rows of a single file
    pub fn rows(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({eta})")
                .expect("Invalid progress template")
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Bar counting files of a multi-file operation
    pub fn files(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress template")
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Row callback target
    pub fn update_rows(&self, done: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(done);
    }

    /// File callback target
    pub fn update_files(&self, done: usize, total: usize, label: &str) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
        self.bar.set_message(label.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of a finished operation
pub fn print_summary(
    title: &str,
    files: usize,
    rows: Option<u64>,
    duration: Duration,
    output: &str,
    output_size: Option<u64>,
) {
    let duration_secs = duration.as_secs_f64();

    println!();
    println!("{}", style(title).green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Files:").bold(), format_number(files as u64));
    if let Some(rows) = rows {
        let rate = if duration_secs > 0.0 {
            rows as f64 / duration_secs
        } else {
            0.0
        };
        println!(
            "  {} {} ({:.0} rows/sec)",
            style("Rows:").bold(),
            format_number(rows),
            rate
        );
    }
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    match output_size {
        Some(size) => println!(
            "  {} {} ({})",
            style("Output:").bold(),
            output,
            format_size(size, BINARY)
        ),
        None => println!("  {} {}", style("Output:").bold(), output),
    }
    println!();
}

/// Print a header at the start of an operation
pub fn print_header(operation: &str, inputs: &[String], output: &str) {
    println!();
    println!(
        "{} {}",
        style("parquet2csv").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Operation:").bold(), operation);
    for input in inputs {
        println!("  {} {}", style("Input:").bold(), input);
    }
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

/// Print warnings produced while unifying schemas
pub fn print_warnings<T: std::fmt::Display>(warnings: &[T]) {
    for warning in warnings {
        eprintln!("{} {}", style("warning:").yellow().bold(), warning);
    }
}
