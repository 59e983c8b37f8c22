//! Incremental two-column CSV output.
//!
//! Every processed company lands in the file before the next one starts,
//! so a crash mid-job loses at most the in-flight row. Writing is
//! two-tier: a properly quoted record first, then a stripped-down
//! emergency line if that fails, and only then is the row given up on.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

/// What happened to one appended row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Fully quoted record written and flushed.
    Written,
    /// Primary write failed; a sanitized fallback line was recorded.
    Degraded,
    /// Both tiers failed; the row is lost.
    Dropped,
}

pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Create (or truncate) the output file and write the fixed header.
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        let mut file = File::create(path)?;
        file.write_all(b"Company,Website\n")?;

        let writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(file);

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Append one `(company, website)` row, flushing before returning.
    /// Never fails outward; the outcome reports which tier succeeded.
    pub fn append_row(&mut self, company: &str, website: &str) -> AppendOutcome {
        match self.write_quoted(company, website) {
            Ok(()) => AppendOutcome::Written,
            Err(err) => {
                warn!(company, error = %err, "primary csv write failed, trying degraded row");
                match self.write_degraded(company, website) {
                    Ok(()) => AppendOutcome::Degraded,
                    Err(err) => {
                        error!(company, error = %err, "dropping csv row after degraded write failed");
                        AppendOutcome::Dropped
                    }
                }
            }
        }
    }

    fn write_quoted(&mut self, company: &str, website: &str) -> Result<(), csv::Error> {
        self.writer.write_record([company, website])?;
        self.writer.flush()?;
        Ok(())
    }

    /// Emergency tier: bypass the csv writer and append a line stripped to
    /// characters that cannot upset quoting or the encoder.
    fn write_degraded(&mut self, company: &str, website: &str) -> io::Result<()> {
        let line = format!(
            "\"{}\",\"{}\"\n",
            degrade_text(company),
            degrade_url(website)
        );
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Replace everything outside word characters and whitespace with a space.
fn degrade_text(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Drop everything outside word characters, whitespace and URL punctuation.
fn degrade_url(value: &str) -> String {
    value
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | ':' | '.' | '/' | '\\' | '-')
                || c.is_whitespace()
        })
        .collect()
}
