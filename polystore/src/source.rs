//! CSV Source - Monthly Row Reader
//!
//! `TigerStyle`: Naive, line-oriented reading of a known-irregular file.
//!
//! The industrial production export is not RFC-4180 clean:
//! - the header carries stray invisible Unicode marks (zero-width spaces, BOM)
//! - every token is wrapped in double quotes
//! - trailing columns (`Flag Codes`) are often missing entirely
//!
//! Lines are split on `,` without quote handling. Header tokens are
//! sanitized down to printable ASCII; data fields are only trimmed and
//! unquoted. Rows whose `FREQUENCY` is not `M` never leave this module.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::{COLUMN_FREQUENCY, SOURCE_DELIMITER, SOURCE_FREQUENCY_MONTHLY};
use crate::model::Datapoint;

// =============================================================================
// Errors
// =============================================================================

/// Errors from reading the CSV source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// File could not be opened
    #[error("data source unavailable: {path}: {message}")]
    Unavailable {
        /// Path that was opened
        path: PathBuf,
        /// Underlying I/O message
        message: String,
    },

    /// Line could not be read (I/O or invalid UTF-8)
    #[error("failed to read line {line}: {message}")]
    Read {
        /// 1-based line number
        line: usize,
        /// Underlying I/O message
        message: String,
    },

    /// Monthly row is missing an identity column (`LOCATION` or `TIME`)
    #[error("line {line}: missing identity column {column}")]
    MalformedRow {
        /// 1-based line number
        line: usize,
        /// Column that was absent
        column: &'static str,
    },
}

// =============================================================================
// RawRow
// =============================================================================

/// One data line keyed by sanitized header token.
///
/// A header column with no field on this line maps to `None` (absent), which
/// is distinct from an empty field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    line: usize,
    fields: HashMap<String, Option<String>>,
}

impl RawRow {
    /// Build a row from a header and one data line.
    #[must_use]
    pub fn parse(header: &[String], line_number: usize, line: &str) -> Self {
        let mut values = line.split(SOURCE_DELIMITER).map(clean_field);
        let fields = header
            .iter()
            .map(|column| (column.clone(), values.next()))
            .collect();

        Self {
            line: line_number,
            fields,
        }
    }

    /// 1-based line number in the source file.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Field value, or `None` if the column is absent on this line or unknown.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Option::as_deref)
    }

    /// True if the header declares `column`, whether or not this line has it.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// True if this is a monthly observation.
    #[must_use]
    pub fn is_monthly(&self) -> bool {
        self.get(COLUMN_FREQUENCY) == Some(SOURCE_FREQUENCY_MONTHLY)
    }
}

/// Trim surrounding whitespace and drop every double quote.
fn clean_field(raw: &str) -> String {
    raw.trim().replace('"', "")
}

/// Header tokens additionally lose everything outside printable ASCII.
fn clean_header_token(raw: &str) -> String {
    clean_field(raw)
        .chars()
        .filter(|c| matches!(c, ' '..='~'))
        .collect()
}

/// Split and sanitize the header line.
#[must_use]
pub fn parse_header(line: &str) -> Vec<String> {
    line.split(SOURCE_DELIMITER).map(clean_header_token).collect()
}

// =============================================================================
// CsvSource
// =============================================================================

/// The flat-file source every load streams from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    /// Create a source for the file at `path`. Nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh stream of monthly rows.
    ///
    /// # Errors
    /// Returns `SourceError::Unavailable` if the file cannot be opened, and
    /// `SourceError::Read` if the header line cannot be read.
    pub fn read_monthly_rows(&self) -> Result<MonthlyRows, SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::Unavailable {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut lines = BufReader::new(file).lines();
        let header = match lines.next() {
            Some(Ok(line)) => parse_header(&line),
            Some(Err(e)) => {
                return Err(SourceError::Read {
                    line: 1,
                    message: e.to_string(),
                })
            }
            None => Vec::new(),
        };

        tracing::debug!(path = %self.path.display(), columns = header.len(), "opened source");

        Ok(MonthlyRows {
            lines,
            header,
            line_number: 1,
            done: false,
        })
    }

    /// Open a fresh stream of datapoints converted from monthly rows.
    ///
    /// # Errors
    /// Same as [`CsvSource::read_monthly_rows`]; per-row failures surface
    /// through the iterator.
    pub fn datapoints(
        &self,
    ) -> Result<impl Iterator<Item = Result<Datapoint, SourceError>>, SourceError> {
        Ok(self
            .read_monthly_rows()?
            .map(|row| row.and_then(|row| Datapoint::from_row(&row))))
    }
}

/// Lazy iterator over the monthly rows of one open source file.
///
/// Fused: after yielding an error it yields nothing further.
#[derive(Debug)]
pub struct MonthlyRows {
    lines: Lines<BufReader<File>>,
    header: Vec<String>,
    line_number: usize,
    done: bool,
}

impl MonthlyRows {
    /// Sanitized header tokens.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl Iterator for MonthlyRows {
    type Item = Result<RawRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = self.lines.next()?;
            self.line_number += 1;

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(SourceError::Read {
                        line: self.line_number,
                        message: e.to_string(),
                    }));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let row = RawRow::parse(&self.header, self.line_number, &line);
            if row.is_monthly() {
                return Some(Ok(row));
            }
        }

        None
    }
}

// =============================================================================
// Tests
// =============================================================================
