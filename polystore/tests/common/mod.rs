//! Shared CSV fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;

use polystore::BackendKind;
use tempfile::NamedTempFile;

/// Header as exported by the OECD dataset.
pub const HEADER: &str =
    "\"LOCATION\",\"INDICATOR\",\"SUBJECT\",\"MEASURE\",\"FREQUENCY\",\"TIME\",\"Value\",\"Flag Codes\"";

/// Every registered backend identifier.
pub fn all_backends() -> Vec<&'static str> {
    BackendKind::all().iter().map(BackendKind::id).collect()
}

/// One data line in the export's layout. Flag codes are left off, as in
/// most lines of the real file.
pub fn line(country: &str, frequency: &str, time: &str, value: &str) -> String {
    format!("\"{country}\",\"PRINTO01\",\"TOT\",\"IXOBSA\",\"{frequency}\",\"{time}\",\"{value}\"")
}

/// A data line cut off before its `Value` column.
pub fn ragged_line(country: &str, frequency: &str, time: &str) -> String {
    format!("\"{country}\",\"PRINTO01\",\"TOT\",\"IXOBSA\",\"{frequency}\",\"{time}\"")
}

/// Write `header` and `lines` to a temp file.
pub fn write_csv(header: &str, lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    writeln!(file, "{header}").expect("write header");
    for l in lines {
        writeln!(file, "{l}").expect("write line");
    }
    file.flush().expect("flush csv");
    file
}

/// Write monthly `(country, time, value)` rows under the standard header.
pub fn monthly_csv(rows: &[(&str, &str, &str)]) -> NamedTempFile {
    let lines: Vec<String> = rows
        .iter()
        .map(|(country, time, value)| line(country, "M", time, value))
        .collect();
    write_csv(HEADER, &lines)
}
