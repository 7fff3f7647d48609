//! Log file format
//!
//! Header block and data line framing shared by the recorder and reader.

use chrono::{DateTime, Local};
use std::io::{self, Write};

use super::{LogEntry, LogHeader};

/// Marker line opening the header block
pub const HEADER_MARKER: &str = "[HEADER]";

/// Marker line opening the data block
pub const DATA_MARKER: &str = "[DATA]";

/// Units and accuracy of each column
pub const UNITS_ROW: &str = "[s]\t[±0.015 °C]\t[±0.008 bar]";

/// Column names, in file order
pub const COLUMNS: [&str; 3] = ["time", "temp", "pres"];

/// Write the complete header block, up to and including the column names
pub fn write_header<W: Write>(writer: &mut W, header: &LogHeader) -> io::Result<()> {
    writeln!(writer, "{}", HEADER_MARKER)?;
    writeln!(writer, "{}", header.date)?;
    writeln!(writer, "{}", header.time)?;
    for line in &header.comments {
        writeln!(writer, "{}", line)?;
    }
    writeln!(writer)?;
    writeln!(writer, "{}", DATA_MARKER)?;
    writeln!(writer, "{}", UNITS_ROW)?;
    writeln!(writer, "{}", COLUMNS.join("\t"))?;
    Ok(())
}

/// Format one data line without its line ending
pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "{:.1}\t{:.3}\t{:.3}",
        entry.elapsed.as_secs_f64(),
        entry.temperature,
        entry.pressure
    )
}

/// Write one data line
pub fn write_entry<W: Write>(writer: &mut W, entry: &LogEntry) -> io::Result<()> {
    writeln!(writer, "{}", format_entry(entry))
}

/// File name for a session started at `at`, e.g. `221014_103000.txt`
pub fn session_filename(at: DateTime<Local>) -> String {
    format!("{}.txt", at.format("%y%m%d_%H%M%S"))
}
