//! Data Logging
//!
//! Records readings to tab-separated text files and reads them back.
//!
//! ```text
//! [HEADER]
//! 14-10-2022
//! 10:30:00
//! <operator comments>
//!
//! [DATA]
//! [s]	[±0.015 °C]	[±0.008 bar]
//! time	temp	pres
//! 0.0	20.123	1.013
//! ```

mod error;
mod format;
mod reader;
mod recorder;

pub use error::LogError;
pub use format::{
    format_entry, session_filename, write_entry, write_header, COLUMNS, DATA_MARKER,
    HEADER_MARKER, UNITS_ROW,
};
pub use reader::{LogFile, MAX_SCAN_LINES};
pub use recorder::{FileLogger, RecorderState};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header block written once when recording starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    /// Date as dd-MM-yyyy
    pub date: String,
    /// Time as HH:mm:ss
    pub time: String,
    /// Free-text operator comment lines
    pub comments: Vec<String>,
}

impl LogHeader {
    /// Header stamped with `at`
    pub fn at(at: DateTime<Local>, comments: Vec<String>) -> Self {
        Self {
            date: at.format("%d-%m-%Y").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            comments,
        }
    }

    /// Header stamped with the current local time
    pub fn now(comments: Vec<String>) -> Self {
        Self::at(Local::now(), comments)
    }

    /// Split a multi-line comment text into header lines
    pub fn comment_lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.trim_end().to_string()).collect()
    }
}

/// A single data line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Time since recording started
    pub elapsed: Duration,
    /// Temperature [°C]
    pub temperature: f64,
    /// Pressure [bar]
    pub pressure: f64,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(elapsed: Duration, temperature: f64, pressure: f64) -> Self {
        Self {
            elapsed,
            temperature,
            pressure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_header_stamp_format() {
        let at = Local.with_ymd_and_hms(2022, 10, 14, 10, 30, 0).unwrap();
        let header = LogHeader::at(at, vec![]);
        assert_eq!(header.date, "14-10-2022");
        assert_eq!(header.time, "10:30:00");
    }

    #[test]
    fn test_comment_lines() {
        assert_eq!(
            LogHeader::comment_lines("note A\nnote B  \n"),
            vec!["note A".to_string(), "note B".to_string()]
        );
        assert!(LogHeader::comment_lines("").is_empty());
    }
}
