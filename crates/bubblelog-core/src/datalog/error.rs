//! Log file errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing or reading log files
#[derive(Error, Debug)]
pub enum LogError {
    /// Creating, writing or reading the file failed
    #[error("I/O error on log file: {0}")]
    Io(#[from] std::io::Error),

    /// A file is already open
    #[error("Already recording to {0}")]
    AlreadyRecording(PathBuf),

    /// Acquisition stopped after a lost connection
    #[error("Acquisition has halted, recording is not possible")]
    Halted,

    /// No `[DATA]` marker near the top of the file
    #[error("Incorrect file format. Could not find [DATA] section.")]
    MissingDataSection,

    /// Header lacks the date or time line
    #[error("Incorrect file format. Header needs a date and a time line.")]
    IncompleteHeader,

    /// A required column is absent
    #[error("Incorrect file format. Missing column '{0}'.")]
    MissingColumn(String),

    /// A data cell is not a number
    #[error("Invalid value '{value}' in column '{column}' on data row {row}")]
    InvalidValue {
        /// Zero-based data row
        row: usize,
        /// Column name
        column: String,
        /// Cell text
        value: String,
    },

    /// The data table itself is malformed
    #[error("Malformed data table: {0}")]
    Table(#[from] csv::Error),
}
