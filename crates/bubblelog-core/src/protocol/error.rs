//! Device communication errors

use thiserror::Error;

/// Errors that can occur while talking to an acquisition device
///
/// These never escape a [`SampleSource`](crate::source::SampleSource) poll as
/// anything other than a counted failure; the scheduler folds them into the
/// source's [`ConnectionStatus`](crate::source::ConnectionStatus).
#[derive(Error, Debug)]
pub enum SourceError {
    /// The serial port layer reported an error
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No complete reply before the deadline
    #[error("Device did not answer in time")]
    Timeout,

    /// The device was closed or never connected
    #[error("Not connected to device")]
    NotConnected,

    /// A reply that does not parse
    #[error("Invalid response from device: {0:?}")]
    InvalidResponse(String),

    /// No port carries the expected device
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// A device answered with the wrong identity
    #[error("Identity mismatch: expected '{expected}', got '{actual}'")]
    IdentityMismatch {
        /// Identity from the configuration
        expected: String,
        /// Identity the device reported
        actual: String,
    },

    /// The blocking poll task crashed
    #[error("Poll task failed: {0}")]
    Task(String),

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the error came from a read that ran past its deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            SourceError::Timeout => true,
            SourceError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
