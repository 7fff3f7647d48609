//! Acquisition configuration
//!
//! Stored as pretty-printed JSON. Every field has a default matching the
//! bench set-up, so a missing file (or a file with only a few keys) is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Errors raised while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("Invalid configuration file {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A setting is out of range
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Dotted setting name
        field: String,
        /// What is wrong with it
        message: String,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Timing of the acquisition pipeline
    pub daq: DaqSettings,
    /// Pressure microcontroller on the serial port
    pub microcontroller: MicrocontrollerSettings,
    /// Network temperature module
    pub sensor: SensorSettings,
    /// Log file output
    pub log: LogSettings,
}

/// Poll and refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqSettings {
    /// Microcontroller poll interval; also the log cadence
    pub mcu_interval_ms: u64,
    /// Temperature sensor poll interval
    pub sensor_interval_ms: u64,
    /// Display refresh interval
    pub ui_interval_ms: u64,
    /// Chart refresh interval, rounded to a multiple of the display interval
    pub chart_interval_ms: u64,
    /// Seconds of rolling history kept for the charts
    pub history_seconds: f64,
    /// Consecutive failed polls after which a source is declared dead
    pub failure_threshold: u32,
    /// Longest a poll may take before it counts as failed
    pub poll_timeout_ms: u64,
}

impl Default for DaqSettings {
    fn default() -> Self {
        Self {
            mcu_interval_ms: 1000,
            sensor_interval_ms: 1000,
            ui_interval_ms: 100,
            chart_interval_ms: 500,
            history_seconds: 7200.0,
            failure_threshold: 3,
            poll_timeout_ms: 900,
        }
    }
}

impl DaqSettings {
    /// Microcontroller poll interval
    pub fn mcu_interval(&self) -> Duration {
        Duration::from_millis(self.mcu_interval_ms)
    }

    /// Sensor poll interval
    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    /// Display refresh interval
    pub fn ui_interval(&self) -> Duration {
        Duration::from_millis(self.ui_interval_ms)
    }

    /// Poll deadline for a source polled every `interval`
    pub fn poll_timeout(&self, interval: Duration) -> Duration {
        Duration::from_millis(self.poll_timeout_ms).min(interval)
    }

    /// Every how many display frames the charts are refreshed
    pub fn chart_every(&self) -> u64 {
        if self.ui_interval_ms == 0 {
            return 1;
        }
        (self.chart_interval_ms / self.ui_interval_ms).max(1)
    }
}

/// Serial microcontroller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrocontrollerSettings {
    /// Name used in diagnostics
    pub name: String,
    /// Port to try first; discovery falls back to the last-known port and a scan
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Identity the firmware reports after the device type, e.g. "Arduino, <identity>"
    pub identity: String,
    /// File remembering the port the device was last found on
    pub last_port_file: PathBuf,
    /// Deadline for one query/response exchange
    pub timeout_ms: u64,
    /// Settle time after opening a port before the first query
    pub open_delay_ms: u64,
}

impl Default for MicrocontrollerSettings {
    fn default() -> Self {
        Self {
            name: "Ard".to_string(),
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            identity: "Diffusive Bubble Growth logger".to_string(),
            last_port_file: PathBuf::from("config/port_Arduino.txt"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            open_delay_ms: 100,
        }
    }
}

/// Network transport for the temperature module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Datagram per query and per reply
    Udp,
    /// Line-delimited stream
    Tcp,
}

/// Network temperature sensor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Name used in diagnostics
    pub name: String,
    /// `host:port` of the module
    pub address: String,
    /// Transport used to reach the module
    pub transport: Transport,
    /// Query sent for one temperature reading
    pub query: String,
    /// Deadline for one query/response exchange
    pub timeout_ms: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            name: "PT104".to_string(),
            address: "10.10.100.2:1234".to_string(),
            transport: Transport::Udp,
            query: crate::protocol::READING_QUERY.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Directory new log files are created in
    pub directory: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

impl AcquisitionConfig {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AcquisitionConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let daq = &self.daq;
        for (field, value) in [
            ("daq.mcu_interval_ms", daq.mcu_interval_ms),
            ("daq.sensor_interval_ms", daq.sensor_interval_ms),
            ("daq.ui_interval_ms", daq.ui_interval_ms),
            ("daq.poll_timeout_ms", daq.poll_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if daq.failure_threshold == 0 {
            return Err(invalid("daq.failure_threshold", "must be at least 1"));
        }
        if !(daq.history_seconds.is_finite() && daq.history_seconds > 0.0) {
            return Err(invalid("daq.history_seconds", "must be a positive number"));
        }
        if self.microcontroller.baud_rate == 0 {
            return Err(invalid("microcontroller.baud_rate", "must be greater than zero"));
        }
        if self.sensor.address.trim().is_empty() {
            return Err(invalid("sensor.address", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bench_setup() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.daq.mcu_interval_ms, 1000);
        assert_eq!(config.daq.ui_interval_ms, 100);
        assert_eq!(config.daq.failure_threshold, 3);
        assert_eq!(config.daq.chart_every(), 5);
        assert_eq!(config.microcontroller.baud_rate, 115200);
        assert_eq!(config.sensor.transport, Transport::Udp);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bubblelog.json");
        fs::write(
            &path,
            r#"{ "daq": { "mcu_interval_ms": 250 }, "sensor": { "transport": "tcp" } }"#,
        )
        .unwrap();

        let config = AcquisitionConfig::load(&path).unwrap();
        assert_eq!(config.daq.mcu_interval_ms, 250);
        assert_eq!(config.daq.sensor_interval_ms, 1000);
        assert_eq!(config.sensor.transport, Transport::Tcp);
        assert_eq!(config.sensor.address, "10.10.100.2:1234");
    }

    #[test]
    fn test_poll_timeout_never_exceeds_interval() {
        let mut daq = DaqSettings::default();
        daq.poll_timeout_ms = 5000;
        assert_eq!(
            daq.poll_timeout(Duration::from_millis(1000)),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut config = AcquisitionConfig::default();
        config.daq.failure_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut config = AcquisitionConfig::default();
        config.microcontroller.port = Some("/dev/ttyACM3".to_string());
        config.save(&path).unwrap();

        let loaded = AcquisitionConfig::load(&path).unwrap();
        assert_eq!(loaded.microcontroller.port.as_deref(), Some("/dev/ttyACM3"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AcquisitionConfig::load_or_default(dir.path().join("nope.json")).unwrap();
        assert_eq!(config.daq.history_seconds, 7200.0);
    }
}
