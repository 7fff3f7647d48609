//! # Bubblelog Core Library
//!
//! Acquisition pipeline for the Diffusive Bubble Growth logger.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial and network transports for the instruments
//! - Pressure microcontroller and temperature sensor drivers
//! - Shared latest-reading state and rolling chart histories
//! - Timestamped log files and a reader for them
//! - The scheduler that polls both instruments and drives the display
//!
//! ## Example
//!
//! ```rust,ignore
//! use bubblelog_core::prelude::*;
//!
//! let config = AcquisitionConfig::load_or_default("config/bubblelog.json")?;
//! let mut scheduler = Scheduler::new(&config, FileLogger::new(&config.log.directory));
//!
//! let pressure = PressureMonitor::connect(&config.microcontroller)?;
//! let temperature = TemperatureProbe::connect(&config.sensor)?;
//! scheduler.spawn(Box::new(pressure), Some(Box::new(temperature)), my_presenter)?;
//!
//! scheduler.handle().start_recording(vec!["run 1".into()]).await?;
//! ```

pub mod config;
pub mod datalog;
pub mod history;
pub mod protocol;
pub mod scheduler;
pub mod source;
pub mod state;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AcquisitionConfig, Transport};
    pub use crate::datalog::{FileLogger, LogEntry, LogError, LogFile, LogHeader};
    pub use crate::history::{HistoryBuffer, SharedHistory};
    pub use crate::protocol::{AsciiDevice, ConnectionState, SourceError};
    pub use crate::scheduler::{
        AcquisitionEvent, AcquisitionHandle, ChartSnapshot, DisplayFrame, Presenter, Scheduler,
        SpawnError,
    };
    pub use crate::source::{
        ConnectionStatus, DemoSource, FailurePlan, PressureMonitor, SampleSource,
        TemperatureProbe,
    };
    pub use crate::state::{Quantity, Sample, SharedState};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
