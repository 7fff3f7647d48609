//! Sample sources
//!
//! A [`SampleSource`] owns one instrument connection and produces one value
//! per poll. Sources are blocking by nature (serial and socket reads); the
//! [`Scheduler`](crate::scheduler::Scheduler) runs each poll on a blocking
//! worker and turns every failure into a [`ConnectionStatus`] update, so no
//! device error ever travels further than this boundary.

mod demo;
mod microcontroller;
mod sensor;

pub use demo::{DemoSource, FailurePlan};
pub use microcontroller::{parse_pressure_reply, PressureMonitor, PressureReply};
pub use sensor::{parse_temperature_reply, TemperatureProbe};

use serde::Serialize;

use crate::protocol::SourceError;
use crate::state::Quantity;

/// One instrument that can be polled for a single value
pub trait SampleSource: Send {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Which field of the shared state this source owns
    fn quantity(&self) -> Quantity;

    /// Acquire one value; blocks for at most the device timeout
    fn acquire(&mut self) -> Result<f64, SourceError>;

    /// Release the connection
    fn close(&mut self) {}
}

/// Liveness bookkeeping for one source
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    /// Source name
    pub name: String,
    /// Quantity the source produces
    pub quantity: Quantity,
    /// False once the failure threshold was reached; never reset
    pub alive: bool,
    /// Failed polls since the last success
    pub consecutive_failures: u32,
    /// Consecutive failures that make the source dead
    pub threshold: u32,
    /// Successful polls so far
    pub update_count: u64,
    /// Successful polls per second, re-estimated about once a second
    pub obtained_rate_hz: f64,
    #[serde(skip)]
    rate_window_start: Option<f64>,
    #[serde(skip)]
    rate_window_count: u32,
}

impl ConnectionStatus {
    /// Fresh, alive status
    pub fn new(name: impl Into<String>, quantity: Quantity, threshold: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            alive: true,
            consecutive_failures: 0,
            threshold: threshold.max(1),
            update_count: 0,
            obtained_rate_hz: f64::NAN,
            rate_window_start: None,
            rate_window_count: 0,
        }
    }

    /// Count a successful poll at `now` seconds
    pub fn record_success(&mut self, now: f64) {
        if !self.alive {
            return;
        }
        self.consecutive_failures = 0;
        self.update_count += 1;

        match self.rate_window_start {
            None => {
                self.rate_window_start = Some(now);
                self.rate_window_count = 0;
            }
            Some(start) => {
                self.rate_window_count += 1;
                let dt = now - start;
                if dt >= 1.0 {
                    self.obtained_rate_hz = self.rate_window_count as f64 / dt;
                    self.rate_window_start = Some(now);
                    self.rate_window_count = 0;
                }
            }
        }
    }

    /// Count a failed poll; returns true when this failure made the source dead
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.alive && self.consecutive_failures >= self.threshold {
            self.alive = false;
            return true;
        }
        false
    }

    /// Whether the source is still considered connected
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_resets_failures() {
        let mut status = ConnectionStatus::new("Ard", Quantity::Pressure, 3);
        assert!(!status.record_failure());
        assert!(!status.record_failure());
        status.record_success(0.0);
        assert_eq!(status.consecutive_failures, 0);
        assert!(!status.record_failure());
        assert!(status.is_alive());
    }

    #[test]
    fn test_threshold_marks_dead_once() {
        let mut status = ConnectionStatus::new("Ard", Quantity::Pressure, 3);
        assert!(!status.record_failure());
        assert!(!status.record_failure());
        assert!(status.record_failure());
        assert!(!status.is_alive());

        // Terminal: further outcomes do not revive or re-trigger
        assert!(!status.record_failure());
        status.record_success(1.0);
        assert!(!status.is_alive());
    }

    #[test]
    fn test_obtained_rate() {
        let mut status = ConnectionStatus::new("PT104", Quantity::Temperature, 3);
        assert!(status.obtained_rate_hz.is_nan());
        for i in 0..=4 {
            status.record_success(i as f64 * 0.25);
        }
        assert_eq!(status.update_count, 5);
        assert!((status.obtained_rate_hz - 4.0).abs() < 1e-9);
    }
}
