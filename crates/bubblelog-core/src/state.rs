//! Shared acquisition state
//!
//! The most recent merged reading of both instruments. Each source owns one
//! field (temperature or pressure); the record is published through a
//! [`tokio::sync::watch`] channel so every write is a single atomic
//! `send_modify` and readers always see a whole [`Sample`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tokio::sync::watch;

/// Physical quantity produced by a sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Temperature in °C
    Temperature,
    /// Pressure in bar
    Pressure,
}

impl Quantity {
    /// Display unit
    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Temperature => "°C",
            Quantity::Pressure => "bar",
        }
    }

    /// Column name used in log files
    pub fn column(&self) -> &'static str {
        match self {
            Quantity::Temperature => "temp",
            Quantity::Pressure => "pres",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Temperature => write!(f, "temperature"),
            Quantity::Pressure => write!(f, "pressure"),
        }
    }
}

/// A merged reading; NaN means "not yet measured"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the state epoch at the most recent publish
    pub time: f64,
    /// Temperature [°C]
    pub temperature: f64,
    /// Pressure [bar]
    pub pressure: f64,
}

impl Sample {
    /// A sample with nothing measured yet
    pub fn empty() -> Self {
        Self {
            time: f64::NAN,
            temperature: f64::NAN,
            pressure: f64::NAN,
        }
    }

    /// Value of a single quantity
    pub fn get(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Temperature => self.temperature,
            Quantity::Pressure => self.pressure,
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::empty()
    }
}

/// The single mutable "current reading" record of a session
#[derive(Debug)]
pub struct SharedState {
    tx: watch::Sender<Sample>,
    epoch: Instant,
}

impl SharedState {
    /// Create a state whose clock starts now
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Sample::empty());
        Self {
            tx,
            epoch: Instant::now(),
        }
    }

    /// Monotonic seconds since the state was created
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Overwrite the field owned by `quantity` together with `time`
    pub fn publish(&self, quantity: Quantity, time: f64, value: f64) {
        self.tx.send_modify(|sample| {
            sample.time = time;
            match quantity {
                Quantity::Temperature => sample.temperature = value,
                Quantity::Pressure => sample.pressure = value,
            }
        });
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> Sample {
        *self.tx.borrow()
    }

    /// Receiver that is notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Sample> {
        self.tx.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unmeasured() {
        let state = SharedState::new();
        let s = state.snapshot();
        assert!(s.time.is_nan());
        assert!(s.temperature.is_nan());
        assert!(s.pressure.is_nan());
    }

    #[test]
    fn test_publish_touches_only_owned_field() {
        let state = SharedState::new();
        state.publish(Quantity::Temperature, 1.0, 20.5);
        state.publish(Quantity::Pressure, 1.5, 1.013);
        state.publish(Quantity::Temperature, 2.0, 20.6);

        let s = state.snapshot();
        assert_eq!(s.time, 2.0);
        assert_eq!(s.temperature, 20.6);
        assert_eq!(s.pressure, 1.013);
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest() {
        let state = SharedState::new();
        let mut rx = state.subscribe();

        state.publish(Quantity::Pressure, 0.5, 0.998);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().pressure, 0.998);
    }
}
