//! Network temperature module
//!
//! The PT100 read-out sits on the lab network. It is queried with a short
//! ASCII command and answers with one line whose first field is the
//! temperature in °C.

use std::time::Duration;

use super::SampleSource;
use crate::config::{SensorSettings, Transport};
use crate::protocol::{AsciiDevice, CommunicationChannel, SourceError, TcpChannel, UdpChannel};
use crate::state::Quantity;

/// Parse the first tab- or space-separated field of a reply as °C
pub fn parse_temperature_reply(line: &str) -> Result<f64, SourceError> {
    line.split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| SourceError::InvalidResponse(line.to_string()))
}

/// Temperature source backed by the network module
#[derive(Debug)]
pub struct TemperatureProbe {
    device: AsciiDevice,
    query: String,
}

impl TemperatureProbe {
    /// Use an already connected device
    pub fn new(device: AsciiDevice, query: impl Into<String>) -> Self {
        Self {
            device,
            query: query.into(),
        }
    }

    /// Connect to the module and check that it answers
    pub fn connect(settings: &SensorSettings) -> Result<Self, SourceError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let channel: Box<dyn CommunicationChannel> = match settings.transport {
            Transport::Udp => Box::new(UdpChannel::connect(&settings.address)?),
            Transport::Tcp => Box::new(TcpChannel::connect(&settings.address, timeout)?),
        };

        let device = AsciiDevice::new(&settings.name, channel, timeout)?;
        let mut sensor = Self::new(device, settings.query.clone());

        // A UDP connect sends nothing; the first reading is the handshake
        let first = sensor.acquire()?;
        tracing::info!(
            "{}: connected to {} ({:.3} °C)",
            settings.name,
            sensor.device.describe(),
            first
        );
        Ok(sensor)
    }
}

impl SampleSource for TemperatureProbe {
    fn name(&self) -> &str {
        self.device.name()
    }

    fn quantity(&self) -> Quantity {
        Quantity::Temperature
    }

    fn acquire(&mut self) -> Result<f64, SourceError> {
        let line = self.device.query(&self.query)?;
        parse_temperature_reply(&line)
    }

    fn close(&mut self) {
        self.device.close();
    }
}
