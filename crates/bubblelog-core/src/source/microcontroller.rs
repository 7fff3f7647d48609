//! Pressure microcontroller
//!
//! A Feather M4 reading a 4-20 mA pressure transmitter. Its firmware answers
//! `id?` with `"Arduino, <identity>"` and `?` with the averaged readings
//! `"<bitval>\t<mA>\t<bar>"`.

use std::collections::HashSet;
use std::time::Duration;

use super::SampleSource;
use crate::config::MicrocontrollerSettings;
use crate::protocol::{
    clear_buffers, configure_port, list_ports, open_port, read_last_known_port,
    write_last_known_port, AsciiDevice, SerialChannel, SourceError, READING_QUERY,
};
use crate::state::Quantity;

/// One parsed `?` reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReply {
    /// Averaged ADC bit value
    pub bitval: f64,
    /// Averaged loop current [mA]
    pub milliamps: f64,
    /// Pressure [bar]
    pub bar: f64,
}

/// Parse a `"<bitval>\t<mA>\t<bar>"` reply
pub fn parse_pressure_reply(line: &str) -> Result<PressureReply, SourceError> {
    let fields: Vec<&str> = line.trim().split('\t').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(SourceError::InvalidResponse(line.to_string()));
    }

    let mut values = [0.0f64; 3];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse::<f64>()
            .map_err(|_| SourceError::InvalidResponse(line.to_string()))?;
    }

    Ok(PressureReply {
        bitval: values[0],
        milliamps: values[1],
        bar: values[2],
    })
}

/// Pressure source backed by the microcontroller
#[derive(Debug)]
pub struct PressureMonitor {
    device: AsciiDevice,
}

impl PressureMonitor {
    /// Use an already identified device
    pub fn new(device: AsciiDevice) -> Self {
        Self { device }
    }

    /// Underlying device, e.g. for traffic counters
    pub fn device(&self) -> &AsciiDevice {
        &self.device
    }

    /// Find the microcontroller and connect to it
    ///
    /// Tries the configured port, then the last-known port, then every port
    /// on the system. The first one answering with the expected identity is
    /// remembered as the last-known port.
    pub fn connect(settings: &MicrocontrollerSettings) -> Result<Self, SourceError> {
        let mut candidates: Vec<String> = Vec::new();
        candidates.extend(settings.port.clone());
        candidates.extend(read_last_known_port(&settings.last_port_file));
        candidates.extend(list_ports().into_iter().map(|p| p.name));

        let mut seen = HashSet::new();
        candidates.retain(|name| seen.insert(name.clone()));

        for port_name in &candidates {
            tracing::info!("{}: trying {}", settings.name, port_name);
            match Self::try_port(settings, port_name) {
                Ok(device) => {
                    tracing::info!("{}: found '{}' on {}", settings.name, settings.identity, port_name);
                    if let Err(e) = write_last_known_port(&settings.last_port_file, port_name) {
                        tracing::warn!(
                            "{}: could not remember port in {}: {}",
                            settings.name,
                            settings.last_port_file.display(),
                            e
                        );
                    }
                    return Ok(Self::new(device));
                }
                Err(e) => tracing::debug!("{}: {} rejected: {}", settings.name, port_name, e),
            }
        }

        Err(SourceError::PortNotFound(format!(
            "no device identifying as '{}'",
            settings.identity
        )))
    }

    fn try_port(
        settings: &MicrocontrollerSettings,
        port_name: &str,
    ) -> Result<AsciiDevice, SourceError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut port = open_port(port_name, Some(settings.baud_rate), timeout)?;
        configure_port(port.as_mut())?;
        if settings.open_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(settings.open_delay_ms));
        }
        clear_buffers(port.as_mut())?;

        let mut device =
            AsciiDevice::new(&settings.name, Box::new(SerialChannel::new(port)), timeout)?;
        let reply = device.identify()?;
        if !identity_matches(&reply, &settings.identity) {
            return Err(SourceError::IdentityMismatch {
                expected: settings.identity.clone(),
                actual: reply,
            });
        }
        Ok(device)
    }
}

/// `"Arduino, Diffusive Bubble Growth logger"` matches identity
/// `"Diffusive Bubble Growth logger"`; the full reply matches too.
fn identity_matches(reply: &str, identity: &str) -> bool {
    let reply = reply.trim();
    if reply == identity {
        return true;
    }
    reply
        .split_once(',')
        .map(|(_, specific)| specific.trim() == identity)
        .unwrap_or(false)
}

impl SampleSource for PressureMonitor {
    fn name(&self) -> &str {
        self.device.name()
    }

    fn quantity(&self) -> Quantity {
        Quantity::Pressure
    }

    fn acquire(&mut self) -> Result<f64, SourceError> {
        let line = self.device.query(READING_QUERY)?;
        let reply = parse_pressure_reply(&line)?;
        Ok(reply.bar)
    }

    fn close(&mut self) {
        self.device.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let reply = parse_pressure_reply("2417\t12.03\t5.017").unwrap();
        assert_eq!(reply.bitval, 2417.0);
        assert_eq!(reply.milliamps, 12.03);
        assert_eq!(reply.bar, 5.017);
    }

    #[test]
    fn test_parse_reply_rejects_wrong_field_count() {
        assert!(matches!(
            parse_pressure_reply("2417\t12.03"),
            Err(SourceError::InvalidResponse(_))
        ));
        assert!(parse_pressure_reply("").is_err());
    }

    #[test]
    fn test_parse_reply_rejects_garbage() {
        assert!(parse_pressure_reply("2417\tabc\t5.017").is_err());
    }

    #[test]
    fn test_nan_reading_is_accepted() {
        // Firmware prints nan before its moving average has settled
        let reply = parse_pressure_reply("nan\tnan\tnan").unwrap();
        assert!(reply.bar.is_nan());
    }

    #[test]
    fn test_identity_matching() {
        let id = "Diffusive Bubble Growth logger";
        assert!(identity_matches("Arduino, Diffusive Bubble Growth logger", id));
        assert!(identity_matches("Diffusive Bubble Growth logger", id));
        assert!(!identity_matches("Arduino, Some other setup", id));
        assert!(!identity_matches("", id));
    }
}
