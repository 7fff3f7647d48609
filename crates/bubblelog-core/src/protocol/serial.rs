//! Serial port handling
//!
//! Low-level serial port access for the pressure microcontroller, plus the
//! small text file that remembers which port it was last found on.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use super::{SourceError, DEFAULT_BAUD_RATE};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key so that ttyACM* ports come first (numerically), then ttyUSB*,
/// then everything else by name. Feather/Arduino boards enumerate as ttyACM.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // udev sometimes lags behind; pick up device nodes the API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open a serial port with the given read timeout
pub fn open_port(
    name: &str,
    baud_rate: Option<u32>,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, SourceError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    serialport::new(name, baud)
        .timeout(timeout)
        .open()
        .map_err(|e| match e.kind {
            serialport::ErrorKind::NoDevice => SourceError::PortNotFound(name.to_string()),
            _ => SourceError::Serial(e.to_string()),
        })
}

/// Configure a serial port as 8N1 without flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), SourceError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| SourceError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| SourceError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| SourceError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| SourceError::Serial(e.to_string()))?;

    // Keep DTR asserted, toggling it resets SAMD/AVR boards into the bootloader
    if let Err(e) = port.write_data_terminal_ready(true) {
        tracing::debug!("configure_port: failed to set DTR high: {} (continuing)", e);
    }
    if let Err(e) = port.write_request_to_send(true) {
        tracing::debug!("configure_port: failed to set RTS high: {} (continuing)", e);
    }

    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), SourceError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| SourceError::Serial(e.to_string()))
}

/// Read the last-known port name, if the file exists and is not empty
pub fn read_last_known_port<P: AsRef<Path>>(path: P) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let name = content.lines().next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Remember `port_name` so the next start-up tries it first
pub fn write_last_known_port<P: AsRef<Path>>(path: P, port_name: &str) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, format!("{}\n", port_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_sorted_and_unique() {
        let ports = list_ports();
        let keys: Vec<_> = ports.iter().map(|p| port_sort_key(&p.name)).collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));

        let mut names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ports.len());
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyACM10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo::bare(n.to_string()))
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_last_known_port_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("port_Arduino.txt");

        assert_eq!(read_last_known_port(&path), None);

        write_last_known_port(&path, "/dev/ttyACM0").unwrap();
        assert_eq!(read_last_known_port(&path).as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_last_known_port_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port.txt");
        fs::write(&path, "   \n").unwrap();
        assert_eq!(read_last_known_port(&path), None);
    }
}
