//! Device communication
//!
//! Transport channels (serial, TCP, UDP), the line-oriented ASCII query
//! dialect both instruments speak, and serial port discovery.

mod connection;
mod error;
pub mod serial;
pub mod stream;

pub use connection::{AsciiDevice, ConnectionState};
pub use error::SourceError;
pub use serial::{
    clear_buffers, configure_port, list_ports, open_port, read_last_known_port,
    write_last_known_port, PortInfo,
};
pub use stream::{CommunicationChannel, SerialChannel, TcpChannel, UdpChannel};

/// Default baud rate for the microcontroller
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default deadline for one query/response exchange in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Command that asks a device to identify itself
pub const IDENTITY_QUERY: &str = "id?";

/// Command that asks a device for its current readings
pub const READING_QUERY: &str = "?";
