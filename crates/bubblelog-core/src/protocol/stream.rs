//! Transport channels
//!
//! The microcontroller sits on a serial port while the temperature module is
//! reached over the lab network; both are driven through the same
//! [`CommunicationChannel`] abstraction so [`AsciiDevice`](super::AsciiDevice)
//! does not care which one it talks to.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Abstraction for communication channels (Serial, TCP or UDP)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set timeout for read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard anything that arrived before the next query
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Whether a single successful read always carries one complete reply
    fn is_datagram(&self) -> bool {
        false
    }

    /// Human readable peer description for diagnostics
    fn describe(&self) -> String;
}

/// Serial port wrapper implementing CommunicationChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an opened and configured serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn describe(&self) -> String {
        self.port.name().unwrap_or_else(|| "serial".to_string())
    }
}

/// TCP stream wrapper implementing CommunicationChannel
pub struct TcpChannel {
    stream: TcpStream,
    peer: String,
}

impl TcpChannel {
    /// Connect to `addr`, giving up after `timeout`
    pub fn connect(addr: &str, timeout: Duration) -> io::Result<Self> {
        let socket_addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("no address for {}", addr))
        })?;
        let stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer: addr.to_string(),
        })
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl CommunicationChannel for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // No flush syscall for a socket receive queue: drain it non-blocking
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}

/// Connected UDP socket implementing CommunicationChannel
///
/// Every datagram is one complete reply.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: String,
}

impl UdpChannel {
    /// Bind an ephemeral local port and connect it to `addr`
    pub fn connect(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(addr)?;
        Ok(Self {
            socket,
            peer: addr.to_string(),
        })
    }
}

impl Read for UdpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf)
    }
}

impl Write for UdpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for UdpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.socket.set_nonblocking(true)?;
        let mut buf = [0u8; 512];
        let result = loop {
            match self.socket.recv(&mut buf) {
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                // ICMP port unreachable from an earlier send surfaces here
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.socket.set_nonblocking(false)?;
        result
    }

    fn is_datagram(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_channel_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let mut channel = UdpChannel::connect(&addr).unwrap();
        channel.set_timeout(Duration::from_millis(500)).unwrap();
        channel.write_all(b"?\n").unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"?\n");
        server.send_to(b"21.250\n", from).unwrap();

        let mut reply = [0u8; 16];
        let n = channel.read(&mut reply).unwrap();
        assert_eq!(&reply[..n], b"21.250\n");
        assert!(channel.is_datagram());
        assert!(channel.describe().starts_with("udp://"));
    }
}
