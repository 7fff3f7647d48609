//! Line-oriented device connection
//!
//! Both instruments speak a plain ASCII query/response dialect: the host
//! sends a short command terminated by `\n` and the device answers with a
//! single line. [`AsciiDevice`] owns the channel and enforces a per-query
//! deadline so a silent device turns into [`SourceError::Timeout`] instead of
//! a hung poll.

use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::{CommunicationChannel, SourceError, IDENTITY_QUERY};

/// Upper bound for a single blocking read inside a query
const READ_SLICE: Duration = Duration::from_millis(100);

/// Longest reply we are willing to buffer before giving up on a line ending
const MAX_REPLY_LEN: usize = 512;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connected and answering
    Connected,
    /// Last exchange failed at the transport level
    Error,
}

/// A device reached through a [`CommunicationChannel`] using ASCII lines
pub struct AsciiDevice {
    /// Name used in diagnostics, e.g. "Ard" or "PT104"
    name: String,
    channel: Option<Box<dyn CommunicationChannel>>,
    /// Deadline for a complete reply
    timeout: Duration,
    state: ConnectionState,
    tx_bytes: u64,
    rx_bytes: u64,
}

impl AsciiDevice {
    /// Wrap an open channel
    pub fn new(
        name: impl Into<String>,
        mut channel: Box<dyn CommunicationChannel>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        channel.set_timeout(timeout.min(READ_SLICE))?;
        Ok(Self {
            name: name.into(),
            channel: Some(channel),
            timeout,
            state: ConnectionState::Connected,
            tx_bytes: 0,
            rx_bytes: 0,
        })
    }

    /// Device name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Peer description of the underlying channel
    pub fn describe(&self) -> String {
        self.channel
            .as_ref()
            .map(|c| c.describe())
            .unwrap_or_else(|| "closed".to_string())
    }

    /// Cumulative bytes sent and received
    pub fn get_counters(&self) -> (u64, u64) {
        (self.tx_bytes, self.rx_bytes)
    }

    /// Send `command` and return the reply line without its line ending
    pub fn query(&mut self, command: &str) -> Result<String, SourceError> {
        let result = self.exchange(command);
        match &result {
            Ok(_) => self.state = ConnectionState::Connected,
            Err(e) => {
                tracing::debug!("{}: query {:?} failed: {}", self.name, command, e);
                self.state = ConnectionState::Error;
            }
        }
        result
    }

    fn exchange(&mut self, command: &str) -> Result<String, SourceError> {
        let channel = self.channel.as_mut().ok_or(SourceError::NotConnected)?;

        if let Err(e) = channel.clear_input_buffer() {
            tracing::debug!("{}: could not clear input buffer: {}", self.name, e);
        }

        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(b'\n');
        channel.write_all(&frame)?;
        channel.flush()?;
        self.tx_bytes += frame.len() as u64;

        let deadline = Instant::now() + self.timeout;
        let mut reply: Vec<u8> = Vec::with_capacity(64);
        let mut buf = [0u8; 256];

        loop {
            if Instant::now() >= deadline {
                return Err(SourceError::Timeout);
            }

            match channel.read(&mut buf) {
                Ok(0) => {
                    std::thread::sleep(Duration::from_millis(1));
                    continue;
                }
                Ok(n) => {
                    self.rx_bytes += n as u64;
                    reply.extend_from_slice(&buf[..n]);
                    if channel.is_datagram() || reply.contains(&b'\n') {
                        break;
                    }
                    if reply.len() > MAX_REPLY_LEN {
                        return Err(SourceError::InvalidResponse(
                            String::from_utf8_lossy(&reply).into_owned(),
                        ));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    continue
                }
                Err(e) => return Err(SourceError::Io(e)),
            }
        }

        let line = match reply.iter().position(|&b| b == b'\n') {
            Some(end) => &reply[..end],
            None => &reply[..],
        };
        let text = String::from_utf8_lossy(line).trim().to_string();
        tracing::trace!("{}: {:?} -> {:?}", self.name, command, text);
        Ok(text)
    }

    /// Ask the device for its identity string
    pub fn identify(&mut self) -> Result<String, SourceError> {
        self.query(IDENTITY_QUERY)
    }

    /// Drop the channel; subsequent queries fail with `NotConnected`
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            tracing::debug!("{}: connection closed", self.name);
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl std::fmt::Debug for AsciiDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsciiDevice")
            .field("name", &self.name)
            .field("peer", &self.describe())
            .field("state", &self.state)
            .finish()
    }
}
