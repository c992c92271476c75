//! Line-oriented transports to the motion controller.
//!
//! [`Transport`] is the seam between the link state machine and the wire.
//! [`StreamTransport`] implements it over any byte stream; with a serial
//! port it becomes [`SerialTransport`]. Reads honour the stream's own
//! timeout: a timed-out read keeps any partial line buffered and reports
//! `ErrorKind::TimedOut`, so the link can enforce its protocol deadline
//! without spinning.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use sand_common::config::SerialConfig;
use sand_common::consts::MAX_LINE_BYTES;
use tracing::{info, warn};

/// Newline-delimited ASCII channel.
pub trait Transport: Send {
    /// Write `line` followed by `\n`.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Next line without its terminator.
    ///
    /// - `Ok(None)`: the peer closed the connection
    /// - `Err(TimedOut | WouldBlock)`: nothing complete arrived yet
    /// - `Err(InvalidData)`: line exceeded the length limit
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// [`Transport`] over a byte stream.
pub struct StreamTransport<S> {
    stream: S,
    partial: Vec<u8>,
    lines: VecDeque<String>,
}

/// Transport over a serial port.
pub type SerialTransport = StreamTransport<Box<dyn serialport::SerialPort>>;

impl<S: Read + Write + Send> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            partial: Vec::new(),
            lines: VecDeque::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn split_lines(&mut self) {
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let rest = self.partial.split_off(pos + 1);
            let raw = std::mem::replace(&mut self.partial, rest);
            let text = String::from_utf8_lossy(&raw);
            self.lines
                .push_back(text.trim_end_matches(['\r', '\n']).to_string());
        }
    }
}

impl<S: Read + Write + Send> Transport for StreamTransport<S> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        self.stream.write_all(&frame)?;
        self.stream.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line));
            }
            let n = match self.stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                if self.partial.is_empty() {
                    return Ok(None);
                }
                let tail = String::from_utf8_lossy(&self.partial).trim_end().to_string();
                self.partial.clear();
                return Ok(Some(tail));
            }
            self.partial.extend_from_slice(&chunk[..n]);
            self.split_lines();
            if self.partial.len() > MAX_LINE_BYTES {
                self.partial.clear();
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("controller line exceeds {MAX_LINE_BYTES} bytes"),
                ));
            }
        }
    }
}

/// Open the configured serial port.
pub fn open_serial(config: &SerialConfig) -> Result<SerialTransport, serialport::Error> {
    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open()?;
    info!("Serial port {} open at {} baud", config.port, config.baud_rate);
    Ok(StreamTransport::new(port))
}

/// Device paths of the serial ports on this host.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("Serial port enumeration failed: {e}");
            Vec::new()
        }
    }
}
