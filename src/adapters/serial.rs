//! Host serial port transport for the gateway.

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use log::info;
use serialport::SerialPort;

use crate::protocol::transport::Transport;

/// Short read timeout: the link task polls, it does not block.
const READ_TIMEOUT: Duration = Duration::from_millis(5);

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` as 8N1 at `baud`.
    pub fn open(path: &str, baud: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()?;
        // Drop whatever the node printed while nobody listened.
        port.clear(serialport::ClearBuffer::Input)?;
        info!("Serial: {path} open at {baud} baud");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, io::Error> {
        self.port.write(data)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.port.flush()
    }
}
