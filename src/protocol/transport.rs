//! Byte-oriented serial link between the node and the gateway.
//!
//! Both ends speak newline-delimited JSON over the same trait, so the
//! firmware loop and the gateway I/O task never see the concrete UART.

/// Non-blocking byte channel.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes. `Ok(0)` means nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`, returning how many bytes were taken.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Write the whole buffer, retrying short writes.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), crate::error::LinkError> {
        while !data.is_empty() {
            match self.write(data) {
                Ok(0) | Err(_) => return Err(crate::error::LinkError::WriteFailed),
                Ok(n) => data = &data[n..],
            }
        }
        self.flush().map_err(|_| crate::error::LinkError::WriteFailed)
    }
}

/// Discards writes and never yields bytes.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}
