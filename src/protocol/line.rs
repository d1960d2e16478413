//! Newline-delimited line framer.
//!
//! Wire format: one JSON object per line, terminated by `\n` or `\r`
//! (so `\r\n` works too; the empty line between them is skipped).
//!
//! The decoder accumulates bytes into a fixed buffer and yields complete
//! lines.  A line longer than the buffer is discarded *whole*: bytes are
//! dropped until the next terminator, then a single
//! [`LineEvent::Overflow`] is reported.  A truncated prefix is never
//! handed to the JSON decoder.

use heapless::Vec;

/// Node-side receive buffer.
pub const MAX_LINE_LEN: usize = 128;

#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent<'a> {
    /// A complete line, terminator stripped.
    Line(&'a [u8]),
    /// A line exceeded the buffer and was dropped.
    Overflow,
}

/// Streaming line decoder with an `N`-byte buffer.
pub struct LineDecoder<const N: usize = MAX_LINE_LEN> {
    buf: Vec<u8, N>,
    /// Dropping bytes until the next terminator.
    discarding: bool,
    /// The previous call returned a borrow of `buf`; clear it first.
    pending_clear: bool,
}

impl<const N: usize> Default for LineDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineDecoder<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
            pending_clear: false,
        }
    }

    /// Feed one byte.  Returns an event when a line completes.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent<'_>> {
        if self.pending_clear {
            self.buf.clear();
            self.pending_clear = false;
        }

        if byte == b'\n' || byte == b'\r' {
            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                return Some(LineEvent::Overflow);
            }
            if self.buf.is_empty() {
                return None;
            }
            self.pending_clear = true;
            return Some(LineEvent::Line(self.buf.as_slice()));
        }

        if self.discarding {
            return None;
        }
        if self.buf.push(byte).is_err() {
            self.discarding = true;
            self.buf.clear();
        }
        None
    }

    /// Feed a chunk, invoking `on_event` for every completed line.
    pub fn feed(&mut self, data: &[u8], mut on_event: impl FnMut(LineEvent<'_>)) {
        for &byte in data {
            if let Some(event) = self.push(byte) {
                on_event(event);
            }
        }
    }

    /// Bytes buffered for the line in progress.
    pub fn pending(&self) -> usize {
        if self.pending_clear { 0 } else { self.buf.len() }
    }

    /// Drop any partial line (e.g. after reopening the port).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
        self.pending_clear = false;
    }
}
