//! Non-blocking persistence/sync sink.
//!
//! Records go into a bounded channel that a separate consumer drains
//! (the gateway binary forwards them to its log; a database or cloud
//! uploader would sit in the same place).  A full channel drops the record
//! and counts it: the control tick never waits.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::events::Record;
use crate::app::ports::RecordSink;

pub const RECORD_DEPTH: usize = 64;

pub type RecordChannel = Channel<CriticalSectionRawMutex, Record, RECORD_DEPTH>;

pub struct ChannelRecordSink {
    channel: Arc<RecordChannel>,
    dropped: u64,
}

impl ChannelRecordSink {
    pub fn new(channel: Arc<RecordChannel>) -> Self {
        Self { channel, dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl RecordSink for ChannelRecordSink {
    fn record(&mut self, record: Record) {
        if self.channel.try_send(record).is_err() {
            self.dropped += 1;
            // Log the first drop and then every hundredth.
            if self.dropped % 100 == 1 {
                warn!("Records: sink full, {} dropped so far", self.dropped);
            }
        }
    }
}

/// Keeps everything; for tests and offline replays.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    pub records: Vec<Record>,
}

impl RecordSink for MemoryRecordSink {
    fn record(&mut self, record: Record) {
        self.records.push(record);
    }
}
