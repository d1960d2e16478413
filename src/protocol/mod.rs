//! Newline-delimited JSON link shared by the node and the gateway.

pub mod frames;
pub mod line;
pub mod transport;

pub use frames::{DownlinkFrame, RoomReport, RoomTelemetry, Telemetry, UplinkFrame};
pub use line::{LineDecoder, LineEvent};
pub use transport::Transport;
