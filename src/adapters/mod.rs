//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements          | Connects to               |
//! |----------------|---------------------|---------------------------|
//! | `log_sink`     | EventSink           | `log` facade              |
//! | `record_sink`  | RecordSink          | bounded channel consumer  |
//! | `config_file`  | ConfigPort          | JSON file on disk (host)  |
//! | `serial`       | Transport           | host serial port          |
//! | `time`         | none                | monotonic clock           |
//! | `esp`          | OutputPin, I2c,     | ESP32 GPIO, I2C0, UART1   |
//! |                | BusLines, Transport |                           |

#[cfg(not(target_os = "espidf"))]
pub mod config_file;
#[cfg(target_os = "espidf")]
pub mod esp;
pub mod log_sink;
pub mod record_sink;
#[cfg(feature = "gateway")]
pub mod serial;
pub mod time;
