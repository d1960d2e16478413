//! ESP-IDF hardware adapters for the relay/sensor node.
//!
//! | Adapter      | Implements                      | Peripheral            |
//! |--------------|---------------------------------|-----------------------|
//! | `GpioLine`   | `embedded_hal` `OutputPin`      | relay control GPIO    |
//! | `EspI2cBus`  | `embedded_hal` `I2c`, `BusLines`| I2C0 (legacy driver)  |
//! | `UartLink`   | `Transport`                     | UART1 gateway link    |
//!
//! Thin wrappers over the IDF C API; all calls are made from the single
//! main task.

use core::ffi::c_void;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::pins;
use crate::protocol::transport::Transport;
use crate::sensors::bus_recovery::BusLines;

fn ms_to_ticks(ms: u32) -> TickType_t {
    ((u64::from(ms) * u64::from(configTICK_RATE_HZ)) / 1000).max(1) as TickType_t
}

/// Raw IDF error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspError(pub esp_err_t);

impl core::fmt::Display for EspError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "esp_err_t {}", self.0)
    }
}

impl std::error::Error for EspError {}

fn check(ret: esp_err_t) -> Result<(), EspError> {
    if ret == ESP_OK as i32 { Ok(()) } else { Err(EspError(ret)) }
}

// ── Relay lines ──────────────────────────────────────────────

impl digital::Error for EspError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

pub struct GpioLine {
    pin: i32,
}

impl GpioLine {
    /// Configure `pin` as a push-pull output, latched HIGH (relay off)
    /// before the driver is enabled.
    pub fn output_high(pin: i32) -> Result<Self, EspError> {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: plain register configuration of a pin we own.
        unsafe {
            check(gpio_set_level(pin, 1))?;
            check(gpio_config(&cfg))?;
            check(gpio_set_level(pin, 1))?;
        }
        Ok(Self { pin })
    }
}

impl digital::ErrorType for GpioLine {
    type Error = EspError;
}

impl OutputPin for GpioLine {
    fn set_low(&mut self) -> Result<(), EspError> {
        // SAFETY: the pin was configured as an output in `output_high`.
        check(unsafe { gpio_set_level(self.pin, 0) })
    }

    fn set_high(&mut self) -> Result<(), EspError> {
        // SAFETY: as above.
        check(unsafe { gpio_set_level(self.pin, 1) })
    }
}

// ── I2C bus ──────────────────────────────────────────────────

impl i2c::Error for EspError {
    fn kind(&self) -> i2c::ErrorKind {
        if self.0 == ESP_FAIL {
            // The legacy driver reports a missing ACK as ESP_FAIL.
            i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        } else {
            i2c::ErrorKind::Other
        }
    }
}

pub struct EspI2cBus {
    port: i2c_port_t,
    timeout_ticks: TickType_t,
}

impl EspI2cBus {
    pub fn new(timeout_ms: u32) -> Result<Self, EspError> {
        let mut bus = Self {
            port: 0,
            timeout_ticks: ms_to_ticks(timeout_ms),
        };
        bus.install(timeout_ms)?;
        info!(
            "I2C: SDA={} SCL={} @ {} Hz",
            pins::I2C_SDA_GPIO,
            pins::I2C_SCL_GPIO,
            pins::I2C_FREQ_HZ
        );
        Ok(bus)
    }

    fn install(&mut self, timeout_ms: u32) -> Result<(), EspError> {
        let mut cfg = i2c_config_t {
            mode: i2c_mode_t_I2C_MODE_MASTER,
            sda_io_num: pins::I2C_SDA_GPIO,
            scl_io_num: pins::I2C_SCL_GPIO,
            sda_pullup_en: true,
            scl_pullup_en: true,
            ..Default::default()
        };
        cfg.__bindgen_anon_1.master.clk_speed = pins::I2C_FREQ_HZ;
        self.timeout_ticks = ms_to_ticks(timeout_ms);
        // SAFETY: driver lifecycle calls from the main task only.
        unsafe {
            check(i2c_param_config(self.port, &cfg))?;
            check(i2c_driver_install(self.port, cfg.mode, 0, 0, 0))?;
        }
        Ok(())
    }

    fn pin_config(pin: i32, mode: gpio_mode_t) -> gpio_config_t {
        gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        }
    }
}

impl i2c::ErrorType for EspI2cBus {
    type Error = EspError;
}

impl I2c<SevenBitAddress> for EspI2cBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), EspError> {
        for op in operations {
            // SAFETY: buffers outlive the blocking call.
            let ret = match op {
                Operation::Write(bytes) => unsafe {
                    i2c_master_write_to_device(
                        self.port,
                        address,
                        bytes.as_ptr(),
                        bytes.len(),
                        self.timeout_ticks,
                    )
                },
                Operation::Read(buf) => unsafe {
                    i2c_master_read_from_device(
                        self.port,
                        address,
                        buf.as_mut_ptr(),
                        buf.len(),
                        self.timeout_ticks,
                    )
                },
            };
            check(ret)?;
        }
        Ok(())
    }
}

impl BusLines for EspI2cBus {
    fn release(&mut self) {
        // SAFETY: main task only; the lines are re-claimed by `reinit`.
        unsafe {
            let _ = i2c_driver_delete(self.port);
            let _ = gpio_config(&Self::pin_config(pins::I2C_SCL_GPIO, gpio_mode_t_GPIO_MODE_OUTPUT_OD));
            let _ = gpio_config(&Self::pin_config(
                pins::I2C_SDA_GPIO,
                gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
            ));
            let _ = gpio_set_level(pins::I2C_SDA_GPIO, 1);
        }
    }

    fn set_scl(&mut self, high: bool) {
        // SAFETY: SCL is an open-drain output while released.
        unsafe {
            let _ = gpio_set_level(pins::I2C_SCL_GPIO, u32::from(high));
        }
    }

    fn set_sda(&mut self, high: bool) {
        // SAFETY: SDA is input/output open-drain while released.
        unsafe {
            let _ = gpio_set_level(pins::I2C_SDA_GPIO, u32::from(high));
        }
    }

    fn sda_is_high(&mut self) -> bool {
        // SAFETY: read-only level query.
        (unsafe { gpio_get_level(pins::I2C_SDA_GPIO) }) != 0
    }

    fn reinit(&mut self, timeout_ms: u32) -> bool {
        match self.install(timeout_ms) {
            Ok(()) => true,
            Err(e) => {
                warn!("I2C: reinstall failed ({})", e.0);
                false
            }
        }
    }
}

// ── UART link ────────────────────────────────────────────────

const UART_RX_BUF: i32 = 512;

pub struct UartLink {
    port: uart_port_t,
}

impl UartLink {
    pub fn new(baud: u32) -> Result<Self, EspError> {
        let port = pins::LINK_UART_PORT;
        let cfg = uart_config_t {
            baud_rate: baud as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        // SAFETY: one-time driver setup from the main task.
        unsafe {
            check(uart_param_config(port, &cfg))?;
            check(uart_set_pin(
                port,
                pins::LINK_UART_TX_GPIO,
                pins::LINK_UART_RX_GPIO,
                -1,
                -1,
            ))?;
            check(uart_driver_install(
                port,
                UART_RX_BUF,
                0,
                0,
                core::ptr::null_mut(),
                0,
            ))?;
        }
        info!("UART{port}: link at {baud} baud");
        Ok(Self { port })
    }
}

impl Transport for UartLink {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        // SAFETY: non-blocking read into a caller-owned buffer.
        let n = unsafe { uart_read_bytes(self.port, buf.as_mut_ptr().cast::<c_void>(), buf.len() as u32, 0) };
        if n < 0 { Err(EspError(n)) } else { Ok(n as usize) }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, EspError> {
        // SAFETY: the driver copies `data` into its TX ring before returning.
        let n = unsafe { uart_write_bytes(self.port, data.as_ptr().cast::<c_void>(), data.len()) };
        if n < 0 { Err(EspError(n)) } else { Ok(n as usize) }
    }

    fn flush(&mut self) -> Result<(), EspError> {
        // SAFETY: waits at most 100 ms for the TX FIFO to drain.
        check(unsafe { uart_wait_tx_done(self.port, ms_to_ticks(100)) })
    }
}
