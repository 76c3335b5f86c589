//! Serial-port transport adapter (requires the `serial` feature)
//!
//! Wraps a [`serialport`] handle as a [`ModbusPort`]. Direction control for
//! RS-485 transceivers is mapped onto the RTS line, which most USB adapters
//! route to the driver-enable pin; boards with automatic direction control
//! can leave [`TxEnableMode::None`](crate::TxEnableMode::None) configured
//! and the hint is never issued.
//!
//! Port I/O errors cannot be surfaced through the non-blocking
//! [`ModbusPort`] contract, so they are logged and degrade to "no data";
//! the protocol layer then recovers through its normal timeout path.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::port::{Direction, ModbusPort};

/// Default read timeout handed to the serial driver.
///
/// Short on purpose: the engine only reads bytes already reported pending.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// [`ModbusPort`] over a [`serialport::SerialPort`] handle.
pub struct SerialRtuPort {
    port: Box<dyn serialport::SerialPort>,
    epoch: Instant,
}

impl SerialRtuPort {
    /// Open `path` at `baud_rate` with 8N1 framing.
    pub fn open(path: &str, baud_rate: u32) -> serialport::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self::from_port(port))
    }

    /// Adopt an already configured handle.
    pub fn from_port(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            port,
            epoch: Instant::now(),
        }
    }
}

impl ModbusPort for SerialRtuPort {
    fn rx_ready(&mut self) -> usize {
        match self.port.bytes_to_read() {
            Ok(count) => count as usize,
            Err(error) => {
                warn!(%error, "bytes_to_read failed");
                0
            }
        }
    }

    fn rx_pop(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => byte[0],
            Ok(_) => 0,
            Err(error) => {
                warn!(%error, "serial read failed");
                0
            }
        }
    }

    fn tx_write(&mut self, bytes: &[u8]) {
        if let Err(error) = self.port.write_all(bytes) {
            warn!(%error, "serial write failed");
        }
    }

    fn tx_drain(&mut self) {
        if let Err(error) = self.port.flush() {
            warn!(%error, "serial flush failed");
        }
    }

    fn set_direction(&mut self, direction: Direction) {
        let level = direction == Direction::Tx;
        if let Err(error) = self.port.write_request_to_send(level) {
            warn!(%error, ?direction, "RTS direction control failed");
        }
    }

    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }
}
