//! # Voltage RTU - Frame-Level Modbus RTU Engine
//!
//! **Author:** Evan Liu <liuyifanz.1996@gmail.com>
//! **License:** MIT
//!
//! A synchronous, frame-level Modbus RTU master/slave engine for serial
//! lines (RS-485 with direction control, or full-duplex RS-232/USB-CDC),
//! companion to the async `voltage_modbus` client library.
//!
//! ## Features
//!
//! - **Bidirectional**: one engine type acts as the single bus master or as
//!   one of many slaves, selected by the configured unit id
//! - **T3.5 framing**: polled and interrupt-driven frame assembly under the
//!   inter-character silence rule
//! - **Portable**: no hardware knowledge in the core; hosts implement the
//!   small [`ModbusPort`] trait and supply a monotonic millisecond counter
//! - **Zero allocation on the data path**: one fixed stack buffer carries
//!   every request and reply
//! - **Built-in diagnostics**: per-session frame/error counters and a
//!   communication watchdog
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Master | Slave |
//! |------|----------|--------|-------|
//! | 0x01 | Read Coils | ✅ | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ | ✅ |
//! | 0x03 | Read Holding Registers | ✅ | ✅ |
//! | 0x04 | Read Input Registers | ✅ | ✅ |
//! | 0x05 | Write Single Coil | ✅ | ✅ |
//! | 0x06 | Write Single Register | ✅ | ✅ |
//! | 0x08 | Diagnostics | ✅ | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ | ✅ |
//!
//! ## Quick Start
//!
//! ```rust
//! use voltage_rtu::{
//!     FunctionCode, ModbusConfig, ModbusPort, ModbusRtu, Telegram,
//! };
//!
//! // Hosts adapt their UART here; see `SerialRtuPort` (feature `serial`)
//! // for a ready-made adapter over the `serialport` crate.
//! struct NullPort;
//! impl ModbusPort for NullPort {
//!     fn rx_ready(&mut self) -> usize { 0 }
//!     fn rx_pop(&mut self) -> u8 { 0 }
//!     fn tx_write(&mut self, _bytes: &[u8]) {}
//!     fn tx_drain(&mut self) {}
//!     fn now_ms(&self) -> u32 { 0 }
//! }
//!
//! let mut master = ModbusRtu::new(NullPort, ModbusConfig::master());
//! master.start();
//!
//! // Read two holding registers from slave 0x11, starting at 0x006B
//! let telegram = Telegram::new(0x11, FunctionCode::ReadHoldingRegisters, 0x006B, 2);
//! let mut image = [0u16; 2];
//! master.query(&telegram, &image).unwrap();
//!
//! // ...then call master.master_poll(&mut image) from the host loop until
//! // it reports the decoded reply or a timeout.
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Modbus RTU protocol constants based on the official specification
pub mod constants;

/// Core error types and result handling
pub mod error;

/// CRC-16/Modbus computation and verification
pub mod crc;

/// Shared RX/TX frame buffer
pub mod frame;

/// Modbus protocol definitions: function codes, unit ids and telegrams
pub mod protocol;

/// Engine configuration
pub mod config;

/// Transport abstraction for byte-oriented half-duplex channels
pub mod port;

/// Register bank: the four Modbus address spaces
pub mod bank;

/// Session communication counters
pub mod stats;

/// Modbus RTU protocol engine
pub mod engine;

/// Serial-port transport adapter
#[cfg(feature = "serial")]
pub mod serial;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Core engine API ===
pub use engine::{ModbusRtu, SessionState};

// === Error handling ===
pub use error::{ExceptionCode, ModbusError, ModbusResult};

// === Core types ===
pub use bank::RegisterBank;
pub use config::{ModbusConfig, TxEnableMode};
pub use frame::FrameBuffer;
pub use port::{Direction, ModbusPort};
pub use protocol::{FunctionCode, SlaveId, Telegram};
pub use stats::CommStats;

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    MAX_FRAME_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};

// === CRC (advanced usage) ===
pub use crc::crc16;

#[cfg(feature = "serial")]
pub use serial::SerialRtuPort;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage RTU v{} - Frame-level Modbus RTU engine by Evan Liu",
        VERSION
    )
}
