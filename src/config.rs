//! # Engine Configuration
//!
//! Per-session options for a Modbus RTU master or slave.
//!
//! ## Defaults
//!
//! | Option | Default | Meaning |
//! |--------|---------|---------|
//! | `unit_id` | 0 | 0 = master, 1-247 = slave address |
//! | `txen_mode` | `None` | full duplex; `Pin` drives RS-485 direction |
//! | `timeout_ms` | 1000 | master response timeout / slave watchdog |
//! | `overtime_ticks` | 500 | busy-wait after drain before deasserting TX |
//! | `t35_ms` | 5 | inter-frame silence (T3.5) |

use crate::constants::{
    BROADCAST_ADDRESS, DEFAULT_OVERTIME_TICKS, DEFAULT_T35_MS, DEFAULT_TIMEOUT_MS,
    MAX_SLAVE_ADDRESS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;

/// Transmit-enable policy for the physical layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxEnableMode {
    /// Full-duplex line (RS-232, USB-CDC): no direction control.
    #[default]
    None,
    /// Half-duplex RS-485 with an explicit driver-enable signal; the engine
    /// cycles the port direction around every transmission.
    Pin,
}

/// Session configuration for a master or slave engine.
///
/// # Example
///
/// ```rust
/// use voltage_rtu::{ModbusConfig, TxEnableMode};
///
/// let config = ModbusConfig::slave(17)
///     .unwrap()
///     .with_txen_mode(TxEnableMode::Pin)
///     .with_timeout_ms(500)
///     .with_t35_ms(2);
///
/// assert_eq!(config.unit_id, 17);
/// assert!(!config.is_master());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusConfig {
    /// Own unit id: 0 configures a master, 1-247 a slave.
    pub unit_id: SlaveId,
    /// Direction-control policy.
    pub txen_mode: TxEnableMode,
    /// Master response timeout and slave watchdog period, in milliseconds.
    pub timeout_ms: u32,
    /// Busy-wait iterations spun after `tx_drain` before the driver is
    /// deasserted, for transceivers with slow fall times.
    pub overtime_ticks: u32,
    /// Inter-frame silence in milliseconds.
    pub t35_ms: u32,
}

impl ModbusConfig {
    /// Configuration for a bus master.
    pub fn master() -> Self {
        Self::default()
    }

    /// Configuration for a slave at `unit_id` (must be 1-247).
    pub fn slave(unit_id: SlaveId) -> ModbusResult<Self> {
        if unit_id == BROADCAST_ADDRESS || unit_id > MAX_SLAVE_ADDRESS {
            return Err(ModbusError::InvalidSlaveId { id: unit_id });
        }
        Ok(Self {
            unit_id,
            ..Self::default()
        })
    }

    /// Set the direction-control policy.
    pub fn with_txen_mode(mut self, mode: TxEnableMode) -> Self {
        self.txen_mode = mode;
        self
    }

    /// Set the response timeout / watchdog period.
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the post-drain busy-wait count.
    pub fn with_overtime_ticks(mut self, ticks: u32) -> Self {
        self.overtime_ticks = ticks;
        self
    }

    /// Set the inter-frame silence window.
    pub fn with_t35_ms(mut self, t35_ms: u32) -> Self {
        self.t35_ms = t35_ms;
        self
    }

    /// Whether this configuration describes the bus master.
    #[inline]
    pub fn is_master(&self) -> bool {
        self.unit_id == BROADCAST_ADDRESS
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            unit_id: BROADCAST_ADDRESS,
            txen_mode: TxEnableMode::None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            overtime_ticks: DEFAULT_OVERTIME_TICKS,
            t35_ms: DEFAULT_T35_MS,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
