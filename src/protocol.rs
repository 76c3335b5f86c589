//! Modbus protocol definitions: function codes, unit ids and telegrams

use crate::constants::{BROADCAST_ADDRESS, MAX_SLAVE_ADDRESS};
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier (0 = broadcast, 1-247 = individual).
pub type SlaveId = u8;

/// Function codes implemented by the engine, for master and slave alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read coils (0x01)
    ReadCoils = 0x01,
    /// Read discrete inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read holding registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read input registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write single coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write single register (0x06)
    WriteSingleRegister = 0x06,
    /// Serial-line diagnostics (0x08)
    Diagnostics = 0x08,
    /// Write multiple coils (0x0F)
    WriteMultipleCoils = 0x0F,
    /// Write multiple registers (0x10)
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// Wire representation.
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a function code, rejecting anything outside the supported set.
    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x08 => Ok(Self::Diagnostics),
            0x0F => Ok(Self::WriteMultipleCoils),
            0x10 => Ok(Self::WriteMultipleRegisters),
            _ => Err(ModbusError::InvalidFunction { code }),
        }
    }

    /// Get human-readable function code description.
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::Diagnostics => "Diagnostics",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

/// Master request descriptor.
///
/// Names one operation against one slave. The register image the operation
/// reads from or writes into is a caller-owned `&[u16]` / `&mut [u16]`
/// supplied to [`query`](crate::ModbusRtu::query) and
/// [`master_poll`](crate::ModbusRtu::master_poll); for coil functions each
/// word holds 16 consecutive coils, little-endian within the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    /// Target slave: 1-247, or 0 to broadcast (no reply expected).
    pub slave_id: SlaveId,
    /// Operation to perform.
    pub function: FunctionCode,
    /// Starting register or coil address (raw Modbus address).
    pub address: u16,
    /// Number of coils or registers to access.
    pub quantity: u16,
}

impl Telegram {
    /// Create a telegram.
    pub fn new(slave_id: SlaveId, function: FunctionCode, address: u16, quantity: u16) -> Self {
        Self {
            slave_id,
            function,
            address,
            quantity,
        }
    }

    /// Check the target id is assignable (broadcast or 1-247).
    pub fn validate_id(&self) -> ModbusResult<()> {
        if self.slave_id != BROADCAST_ADDRESS && self.slave_id > MAX_SLAVE_ADDRESS {
            return Err(ModbusError::InvalidSlaveId { id: self.slave_id });
        }
        Ok(())
    }

    /// Words the caller's register image must hold for this telegram.
    pub fn image_words(&self) -> usize {
        match self.function {
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::WriteMultipleCoils => (self.quantity as usize).div_ceil(16),
            FunctionCode::ReadHoldingRegisters
            | FunctionCode::ReadInputRegisters
            | FunctionCode::WriteMultipleRegisters => self.quantity as usize,
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 1,
            FunctionCode::Diagnostics => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_roundtrip() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0F, 0x10] {
            let fc = FunctionCode::from_u8(code).unwrap();
            assert_eq!(fc.to_u8(), code);
        }
    }

    #[test]
    fn test_unsupported_codes_rejected() {
        for code in [0x00u8, 0x07, 0x0B, 0x11, 0x14, 0x2B, 0x80, 0x83] {
            assert_eq!(
                FunctionCode::from_u8(code),
                Err(ModbusError::InvalidFunction { code })
            );
        }
    }

    #[test]
    fn test_telegram_id_validation() {
        let mut telegram = Telegram::new(1, FunctionCode::ReadHoldingRegisters, 0, 1);
        assert!(telegram.validate_id().is_ok());

        telegram.slave_id = 0; // broadcast is legal
        assert!(telegram.validate_id().is_ok());

        telegram.slave_id = 247;
        assert!(telegram.validate_id().is_ok());

        telegram.slave_id = 248; // reserved
        assert_eq!(
            telegram.validate_id(),
            Err(ModbusError::InvalidSlaveId { id: 248 })
        );
    }

    #[test]
    fn test_image_words() {
        let t = Telegram::new(1, FunctionCode::ReadCoils, 0, 17);
        assert_eq!(t.image_words(), 2);

        let t = Telegram::new(1, FunctionCode::ReadHoldingRegisters, 0, 17);
        assert_eq!(t.image_words(), 17);

        let t = Telegram::new(1, FunctionCode::WriteSingleCoil, 0, 1);
        assert_eq!(t.image_words(), 1);

        let t = Telegram::new(1, FunctionCode::Diagnostics, 1, 0);
        assert_eq!(t.image_words(), 0);
    }
}
