//! Modbus RTU protocol constants based on the official specification
//!
//! These constants are derived from the Modbus over Serial Line V1.02 document:
//! - Maximum ADU size: 256 bytes (slave address + PDU + CRC)
//! - Register/coil limits are calculated to fit within the ADU size constraint

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum ADU (Application Data Unit) size for serial lines.
///
/// Format: Slave Address (1) + PDU (max 253) + CRC (2) = 256 bytes
pub const MAX_FRAME_SIZE: usize = 256;

/// CRC field length appended to every frame.
pub const CRC_LEN: usize = 2;

/// Shortest valid frame the master may accept as a reply.
///
/// The FC01/FC02 response is the minimum case:
/// id (1) + func (1) + byte count (1) + 1 data byte + CRC (2) = 6 bytes
pub const MIN_RESPONSE_SIZE: usize = 6;

/// Shortest valid request a slave may accept.
///
/// id (1) + func (1) + address (2) + quantity/value (2) + CRC (2) = 8 bytes
pub const MIN_REQUEST_SIZE: usize = 8;

/// Exception response length: id (1) + func|0x80 (1) + code (1) + CRC (2).
pub const EXCEPTION_FRAME_SIZE: usize = 5;

// ============================================================================
// Frame Field Offsets
// ============================================================================
// Byte positions within the shared frame buffer, valid for all request
// shapes: [ID][FUNC][ADDR_HI][ADDR_LO][QTY_HI][QTY_LO][BYTE_CNT]...

/// Slave/unit identifier.
pub const POS_ID: usize = 0;

/// Function code.
pub const POS_FUNC: usize = 1;

/// Starting address, high byte.
pub const POS_ADDR_HI: usize = 2;

/// Starting address, low byte.
pub const POS_ADDR_LO: usize = 3;

/// Quantity (or single-write value), high byte.
pub const POS_QTY_HI: usize = 4;

/// Quantity (or single-write value), low byte.
pub const POS_QTY_LO: usize = 5;

/// Byte count field of FC15/FC16 requests.
pub const POS_BYTE_CNT: usize = 6;

// ============================================================================
// Addressing
// ============================================================================

/// Broadcast address: received by every slave, never acknowledged.
pub const BROADCAST_ADDRESS: u8 = 0;

/// Highest assignable slave address; 248..=255 are reserved.
pub const MAX_SLAVE_ADDRESS: u8 = 247;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers).
///
/// Response PDU: func (1) + byte count (1) + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers).
///
/// Request PDU: func (1) + addr (2) + qty (2) + byte count (1) + N × 2 ≤ 253
/// → N ≤ 123
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Maximum number of coils for FC01/FC02 (Read Coils/Discrete Inputs).
///
/// Spec limit: 2000 (0x7D0).
pub const MAX_READ_COILS: u16 = 2000;

/// Maximum number of coils for FC15 (Write Multiple Coils).
///
/// Spec limit: 1968 (0x7B0).
pub const MAX_WRITE_COILS: u16 = 1968;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Default master response timeout and slave watchdog period (ms).
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Default inter-frame silence (T3.5) in milliseconds.
///
/// The standard specifies 3.5 character times (~1.75 ms at 19200 baud and
/// above); 5 ms is a safe rounding for millisecond-granularity clocks.
pub const DEFAULT_T35_MS: u32 = 5;

/// Default busy-wait iterations spun after `tx_drain` before the RS-485
/// driver is deasserted, for transceivers with slow fall times.
pub const DEFAULT_OVERTIME_TICKS: u32 = 500;

// ============================================================================
// Wire Values: Single Coil Write (FC05)
// ============================================================================

/// FC05 "coil ON" value (0xFF00 on the wire).
pub const COIL_ON: u16 = 0xFF00;

/// FC05 "coil OFF" value.
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Diagnostics (FC08)
// ============================================================================

/// FC08 sub-function that requests a device restart.
pub const DIAG_SUB_RESTART: u16 = 0x0001;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MAX_FRAME_SIZE, 256);
        assert_eq!(MIN_RESPONSE_SIZE, 6);
        assert_eq!(MIN_REQUEST_SIZE, 8);
        assert_eq!(EXCEPTION_FRAME_SIZE, 5);
    }

    #[test]
    fn test_register_limits_fit_in_frame() {
        // Read response: id + func + byte count + data + CRC
        let read_adu = 1 + 1 + 1 + (MAX_READ_REGISTERS as usize * 2) + CRC_LEN;
        assert!(read_adu <= MAX_FRAME_SIZE);

        // Write request: id + func + addr + qty + byte count + data + CRC
        let write_adu = 1 + 1 + 2 + 2 + 1 + (MAX_WRITE_REGISTERS as usize * 2) + CRC_LEN;
        assert!(write_adu <= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_coil_limits_fit_in_frame() {
        let read_adu = 1 + 1 + 1 + (MAX_READ_COILS as usize).div_ceil(8) + CRC_LEN;
        assert!(read_adu <= MAX_FRAME_SIZE);

        let write_adu = 1 + 1 + 2 + 2 + 1 + (MAX_WRITE_COILS as usize).div_ceil(8) + CRC_LEN;
        assert!(write_adu <= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_field_offsets_are_contiguous() {
        assert_eq!(POS_ID, 0);
        assert_eq!(POS_FUNC, 1);
        assert_eq!(POS_ADDR_HI, 2);
        assert_eq!(POS_BYTE_CNT, POS_QTY_LO + 1);
    }
}
