//! Core error types and result handling
//!
//! The error taxonomy splits three ways, mirroring the protocol itself:
//!
//! | Class | Variants | On the wire? |
//! |-------|----------|--------------|
//! | Protocol exceptions | [`ModbusError::Exception`] | Yes, as an exception PDU |
//! | Transport errors | `NoReply`, `BadCrc`, `BufferOverflow`, `RemoteException`, `FrameTooShort` | No, local only |
//! | API misuse | `NotMaster`, `Busy`, `InvalidSlaveId`, `ImageTooSmall` | No |

use thiserror::Error;

/// Result type for all Modbus operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus exception codes as defined by the application protocol.
///
/// Transmitted as the third byte of an exception response, after the
/// function code with its high bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    /// Function code not supported by the slave (01).
    IllegalFunction = 1,
    /// Address range falls outside the addressed region (02).
    IllegalDataAddress = 2,
    /// Quantity or value field is structurally invalid (03).
    IllegalDataValue = 3,
    /// Unrecoverable failure while executing the request (04).
    ServerDeviceFailure = 4,
}

impl ExceptionCode {
    /// Wire representation of the exception code.
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse an exception code received from a remote device.
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::IllegalFunction),
            2 => Some(Self::IllegalDataAddress),
            3 => Some(Self::IllegalDataValue),
            4 => Some(Self::ServerDeviceFailure),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
            Self::ServerDeviceFailure => "server device failure",
        };
        write!(f, "{} ({})", name, *self as u8)
    }
}

/// Errors produced by the protocol engine.
///
/// `Clone + PartialEq` so a session can retain its last error for host
/// inspection and tests can assert on outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Request validation failed; the corresponding exception PDU has been
    /// (or would have been, on broadcast) transmitted.
    #[error("modbus exception: {0}")]
    Exception(ExceptionCode),

    /// The remote device answered with an exception PDU.
    #[error("remote exception for function {function:#04x}: code {code}")]
    RemoteException {
        /// Original function code (high bit stripped).
        function: u8,
        /// Exception code byte as received.
        code: u8,
    },

    /// No usable reply: response timeout, or a frame that failed CRC.
    #[error("no reply from slave")]
    NoReply,

    /// Received CRC does not match the computed one.
    #[error("CRC mismatch: computed {computed:#06x}, received {received:#06x}")]
    BadCrc {
        /// CRC computed over the received payload.
        computed: u16,
        /// CRC carried by the frame.
        received: u16,
    },

    /// Frame would exceed the fixed buffer capacity; the receive cursor has
    /// been reset.
    #[error("frame buffer overflow")]
    BufferOverflow,

    /// A complete frame arrived but is shorter than any valid PDU.
    #[error("frame too short: {len} bytes")]
    FrameTooShort {
        /// Received frame length.
        len: usize,
    },

    /// Function code outside the supported set {1, 2, 3, 4, 5, 6, 8, 15, 16}.
    #[error("unsupported function code {code:#04x}")]
    InvalidFunction {
        /// Offending function code.
        code: u8,
    },

    /// `query` was invoked on an engine configured as a slave.
    #[error("engine is not configured as master")]
    NotMaster,

    /// `query` was invoked while a previous query is still awaiting its reply.
    #[error("previous query still pending")]
    Busy,

    /// Telegram slave id outside 0..=247.
    #[error("invalid slave id {id}")]
    InvalidSlaveId {
        /// Offending id.
        id: u8,
    },

    /// The caller-owned register image is too small for the operation.
    #[error("register image too small: need {needed} words, got {len}")]
    ImageTooSmall {
        /// Words required by the telegram.
        needed: usize,
        /// Words supplied by the caller.
        len: usize,
    },
}

impl ModbusError {
    /// Convenience constructor for protocol exceptions.
    #[inline]
    pub fn exception(code: ExceptionCode) -> Self {
        Self::Exception(code)
    }

    /// The exception code to encode on the wire for this error, if any.
    ///
    /// `InvalidFunction` maps to [`ExceptionCode::IllegalFunction`] so the
    /// slave pipeline can answer unsupported requests uniformly.
    pub fn wire_exception(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception(code) => Some(*code),
            Self::InvalidFunction { .. } => Some(ExceptionCode::IllegalFunction),
            _ => None,
        }
    }

    /// True for errors that represent a remote or local protocol exception.
    #[inline]
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_) | Self::RemoteException { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_code_roundtrip() {
        for code in [1u8, 2, 3, 4] {
            let exc = ExceptionCode::from_u8(code).unwrap();
            assert_eq!(exc.to_u8(), code);
        }
        assert_eq!(ExceptionCode::from_u8(0), None);
        assert_eq!(ExceptionCode::from_u8(5), None);
    }

    #[test]
    fn test_wire_exception_mapping() {
        let err = ModbusError::exception(ExceptionCode::IllegalDataAddress);
        assert_eq!(err.wire_exception(), Some(ExceptionCode::IllegalDataAddress));

        let err = ModbusError::InvalidFunction { code: 0x2B };
        assert_eq!(err.wire_exception(), Some(ExceptionCode::IllegalFunction));

        assert_eq!(ModbusError::NoReply.wire_exception(), None);
        assert_eq!(ModbusError::Busy.wire_exception(), None);
    }

    #[test]
    fn test_is_exception() {
        assert!(ModbusError::Exception(ExceptionCode::IllegalFunction).is_exception());
        assert!(ModbusError::RemoteException {
            function: 3,
            code: 2
        }
        .is_exception());
        assert!(!ModbusError::NoReply.is_exception());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ModbusError::BadCrc {
            computed: 0x8776,
            received: 0x1234,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x8776"));
        assert!(msg.contains("0x1234"));
    }
}
