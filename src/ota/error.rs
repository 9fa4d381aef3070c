use core::fmt;

use crate::core::protocol::{Operation, ProtocolError};
use crate::core::status::Status;
use crate::storage::{StorageError, StorageOp};

/// Update failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtaError {
    /// START asked for more than the staging slot holds
    SizeExceedsCapacity { requested: u32, capacity: u32 },
    /// Operation not allowed in the current status
    SequenceViolation { status: Status, operation: Operation },
    /// Chunk would run past the declared image size
    ChunkOverrun { received: u32, chunk_len: u32, expected: u32 },
    StorageFailure(StorageOp),
    VerificationMismatch { expected: u32, computed: u32 },
    /// Unknown control command byte
    UnsupportedOperation(u8),
    /// Known command with an empty or truncated payload
    MalformedCommand,
    /// Writes were dropped between the transport and the controller
    EventsLost,
}

impl OtaError {
    /// Rejected at the control write without touching the session
    pub fn is_local_rejection(&self) -> bool {
        matches!(self, Self::UnsupportedOperation(_) | Self::MalformedCommand)
    }
}

impl From<StorageError> for OtaError {
    fn from(err: StorageError) -> Self {
        OtaError::StorageFailure(err.op)
    }
}

impl From<ProtocolError> for OtaError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownCommand(code) => OtaError::UnsupportedOperation(code),
            ProtocolError::Empty | ProtocolError::MissingParameter(_) | ProtocolError::BufferFull => {
                OtaError::MalformedCommand
            }
        }
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeExceedsCapacity { requested, capacity } => {
                write!(f, "image of {} bytes exceeds staging capacity {}", requested, capacity)
            }
            Self::SequenceViolation { status, operation } => {
                write!(f, "{} not allowed while {}", operation, status)
            }
            Self::ChunkOverrun {
                received,
                chunk_len,
                expected,
            } => write!(
                f,
                "chunk of {} bytes at {} overruns image size {}",
                chunk_len, received, expected
            ),
            Self::StorageFailure(op) => write!(f, "storage {} failed", op),
            Self::VerificationMismatch { expected, computed } => write!(
                f,
                "CRC mismatch: expected 0x{:08X}, computed 0x{:08X}",
                expected, computed
            ),
            Self::UnsupportedOperation(code) => write!(f, "unsupported operation 0x{:02X}", code),
            Self::MalformedCommand => write!(f, "malformed control command"),
            Self::EventsLost => write!(f, "writes lost on a full event queue"),
        }
    }
}
