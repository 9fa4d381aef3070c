//! Update Status and Progress Record
//!
//! Status codes and the fixed 8-byte record exposed on the status
//! characteristic:
//! - byte 0: status code
//! - bytes 1-4: received bytes (u32 LE)
//! - bytes 5-7: low 24 bits of the expected size (LE)
//!
//! Only three bytes of the expected size fit in the record. Sizes of 16 MiB or
//! more are truncated on the wire; see [`MAX_REPORTABLE_SIZE`].

use core::fmt;

/// Length of the status record
pub const STATUS_RECORD_LEN: usize = 8;

/// Largest expected size the record can carry without truncation
pub const MAX_REPORTABLE_SIZE: u32 = 0x00FF_FFFF;

/// Update session status
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Idle = 0x00,
    Receiving = 0x01,
    Received = 0x02,
    Verifying = 0x03,
    Verified = 0x04,
    Flashing = 0x05,
    Complete = 0x06,
    Error = 0xFF,
}

impl Status {
    /// Convert from raw status code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Idle),
            0x01 => Some(Self::Receiving),
            0x02 => Some(Self::Received),
            0x03 => Some(Self::Verifying),
            0x04 => Some(Self::Verified),
            0x05 => Some(Self::Flashing),
            0x06 => Some(Self::Complete),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the session may move from `self` to `next`.
    ///
    /// IDLE, ERROR and RECEIVING (a new START) are reachable from anywhere;
    /// every other edge follows the transfer pipeline.
    pub fn allows(self, next: Status) -> bool {
        match (self, next) {
            (_, Status::Idle | Status::Error | Status::Receiving) => true,
            (Status::Receiving, Status::Received)
            | (Status::Received, Status::Verifying)
            | (Status::Verifying, Status::Verified)
            | (Status::Verified, Status::Flashing)
            | (Status::Flashing, Status::Complete) => true,
            _ => false,
        }
    }
}

/// Human-readable name of a status, as shown by the update client.
pub fn status_name(status: Status) -> &'static str {
    match status {
        Status::Idle => "IDLE",
        Status::Receiving => "RECEIVING",
        Status::Received => "RECEIVED",
        Status::Verifying => "VERIFYING",
        Status::Verified => "VERIFIED",
        Status::Flashing => "FLASHING",
        Status::Complete => "COMPLETE",
        Status::Error => "ERROR",
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(status_name(*self))
    }
}

/// Encoded status record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusRecord([u8; STATUS_RECORD_LEN]);

impl StatusRecord {
    /// Record of a fresh session
    pub const IDLE: Self = Self([0; STATUS_RECORD_LEN]);

    pub fn encode(status: Status, received_bytes: u32, expected_size: u32) -> Self {
        let mut bytes = [0u8; STATUS_RECORD_LEN];
        bytes[0] = status.code();
        bytes[1..5].copy_from_slice(&received_bytes.to_le_bytes());
        bytes[5..8].copy_from_slice(&expected_size.to_le_bytes()[..3]);
        Self(bytes)
    }

    /// Parse a record read from the status characteristic.
    ///
    /// Returns `(status, received_bytes, expected_size_low24)`.
    pub fn decode(bytes: &[u8]) -> Option<(Status, u32, u32)> {
        if bytes.len() < STATUS_RECORD_LEN {
            return None;
        }
        let status = Status::from_code(bytes[0])?;
        let received = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let expected = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], 0]);
        Some((status, received, expected))
    }

    pub fn status(&self) -> Option<Status> {
        Status::from_code(self.0[0])
    }

    pub fn as_bytes(&self) -> &[u8; STATUS_RECORD_LEN] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; STATUS_RECORD_LEN] {
        self.0
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::IDLE
    }
}
