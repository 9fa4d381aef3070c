//! OTA Control Protocol Definitions
//!
//! Wire format of the firmware control characteristic:
//! - Request: [Command Code (1 byte)] [Parameters (little-endian)]
//!
//! The firmware data characteristic carries raw image bytes with no framing;
//! the write offset is implied by the session cursor.

use core::fmt;

use heapless::Vec;

use crate::config::MAX_CONTROL_LEN;

/// Command codes written by the client to the control characteristic
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandCode {
    /// Begin a transfer, followed by the image size (u32 LE)
    Start = 0x01,
    Reset = 0x02,
    /// Check the staged image, optionally followed by the expected CRC-32 (u32 LE)
    Verify = 0x03,
    Flash = 0x04,
    Abort = 0x05,
    SwapAndReboot = 0x06,
}

impl CommandCode {
    /// Convert from raw u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Start),
            0x02 => Some(Self::Reset),
            0x03 => Some(Self::Verify),
            0x04 => Some(Self::Flash),
            0x05 => Some(Self::Abort),
            0x06 => Some(Self::SwapAndReboot),
            _ => None,
        }
    }

    /// Convert to raw u8 value
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A decoded control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Start { size: u32 },
    Reset,
    /// `None` means report only, don't compare.
    Verify { expected_crc: Option<u32> },
    Flash,
    Abort,
    SwapAndReboot,
}

/// Everything the update controller can be asked to do.
///
/// `Data` has no control code: chunks arrive on their own characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Start,
    Data,
    Verify,
    Flash,
    Reset,
    Abort,
    SwapAndReboot,
}

/// Protocol error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Zero-length control write
    Empty,
    /// Command byte outside the known set
    UnknownCommand(u8),
    /// Required parameter missing or truncated
    MissingParameter(CommandCode),
    BufferFull,
}

/// ATT error: Request Not Supported
pub const ATT_ERR_REQUEST_NOT_SUPPORTED: u8 = 0x06;
/// ATT error: Invalid Attribute Value Length
pub const ATT_ERR_INVALID_ATT_VAL_LENGTH: u8 = 0x0D;

impl ProtocolError {
    /// ATT error code returned to the client for a rejected control write
    pub fn att_error(&self) -> u8 {
        match self {
            Self::UnknownCommand(_) => ATT_ERR_REQUEST_NOT_SUPPORTED,
            Self::Empty | Self::MissingParameter(_) | Self::BufferFull => ATT_ERR_INVALID_ATT_VAL_LENGTH,
        }
    }
}

impl Command {
    /// Parse a control characteristic write.
    ///
    /// Bytes after the parameter are ignored. A VERIFY with less than four
    /// parameter bytes carries no comparison value.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let code = serialization::read_u8(data, 0).ok_or(ProtocolError::Empty)?;
        let code = CommandCode::from_u8(code).ok_or(ProtocolError::UnknownCommand(code))?;
        let params = &data[1..];

        let command = match code {
            CommandCode::Start => {
                let size = serialization::read_u32_le(params, 0)
                    .ok_or(ProtocolError::MissingParameter(code))?;
                Self::Start { size }
            }
            CommandCode::Reset => Self::Reset,
            CommandCode::Verify => Self::Verify {
                expected_crc: serialization::read_u32_le(params, 0),
            },
            CommandCode::Flash => Self::Flash,
            CommandCode::Abort => Self::Abort,
            CommandCode::SwapAndReboot => Self::SwapAndReboot,
        };

        Ok(command)
    }

    /// Serialize the command for transmission (client side)
    pub fn serialize(&self) -> Result<Vec<u8, MAX_CONTROL_LEN>, ProtocolError> {
        let mut buffer = Vec::new();
        serialization::write_u8(&mut buffer, self.code().to_u8())?;

        match *self {
            Self::Start { size } => serialization::write_u32_le(&mut buffer, size)?,
            Self::Verify {
                expected_crc: Some(crc),
            } => serialization::write_u32_le(&mut buffer, crc)?,
            _ => {}
        }

        Ok(buffer)
    }

    pub fn code(&self) -> CommandCode {
        match self {
            Self::Start { .. } => CommandCode::Start,
            Self::Reset => CommandCode::Reset,
            Self::Verify { .. } => CommandCode::Verify,
            Self::Flash => CommandCode::Flash,
            Self::Abort => CommandCode::Abort,
            Self::SwapAndReboot => CommandCode::SwapAndReboot,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Start { .. } => Operation::Start,
            Self::Reset => Operation::Reset,
            Self::Verify { .. } => Operation::Verify,
            Self::Flash => Operation::Flash,
            Self::Abort => Operation::Abort,
            Self::SwapAndReboot => Operation::SwapAndReboot,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::Data => "DATA",
            Self::Verify => "VERIFY",
            Self::Flash => "FLASH",
            Self::Reset => "RESET",
            Self::Abort => "ABORT",
            Self::SwapAndReboot => "SWAP_AND_REBOOT",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty control write"),
            Self::UnknownCommand(code) => write!(f, "unsupported command 0x{:02X}", code),
            Self::MissingParameter(code) => write!(f, "command 0x{:02X} is missing its parameter", code.to_u8()),
            Self::BufferFull => write!(f, "control buffer full"),
        }
    }
}

/// Helper functions for little-endian serialization
pub mod serialization {
    use super::ProtocolError;
    use heapless::Vec;

    pub fn write_u8<const N: usize>(buffer: &mut Vec<u8, N>, value: u8) -> Result<(), ProtocolError> {
        buffer.push(value).map_err(|_| ProtocolError::BufferFull)
    }

    pub fn write_u32_le<const N: usize>(buffer: &mut Vec<u8, N>, value: u32) -> Result<(), ProtocolError> {
        buffer
            .extend_from_slice(&value.to_le_bytes())
            .map_err(|_| ProtocolError::BufferFull)
    }

    pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
        data.get(offset).copied()
    }

    pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
