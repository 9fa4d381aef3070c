//! Over-the-air update engine: session state machine, image verification and
//! status reporting on top of the staging store.

use heapless::Vec;

use crate::config::MAX_CHUNK_LEN;
use crate::core::protocol::Command;

pub mod controller;
pub mod error;
pub mod queue;
pub mod reporter;
pub mod transitions;
pub mod verifier;

pub use controller::UpdateController;
pub use error::OtaError;
pub use queue::{EventDropped, EventQueue};
pub use reporter::{StatusReporter, StatusSink};
pub use verifier::crc32;

/// Work item handed from the GATT write callback to the OTA task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaEvent {
    /// Next image chunk from the data characteristic
    Data(Vec<u8, MAX_CHUNK_LEN>),
    /// Decoded control characteristic write
    Control(Command),
    /// One or more writes were lost before reaching the queue
    Overflow,
}

impl OtaEvent {
    /// Copy a data write into an event. `None` if it is longer than a chunk.
    pub fn data(chunk: &[u8]) -> Option<Self> {
        Vec::from_slice(chunk).ok().map(Self::Data)
    }
}
