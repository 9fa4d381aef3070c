//! Core Update Infrastructure
//!
//! Hardware-independent building blocks: the session model, the control
//! channel wire format, the status record and the restart seam.

pub mod protocol;
pub mod session;
pub mod status;
pub mod system;
