#![cfg_attr(not(test), no_std)]

//! nRF52840 BLE Over-the-Air Update Firmware Library
//!
//! Receives a firmware image over BLE in small chunks, stages it in a secondary
//! flash partition, verifies it with CRC-32 and hands over to the bootloader.
//! Organized into layers:
//!
//! - `core`: session model, control-channel wire format, status record, restart seam
//! - `storage`: staging partition on top of an async NOR flash
//! - `ota`: update controller state machine, verifier and status reporter
//! - `ble`: GATT service and notification plumbing (`firmware` feature only)

pub mod config;
pub mod core;
pub mod ota;
pub mod storage;

#[cfg(feature = "firmware")]
pub mod ble;

#[cfg(feature = "defmt")]
pub(crate) use defmt as log;

#[cfg(not(feature = "defmt"))]
pub(crate) use ::log;
