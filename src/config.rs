//! Build-time configuration
//!
//! Board-independent constants for the OTA service. SoftDevice settings live in
//! the binary next to the peripheral init.

use crate::storage::Partition;

/// Complete local name used in advertising.
pub const DEVICE_NAME: &str = "AlexBlue";

/// Negotiated ATT MTU requested from the SoftDevice.
pub const ATT_MTU: u16 = 247;

/// Largest chunk a single write can carry (ATT MTU minus the 3-byte write header).
pub const MAX_CHUNK_LEN: usize = ATT_MTU as usize - 3;

/// Control writes are a command byte plus at most a 4-byte parameter; the
/// characteristic leaves some slack for clients that pad.
pub const MAX_CONTROL_LEN: usize = 8;

/// Read-back window used while computing the image CRC.
pub const VERIFY_WINDOW: usize = 256;

/// Delay between the last status notification and the system reset.
pub const REBOOT_SETTLE_MS: u64 = 100;

/// Depth of the GATT write -> OTA task queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Depth of the status record -> notification queue.
pub const STATUS_QUEUE_DEPTH: usize = 8;

/// Secondary slot on nRF52840 with S140 7.x.
///
/// 0x00000 - 0x27000  SoftDevice
/// 0x27000 - 0x8F000  application (primary slot)
/// 0x8F000 - 0xF7000  staging (secondary slot, last page is the boot trailer)
/// 0xF7000 - 0x100000 bootloader settings / reserved
pub const STAGING_PARTITION: Partition = Partition::new(0x0008_F000, 0x0006_8000);

/// Data stream service carrying the OTA characteristics.
pub const SERVICE_UUID: u128 = 0x12345678_1234_5678_9ABC_DEF012345678;

/// Firmware data characteristic (write / write without response).
pub const FIRMWARE_DATA_UUID: u128 = 0x12345678_1234_5678_9ABC_DEF01234567B;

/// Firmware status characteristic (read / notify).
pub const FIRMWARE_STATUS_UUID: u128 = 0x12345678_1234_5678_9ABC_DEF01234567C;

/// Firmware control characteristic (write).
pub const FIRMWARE_CONTROL_UUID: u128 = 0x12345678_1234_5678_9ABC_DEF01234567D;
