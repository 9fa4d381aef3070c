//! BLE Transport
//!
//! GATT service, advertising and status notification plumbing on the S140
//! SoftDevice. Feeds the OTA task through bounded queues; nothing here touches
//! the update session directly.

pub mod advertising;
pub mod notifications;
pub mod services;
