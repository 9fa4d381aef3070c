//! Status Notifications
//!
//! Queues between the SoftDevice callbacks, the OTA task and the connection.
//! GATT writes are queued to [`OTA_EVENTS`]; status records published by the
//! controller are written into the attribute table (so reads see them) and
//! queued to [`STATUS_NOTIFICATIONS`] for the connected central.

use defmt::{debug, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::ble::Connection;
use nrf_softdevice::Softdevice;

use crate::config::{EVENT_QUEUE_DEPTH, STATUS_QUEUE_DEPTH};
use crate::core::status::StatusRecord;
use crate::ota::{EventQueue, StatusSink};

/// GATT writes waiting for the OTA task
pub static OTA_EVENTS: EventQueue<CriticalSectionRawMutex, EVENT_QUEUE_DEPTH> = EventQueue::new();

/// Status records waiting to be notified
pub static STATUS_NOTIFICATIONS: Channel<CriticalSectionRawMutex, StatusRecord, STATUS_QUEUE_DEPTH> = Channel::new();

/// Status sink backed by the status characteristic
pub struct GattStatusSink {
    sd: &'static Softdevice,
    value_handle: u16,
}

impl GattStatusSink {
    pub fn new(sd: &'static Softdevice, value_handle: u16) -> Self {
        Self { sd, value_handle }
    }
}

impl StatusSink for GattStatusSink {
    fn publish(&mut self, record: &StatusRecord) {
        if let Err(e) = gatt_server::set_value(self.sd, self.value_handle, record.as_bytes()) {
            warn!("Status value update failed: {:?}", defmt::Debug2Format(&e));
        }
        if STATUS_NOTIFICATIONS.try_send(*record).is_err() {
            warn!("Status notification queue full, dropping record");
        }
    }
}

/// Notify queued status records on `conn` until the future is dropped.
///
/// Records queued while nobody was connected are stale and discarded; the
/// central reads the characteristic for the current value.
pub async fn forward_status(conn: &Connection, value_handle: u16) {
    STATUS_NOTIFICATIONS.clear();

    loop {
        let record = STATUS_NOTIFICATIONS.receive().await;
        match gatt_server::notify_value(conn, value_handle, record.as_bytes()) {
            Ok(()) => debug!("Status notified: {:02x}", record.as_bytes()),
            Err(e) => warn!("Status notification failed: {:?}", defmt::Debug2Format(&e)),
        }
    }
}
