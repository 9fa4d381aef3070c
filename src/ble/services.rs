//! OTA GATT Service
//!
//! One primary service with three characteristics:
//! - firmware data: write / write without response, one image chunk per write
//! - firmware status: read / notify, the 8-byte status record
//! - firmware control: write, `[command, params...]`
//!
//! Writes are decoded here and queued for the OTA task. The SoftDevice
//! callback never waits on flash. Control writes are authorized: an unknown
//! command or a bad parameter is refused with an ATT error instead of being
//! acknowledged and dropped.

use defmt::{debug, info, warn};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, DeferredWriteReply, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, GattError, Uuid};
use nrf_softdevice::Softdevice;

use crate::ble::notifications::OTA_EVENTS;
use crate::config::{
    FIRMWARE_CONTROL_UUID, FIRMWARE_DATA_UUID, FIRMWARE_STATUS_UUID, MAX_CHUNK_LEN, MAX_CONTROL_LEN, SERVICE_UUID,
};
use crate::core::protocol::{Command, ProtocolError, ATT_ERR_REQUEST_NOT_SUPPORTED};
use crate::core::status::StatusRecord;
use crate::ota::OtaEvent;

fn uuid(value: u128) -> Uuid {
    Uuid::new_128(&value.to_le_bytes())
}

/// Attribute handles of the OTA service
pub struct OtaServer {
    data_handle: u16,
    status_handle: u16,
    control_handle: u16,
}

impl OtaServer {
    /// Register the service in the SoftDevice attribute table
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, uuid(SERVICE_UUID))?;

        let data = sb
            .add_characteristic(
                uuid(FIRMWARE_DATA_UUID),
                Attribute::new(&[0u8; 0][..]).variable_len(MAX_CHUNK_LEN as u16),
                Metadata::new(Properties::new().write().write_without_response()),
            )?
            .build();

        let status = sb
            .add_characteristic(
                uuid(FIRMWARE_STATUS_UUID),
                Attribute::new(StatusRecord::IDLE.into_bytes()),
                Metadata::new(Properties::new().read().notify()),
            )?
            .build();

        let control = sb
            .add_characteristic(
                uuid(FIRMWARE_CONTROL_UUID),
                Attribute::new(&[0u8; 0][..])
                    .variable_len(MAX_CONTROL_LEN as u16)
                    .deferred_write(),
                Metadata::new(Properties::new().write()),
            )?
            .build();

        let _service = sb.build();

        info!(
            "OTA service registered: data={}, status={}, control={}",
            data.value_handle, status.value_handle, control.value_handle
        );

        Ok(Self {
            data_handle: data.value_handle,
            status_handle: status.value_handle,
            control_handle: control.value_handle,
        })
    }

    /// Value handle of the status characteristic
    pub fn status_handle(&self) -> u16 {
        self.status_handle
    }

    fn on_data(&self, data: &[u8]) {
        if OTA_EVENTS.push_data(data).is_err() {
            warn!("Data write of {} bytes dropped", data.len());
        }
    }

    fn on_control(&self, data: &[u8], reply: DeferredWriteReply) {
        let command = match Command::parse(data) {
            Ok(command) => command,
            Err(e) => {
                warn!("Control write rejected: {}", e);
                if let Err(e) = reply.reply(Err(gatt_error(e))) {
                    warn!("Control reply failed: {:?}", defmt::Debug2Format(&e));
                }
                return;
            }
        };
        debug!("Control command: {}", command);
        if let Err(e) = reply.reply(Ok(None)) {
            warn!("Control reply failed: {:?}", defmt::Debug2Format(&e));
        }
        if OTA_EVENTS.push(OtaEvent::Control(command)).is_err() {
            warn!("OTA queue full, dropping {}", command.operation());
        }
    }
}

fn gatt_error(err: ProtocolError) -> GattError {
    match err.att_error() {
        ATT_ERR_REQUEST_NOT_SUPPORTED => GattError::ATTERR_REQUEST_NOT_SUPPORTED,
        _ => GattError::ATTERR_INVALID_ATT_VAL_LENGTH,
    }
}

impl gatt_server::Server for OtaServer {
    type Event = ();

    fn on_write(&self, _conn: &Connection, handle: u16, _op: WriteOp, _offset: usize, data: &[u8]) -> Option<()> {
        if handle == self.data_handle {
            self.on_data(data);
        }
        None
    }

    fn on_deferred_write(
        &self,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
        reply: DeferredWriteReply,
    ) -> Option<()> {
        if handle == self.control_handle {
            self.on_control(data, reply);
        }
        None
    }
}
