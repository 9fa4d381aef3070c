//! Advertising
//!
//! Connectable, scannable undirected advertising with the device name in the
//! advertising data and the OTA service UUID in the scan response.

use defmt::info;
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::Softdevice;

use crate::config::{DEVICE_NAME, SERVICE_UUID};

const SERVICE_UUID_LE: [u8; 16] = SERVICE_UUID.to_le_bytes();

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name(DEVICE_NAME)
    .build();

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[SERVICE_UUID_LE])
    .build();

/// Advertise until a central connects
pub async fn advertise(sd: &Softdevice) -> Result<Connection, AdvertiseError> {
    let config = peripheral::Config::default();
    let adv = ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };

    info!("Advertising as {}", DEVICE_NAME);
    peripheral::advertise_connectable(sd, adv, &config).await
}
