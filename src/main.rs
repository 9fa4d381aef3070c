#![no_std]
#![no_main]

use core::mem;

use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_nrf::{config::Config, interrupt};
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::{raw, Config as SdConfig, Flash, Softdevice};
use panic_probe as _;

use nrf52840_ota_firmware::ble::advertising;
use nrf52840_ota_firmware::ble::notifications::{forward_status, GattStatusSink, OTA_EVENTS};
use nrf52840_ota_firmware::ble::services::OtaServer;
use nrf52840_ota_firmware::config::{ATT_MTU, DEVICE_NAME, STAGING_PARTITION};
use nrf52840_ota_firmware::core::system::NrfSystem;
use nrf52840_ota_firmware::ota::UpdateController;
use nrf52840_ota_firmware::storage::StagingStore;

type FirmwareController = UpdateController<Flash, GattStatusSink, NrfSystem>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting nRF52840 OTA firmware");

    // Configure nRF peripherals
    let mut nrf_config = Config::default();
    // Keep clear of the SoftDevice reserved levels (0, 1, 4)
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;

    let _peripherals = embassy_nrf::init(nrf_config);

    info!("Embassy initialized, configuring SoftDevice...");

    let sd_config = SdConfig {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        // Service and characteristic UUIDs differ in their base bytes
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t { vs_uuid_count: 4 }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    info!("SoftDevice enabled");

    let server = unwrap!(OtaServer::new(sd));
    let sd: &'static Softdevice = sd;

    let store = match StagingStore::open(Flash::take(sd), STAGING_PARTITION) {
        Ok(store) => store,
        Err(e) => defmt::panic!("Staging partition unusable: {}", e),
    };
    let sink = GattStatusSink::new(sd, server.status_handle());
    let controller = UpdateController::new(store, sink, NrfSystem);

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ota_task(controller)));
    unwrap!(spawner.spawn(ble_task(sd, server)));

    info!("System initialized, entering main loop");

    loop {
        Timer::after(Duration::from_secs(10)).await;
        info!("Heartbeat - system running");
    }
}

/// Drains the OTA queue, one event at a time
#[embassy_executor::task]
async fn ota_task(mut controller: FirmwareController) {
    loop {
        let event = OTA_EVENTS.receive().await;
        // Failures are already logged and reported through the status record
        let _ = controller.dispatch(event).await;
    }
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: OtaServer) {
    loop {
        let conn = match advertising::advertise(sd).await {
            Ok(conn) => conn,
            Err(e) => {
                error!("BLE advertising failed: {:?}", defmt::Debug2Format(&e));
                Timer::after(Duration::from_secs(1)).await;
                continue;
            }
        };

        info!("Central connected");

        // gatt_server::run returns once the connection drops
        let gatt = gatt_server::run(&conn, &server, |_| {});
        let status = forward_status(&conn, server.status_handle());
        select(gatt, status).await;

        info!("Central disconnected");
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
