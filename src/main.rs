#![no_std]
#![no_main]

//! Smart-lock firmware entry point for nRF52820 + SoftDevice S140.
//!
//! Wires the hardware-agnostic session core to the SoftDevice: GATT
//! registration happens once during bring-up, the advertising/connection
//! loop feeds GAP events into the server, and a small application task
//! consumes command writes and drives the lock state.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{error, info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::{config::Config, interrupt};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_futures::yield_now;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, WriteOp};
use nrf_softdevice::ble::{peripheral, Connection, Uuid};
use nrf_softdevice::{Config as SdConfig, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use smartlock_firmware::app::{indication, LockCommand, LockState};
use smartlock_firmware::ble::advertising::{AdvertisingParams, ADV_INTERVAL_MAX};
use smartlock_firmware::ble::dispatch::{AccessOp, AccessRequest, ResponseBuffer};
use smartlock_firmware::ble::registry::{ServiceDef, LOCK_CHARACTERISTICS, LOCK_SERVICE};
use smartlock_firmware::ble::server::{EventHooks, GapEvent, LockServer, ServerConfig};
use smartlock_firmware::ble::session::{SessionHandle, SESSION_NONE};
use smartlock_firmware::ble::transport::{
    CharacteristicHandles, ServiceHandles, Transport, TransportError,
};
use smartlock_firmware::indicator::{Indicator, IndicatorColor};
use smartlock_firmware::protocol::encode_status;

const DEVICE_NAME: &str = "SmartLock";

/// Reason code reported when `gatt_server::run` returns.
const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;

type FirmwareServer = LockServer<SoftdeviceTransport, ChannelHooks>;

/// Connection currently owned by the BLE task; `notify` borrows it.
static ACTIVE_CONN: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

/// Broadcast requested by the advertising controller; consumed by the BLE
/// task loop.
static ADV_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Events from the transport-context hooks to the application task.
enum AppEvent {
    Command(Vec<u8, 32>),
    Connected,
    Disconnected,
}

static APP_EVENTS: Channel<CriticalSectionRawMutex, AppEvent, 8> = Channel::new();

/// Populate the SoftDevice attribute table with the lock service.
///
/// Must run during bring-up, before the scheduler starts.
fn register_lock_service(
    sd: &mut Softdevice,
    service: &ServiceDef,
) -> Result<ServiceHandles, RegisterError> {
    let mut sb = ServiceBuilder::new(sd, Uuid::new_128(service.uuid.as_le_bytes()))?;
    let mut handles = ServiceHandles::default();

    for (i, def) in service.characteristics.iter().enumerate() {
        use smartlock_firmware::ble::registry::char_props;

        let mut props = Properties::new();
        if def.props & char_props::READ != 0 {
            props = props.read();
        }
        if def.props & char_props::WRITE != 0 {
            props = props.write();
        }
        if def.props & char_props::WRITE_WITHOUT_RESPONSE != 0 {
            props = props.write_without_response();
        }
        if def.props & char_props::NOTIFY != 0 {
            props = props.notify();
        }

        let initial = [0u8; 8];
        let attr = Attribute::new(&initial[..(def.max_len as usize).min(initial.len())]);
        let metadata = Metadata::new(props);

        let builder = sb.add_characteristic(Uuid::new_128(def.uuid.as_le_bytes()), attr, metadata)?;
        let assigned = builder.build();
        handles.characteristics[i] = CharacteristicHandles {
            value_handle: assigned.value_handle,
            cccd_handle: assigned.cccd_handle,
        };
    }

    let service_handle = sb.build();
    handles.service_handle = service_handle.handle();

    info!("lock service registered, handle {}", handles.service_handle);
    Ok(handles)
}

/// SoftDevice-backed transport for the session core.
///
/// Registration already happened during bring-up; `register_service`
/// replays the assigned handles. Advertising is a request flag consumed by
/// the BLE task, since the SoftDevice's advertise call is the task's
/// `await` point.
struct SoftdeviceTransport {
    handles: ServiceHandles,
}

impl Transport for SoftdeviceTransport {
    fn register_service(&mut self, service: &ServiceDef) -> Result<ServiceHandles, TransportError> {
        if service.uuid != LOCK_SERVICE.uuid {
            return Err(TransportError::RegisterRejected);
        }
        Ok(self.handles)
    }

    fn start_advertising(
        &self,
        _adv_data: &[u8],
        _scan_rsp: &[u8],
        _params: &AdvertisingParams,
    ) -> Result<(), TransportError> {
        ADV_REQUESTED.store(true, Ordering::Release);
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), TransportError> {
        ADV_REQUESTED.store(false, Ordering::Release);
        Ok(())
    }

    fn notify(
        &self,
        _session: SessionHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        ACTIVE_CONN.lock(|cell| match cell.borrow().as_ref() {
            // The SoftDevice refuses only when it is out of HVN buffers.
            Some(conn) => gatt_server::notify_value(conn, value_handle, data)
                .map_err(|_| TransportError::NoBuffers),
            None => Err(TransportError::NotConnected),
        })
    }
}

/// Hooks running on the transport context: hand everything to the
/// application task without blocking.
struct ChannelHooks;

impl EventHooks for ChannelHooks {
    fn on_write(&self, data: &[u8]) {
        let mut bytes = Vec::new();
        let len = data.len().min(bytes.capacity());
        let _ = bytes.extend_from_slice(&data[..len]);

        if APP_EVENTS.try_send(AppEvent::Command(bytes)).is_err() {
            warn!("app event queue full, command dropped");
        }
    }

    fn on_connect(&self, session: SessionHandle) {
        info!("client connected: handle={}", session.raw());
        if APP_EVENTS.try_send(AppEvent::Connected).is_err() {
            warn!("app event queue full, connect event dropped");
        }
    }

    fn on_disconnect(&self) {
        info!("client disconnected");
        if APP_EVENTS.try_send(AppEvent::Disconnected).is_err() {
            warn!("app event queue full, disconnect event dropped");
        }
    }
}

/// Indicator that reports colors over the log; the reference board's LED
/// driver plugs in here.
struct LogIndicator;

impl Indicator for LogIndicator {
    type Error = core::convert::Infallible;

    fn set_color(&mut self, color: IndicatorColor) -> Result<(), Self::Error> {
        info!("indicator: {:?}", color);
        Ok(())
    }
}

/// Adapter between `gatt_server::run` and the session core's dispatcher.
struct GattAdapter {
    server: &'static FirmwareServer,
    handles: ServiceHandles,
}

impl gatt_server::Server for GattAdapter {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        for (i, assigned) in self.handles.characteristics.iter().enumerate() {
            if handle == assigned.value_handle {
                let request = AccessRequest {
                    uuid: LOCK_CHARACTERISTICS[i].uuid,
                    op: AccessOp::Write,
                    payload: data,
                };
                let mut response = ResponseBuffer::new();
                if let Err(e) = self.server.handle_access(&request, &mut response) {
                    warn!("write rejected with ATT error {:#04x}", e.code());
                }
                return None;
            }

            if assigned.cccd_handle != 0 && handle == assigned.cccd_handle && !data.is_empty() {
                let _ = self.server.handle_gap_event(GapEvent::Subscribe {
                    attr_handle: assigned.value_handle,
                    notifications: data[0] & 0x01 != 0,
                });
                return None;
            }
        }

        warn!("write to unknown handle {}", handle);
        None
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("starting smart-lock firmware");

    let mut nrf_config = Config::default();
    // Keep interrupt priorities clear of the SoftDevice reserved levels
    // (0, 1, 4).
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;
    let _peripherals = embassy_nrf::init(nrf_config);

    let sd_config = SdConfig {
        clock: Some(nrf_softdevice::raw::nrf_clock_lf_cfg_t {
            source: nrf_softdevice::raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: nrf_softdevice::raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(nrf_softdevice::raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(nrf_softdevice::raw::ble_gatt_conn_cfg_t { att_mtu: 247 }),
        gatts_attr_tab_size: Some(nrf_softdevice::raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 1408,
        }),
        gap_role_count: Some(nrf_softdevice::raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    info!("SoftDevice enabled");

    // Registration needs the exclusive reference; everything after runs on
    // the shared one.
    let handles = unwrap!(register_lock_service(sd, &LOCK_SERVICE));
    let sd: &'static Softdevice = sd;

    let transport = SoftdeviceTransport { handles };
    static SERVER: StaticCell<FirmwareServer> = StaticCell::new();
    let server = match LockServer::init(transport, ChannelHooks, &ServerConfig::new(DEVICE_NAME)) {
        Ok(server) => &*SERVER.init(server),
        Err(e) => defmt::panic!("lock server init failed: {:?}", e),
    };

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd, server, handles)));
    unwrap!(spawner.spawn(app_task(sd, server)));

    let mut indicator = LogIndicator;
    let _ = indicator.set_color(indication::BOOT);
    info!("system ready");
}

/// Advertising/connection loop: broadcast while requested, then run the
/// GATT server on the accepted connection until it drops.
#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static FirmwareServer, handles: ServiceHandles) {
    let adapter = GattAdapter { server, handles };

    loop {
        if !ADV_REQUESTED.load(Ordering::Acquire) {
            yield_now().await;
            continue;
        }

        let config = peripheral::Config {
            interval: ADV_INTERVAL_MAX as u32,
            ..Default::default()
        };
        let advertisement = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: server.adv_data(),
            scan_data: server.scan_response(),
        };

        match peripheral::advertise_connectable(sd, advertisement, &config).await {
            Ok(conn) => {
                // Broadcast ended with this connection.
                ADV_REQUESTED.store(false, Ordering::Release);

                let raw = conn.handle().unwrap_or(SESSION_NONE);
                ACTIVE_CONN.lock(|cell| *cell.borrow_mut() = Some(conn.clone()));

                let _ = server.handle_gap_event(GapEvent::Connect {
                    handle: raw,
                    status: 0,
                });

                let result = gatt_server::run(&conn, &adapter, |_| {}).await;
                info!("gatt server exited: {:?}", defmt::Debug2Format(&result));

                ACTIVE_CONN.lock(|cell| *cell.borrow_mut() = None);
                if let Err(e) = server.handle_gap_event(GapEvent::Disconnect {
                    reason: HCI_REMOTE_USER_TERMINATED,
                }) {
                    error!("advertising restart failed: {:?}", e);
                }
            }
            Err(e) => {
                warn!("advertising failed: {:?}", defmt::Debug2Format(&e));
                ADV_REQUESTED.store(false, Ordering::Release);
                if let Err(e) = server.handle_gap_event(GapEvent::Connect {
                    handle: SESSION_NONE,
                    status: 1,
                }) {
                    error!("advertising restart failed: {:?}", e);
                }
            }
        }
    }
}

/// Application task: interpret commands, update lock state, push the new
/// status to the attribute table and to the client.
#[embassy_executor::task]
async fn app_task(sd: &'static Softdevice, server: &'static FirmwareServer) {
    let mut indicator = LogIndicator;

    loop {
        match APP_EVENTS.receive().await {
            AppEvent::Connected => {
                let _ = indicator.set_color(indication::CONNECTED);
            }
            AppEvent::Disconnected => {
                let _ = indicator.set_color(indication::DISCONNECTED);
            }
            AppEvent::Command(bytes) => {
                let Some(command) = LockCommand::parse(&bytes) else {
                    warn!("unknown command, {} bytes", bytes.len());
                    continue;
                };

                let state = LockState::apply(command);
                info!("lock state: {:?}", state);
                let _ = indicator.set_color(state.indicator_color());

                server.update_status_value(state.status_value());
                // Reads are served from the attribute table; keep it
                // in step with the stored value.
                if gatt_server::set_value(
                    sd,
                    server.status_value_handle(),
                    &encode_status(state.status_value()),
                )
                .is_err()
                {
                    warn!("failed to update status attribute");
                }

                if let Err(e) = server.notify(state.notification()) {
                    warn!("status notification failed: {:?}", e);
                }
            }
        }
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
