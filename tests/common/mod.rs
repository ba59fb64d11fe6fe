//! Shared test doubles: a recording mock transport and recording hooks.
//!
//! Both hand out `Rc`-backed clones so a test can keep inspecting the
//! state after moving the originals into the server.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smartlock_firmware::ble::advertising::AdvertisingParams;
use smartlock_firmware::ble::registry::{ServiceDef, LOCK_SERVICE_UUID};
use smartlock_firmware::ble::server::{EventHooks, GapEvent, LockServer, ServerConfig};
use smartlock_firmware::ble::session::SessionHandle;
use smartlock_firmware::ble::transport::{
    CharacteristicHandles, ServiceHandles, Transport, TransportError,
};
use smartlock_firmware::protocol::DateTimeRecord;

pub const DEVICE_NAME: &str = "SmartLock";

// Handles the mock assigns at registration, in table order.
pub const COMMAND_VALUE_HANDLE: u16 = 0x12;
pub const STATUS_VALUE_HANDLE: u16 = 0x14;
pub const STATUS_CCCD_HANDLE: u16 = 0x15;
pub const DATETIME_VALUE_HANDLE: u16 = 0x17;

pub type TestServer = LockServer<MockTransport, RecordingHooks>;

#[derive(Default)]
pub struct TransportState {
    pub registered: Cell<bool>,
    pub advertising: Cell<bool>,
    pub adv_starts: Cell<usize>,
    pub adv_stops: Cell<usize>,
    pub adv_data: RefCell<Vec<u8>>,
    pub scan_rsp: RefCell<Vec<u8>>,
    pub adv_params: Cell<Option<AdvertisingParams>>,
    /// Every delivered notification: (session handle, value handle, bytes).
    pub notifications: RefCell<Vec<(u16, u16, Vec<u8>)>>,
    /// Notify calls that reached the transport, including failed ones.
    pub notify_attempts: Cell<usize>,
    pub fail_register: Cell<bool>,
    pub fail_adv_start: Cell<bool>,
    pub notify_error: Cell<Option<TransportError>>,
}

/// Recording transport; clones share one state.
#[derive(Clone, Default)]
pub struct MockTransport(pub Rc<TransportState>);

impl Transport for MockTransport {
    fn register_service(&mut self, service: &ServiceDef) -> Result<ServiceHandles, TransportError> {
        assert_eq!(service.uuid, LOCK_SERVICE_UUID);
        if self.0.fail_register.get() {
            return Err(TransportError::RegisterRejected);
        }

        self.0.registered.set(true);
        Ok(ServiceHandles {
            service_handle: 0x10,
            characteristics: [
                CharacteristicHandles {
                    value_handle: COMMAND_VALUE_HANDLE,
                    cccd_handle: 0,
                },
                CharacteristicHandles {
                    value_handle: STATUS_VALUE_HANDLE,
                    cccd_handle: STATUS_CCCD_HANDLE,
                },
                CharacteristicHandles {
                    value_handle: DATETIME_VALUE_HANDLE,
                    cccd_handle: 0,
                },
            ],
        })
    }

    fn start_advertising(
        &self,
        adv_data: &[u8],
        scan_rsp: &[u8],
        params: &AdvertisingParams,
    ) -> Result<(), TransportError> {
        if self.0.fail_adv_start.get() {
            return Err(TransportError::AdvertisingRejected);
        }

        self.0.adv_starts.set(self.0.adv_starts.get() + 1);
        self.0.advertising.set(true);
        *self.0.adv_data.borrow_mut() = adv_data.to_vec();
        *self.0.scan_rsp.borrow_mut() = scan_rsp.to_vec();
        self.0.adv_params.set(Some(*params));
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), TransportError> {
        self.0.adv_stops.set(self.0.adv_stops.get() + 1);
        self.0.advertising.set(false);
        Ok(())
    }

    fn notify(
        &self,
        session: SessionHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.0.notify_attempts.set(self.0.notify_attempts.get() + 1);
        if let Some(e) = self.0.notify_error.get() {
            return Err(e);
        }

        self.0
            .notifications
            .borrow_mut()
            .push((session.raw(), value_handle, data.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct HookState {
    pub writes: RefCell<Vec<Vec<u8>>>,
    pub connects: RefCell<Vec<u16>>,
    pub disconnects: Cell<usize>,
    pub time_sets: RefCell<Vec<DateTimeRecord>>,
}

/// Recording hooks; clones share one state.
#[derive(Clone, Default)]
pub struct RecordingHooks(pub Rc<HookState>);

impl EventHooks for RecordingHooks {
    fn on_write(&self, data: &[u8]) {
        self.0.writes.borrow_mut().push(data.to_vec());
    }

    fn on_connect(&self, session: SessionHandle) {
        self.0.connects.borrow_mut().push(session.raw());
    }

    fn on_disconnect(&self) {
        self.0.disconnects.set(self.0.disconnects.get() + 1);
    }

    fn on_time_set(&self, record: DateTimeRecord) {
        self.0.time_sets.borrow_mut().push(record);
    }
}

/// Initialized server plus inspection handles on its test doubles.
pub fn init_server() -> (TestServer, MockTransport, RecordingHooks) {
    let transport = MockTransport::default();
    let hooks = RecordingHooks::default();
    let server = LockServer::init(
        transport.clone(),
        hooks.clone(),
        &ServerConfig::new(DEVICE_NAME),
    )
    .expect("server init");
    (server, transport, hooks)
}

/// Drive a successful GAP connect event.
pub fn connect(server: &TestServer, handle: u16) {
    server
        .handle_gap_event(GapEvent::Connect { handle, status: 0 })
        .expect("connect event");
}

/// Drive a GAP disconnect event.
pub fn disconnect(server: &TestServer) {
    server
        .handle_gap_event(GapEvent::Disconnect { reason: 0x13 })
        .expect("disconnect event");
}
