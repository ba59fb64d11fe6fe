//! Lock Peripheral Server
//!
//! Ties the session core together: registers the lock service, owns the
//! session registry, advertising controller, status value, and
//! notification emitter, and exposes the public entry points consumed by
//! the application.
//!
//! GAP and GATT entry points (`handle_gap_event`, `handle_access`) are
//! invoked from the transport worker context, which serializes them.
//! `notify` and `update_status_value` may be called concurrently from
//! application contexts; the only shared mutable state is the session
//! handle and the status value, each a single atomic.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::ble::advertising::{AdvertisingController, AdvertisingParams};
use crate::ble::dispatch::{self, AccessRequest, AttError, ResponseBuffer};
use crate::ble::notifications::NotificationEmitter;
use crate::ble::registry::{LOCK_SERVICE, LOCK_SERVICE_UUID, STATUS_CHARACTERISTIC_INDEX};
use crate::ble::session::{SessionHandle, SessionRegistry};
use crate::ble::transport::Transport;
use crate::error::Error;
use crate::protocol::DateTimeRecord;

/// Application-supplied callbacks, invoked synchronously on the transport
/// worker context. Implementations must return quickly and must not
/// block: they hold up all other BLE processing while running.
pub trait EventHooks {
    /// One accepted Command-characteristic write. Cannot fail the
    /// transaction.
    fn on_write(&self, data: &[u8]);

    /// One successful connection.
    fn on_connect(&self, session: SessionHandle);

    /// One connection loss.
    fn on_disconnect(&self);

    /// A valid date/time record was written; hand it to the clock
    /// collaborator.
    fn on_time_set(&self, record: DateTimeRecord) {
        let _ = record;
    }
}

/// GAP-layer events fed in by the transport.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    /// Connection attempt completed; `status` 0 means success (HCI
    /// convention), anything else is a failed attempt.
    Connect { handle: u16, status: u8 },
    /// The client went away, for any reason code.
    Disconnect { reason: u8 },
    /// ATT MTU was renegotiated.
    MtuUpdated { mtu: u16 },
    /// The client flipped a client characteristic configuration bit.
    Subscribe {
        attr_handle: u16,
        notifications: bool,
    },
}

/// Server configuration supplied at init.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig<'a> {
    /// Human-readable device name, broadcast in the scan response.
    pub device_name: &'a str,
    pub adv_params: AdvertisingParams,
}

impl<'a> ServerConfig<'a> {
    pub const fn new(device_name: &'a str) -> Self {
        Self {
            device_name,
            adv_params: AdvertisingParams::fast(),
        }
    }
}

/// The lock peripheral.
pub struct LockServer<T: Transport, H: EventHooks> {
    transport: T,
    hooks: H,
    advertising: AdvertisingController,
    session: SessionRegistry,
    status: AtomicU32,
    emitter: NotificationEmitter,
}

impl<T: Transport, H: EventHooks> LockServer<T, H> {
    /// Register the lock service, compose the advertising payloads, and
    /// start broadcasting.
    ///
    /// Fails with [`Error::InvalidArgument`] when the device name is
    /// missing or does not fit the advertising budget, and with
    /// [`Error::TransportFailure`] when the stack rejects registration or
    /// the advertising configuration. Any failure aborts init entirely;
    /// there is no partial-service state.
    pub fn init(mut transport: T, hooks: H, config: &ServerConfig<'_>) -> Result<Self, Error> {
        if config.device_name.is_empty() {
            error!("init: device name is required");
            return Err(Error::InvalidArgument);
        }

        let advertising = AdvertisingController::new(
            config.device_name,
            &LOCK_SERVICE_UUID,
            config.adv_params,
        )?;

        let handles = transport.register_service(&LOCK_SERVICE).map_err(|e| {
            error!("service registration rejected: {:?}", e);
            Error::TransportFailure
        })?;
        let status_handle = handles.characteristics[STATUS_CHARACTERISTIC_INDEX].value_handle;

        let server = Self {
            transport,
            hooks,
            advertising,
            session: SessionRegistry::new(),
            status: AtomicU32::new(0),
            emitter: NotificationEmitter::new(status_handle),
        };

        server.advertising.start(&server.transport)?;
        info!("lock server initialized");
        Ok(server)
    }

    /// Push a notification on the Status characteristic. See
    /// [`NotificationEmitter::notify`] for the failure contract.
    pub fn notify(&self, data: &[u8]) -> Result<(), Error> {
        self.emitter.notify(&self.transport, &self.session, data)
    }

    /// Atomically replace the stored status value. Never blocks and never
    /// triggers a notification on its own; pushing the new value to the
    /// client is a separate, explicit [`Self::notify`].
    pub fn update_status_value(&self, value: u32) {
        self.status.store(value, Ordering::Release);
        debug!("status value updated: {}", value);
    }

    /// The value a Status read currently returns.
    pub fn status_value(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    /// GAP event entry point, called from the transport worker.
    ///
    /// The only error surfaced is a failed advertising restart after a
    /// disconnect or failed connect; it is logged and returned, never
    /// retried here.
    pub fn handle_gap_event(&self, event: GapEvent) -> Result<(), Error> {
        match event {
            GapEvent::Connect { handle, status } => self.on_connect_event(handle, status),
            GapEvent::Disconnect { reason } => {
                info!("client disconnected: reason={}", reason);
                self.finish_session()
            }
            GapEvent::MtuUpdated { mtu } => {
                info!("MTU updated: {}", mtu);
                Ok(())
            }
            GapEvent::Subscribe {
                attr_handle,
                notifications,
            } => {
                info!(
                    "notifications {} on attr {}",
                    if notifications { "enabled" } else { "disabled" },
                    attr_handle
                );
                Ok(())
            }
        }
    }

    fn on_connect_event(&self, handle: u16, status: u8) -> Result<(), Error> {
        if status != 0 {
            // The broadcast ended with the failed attempt; make sure the
            // device becomes discoverable again.
            warn!("connect failed: status={}", status);
            self.advertising.note_broadcast_ended();
            return self.finish_session();
        }

        let Some(session) = SessionHandle::new(handle) else {
            warn!("connect event with invalid handle {}", handle);
            return Ok(());
        };

        match self.session.connect(session) {
            Ok(()) => {
                info!("client connected: handle={}", handle);
                // The broadcast ended with this connection per transport
                // semantics; do not restart it here.
                self.advertising.note_broadcast_ended();
                self.hooks.on_connect(session);
            }
            Err(_) => {
                // Anomaly: a second connect while one client is live. The
                // existing handle must survive.
                warn!("duplicate connect event ignored: handle={}", handle);
            }
        }
        Ok(())
    }

    /// `Connected -> Idle`: clear the session, tell the application, and
    /// resume advertising unconditionally.
    fn finish_session(&self) -> Result<(), Error> {
        if self.session.disconnect().is_some() {
            self.hooks.on_disconnect();
        }
        self.advertising.start(&self.transport)
    }

    /// GATT access entry point, called from the transport worker.
    pub fn handle_access(
        &self,
        request: &AccessRequest<'_>,
        response: &mut ResponseBuffer,
    ) -> Result<(), AttError> {
        dispatch::dispatch(&self.hooks, &self.status, request, response)
    }

    pub fn session(&self) -> &SessionRegistry {
        &self.session
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.is_active()
    }

    /// Beacon payload, for transports that need the raw bytes.
    pub fn adv_data(&self) -> &[u8] {
        self.advertising.adv_data()
    }

    /// Scan-response payload, for transports that need the raw bytes.
    pub fn scan_response(&self) -> &[u8] {
        self.advertising.scan_response()
    }

    /// Value handle notifications go out on.
    pub fn status_value_handle(&self) -> u16 {
        self.emitter.value_handle()
    }
}
