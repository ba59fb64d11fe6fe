//! Transport Seam
//!
//! Everything the session core needs from the underlying BLE host stack,
//! expressed as one trait. The firmware binary implements it on top of the
//! SoftDevice; the test suite implements it with a recording mock.
//!
//! Implementations must be callable from both the transport worker context
//! and application contexts: every method except registration takes
//! `&self` and synchronizes internally.

use crate::ble::advertising::AdvertisingParams;
use crate::ble::registry::{ServiceDef, CHARACTERISTIC_COUNT};
use crate::ble::session::SessionHandle;

/// Errors reported by a transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The stack rejected the service/characteristic table.
    RegisterRejected,
    /// The radio rejected the advertising data or interval.
    AdvertisingRejected,
    /// No outbound buffer could be allocated for a notification.
    NoBuffers,
    /// The addressed connection is gone.
    NotConnected,
    /// Any other stack-level failure.
    StackFailure,
}

/// Attribute handles assigned to one characteristic at registration.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandles {
    pub value_handle: u16,
    /// 0 when the characteristic has no client configuration descriptor.
    pub cccd_handle: u16,
}

/// Handles assigned to the registered service, characteristic entries in
/// table order.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandles {
    pub service_handle: u16,
    pub characteristics: [CharacteristicHandles; CHARACTERISTIC_COUNT],
}

/// The BLE host stack as seen by the session core.
pub trait Transport {
    /// Register the primary service and its characteristics. Called once,
    /// during init, before any other method.
    fn register_service(&mut self, service: &ServiceDef) -> Result<ServiceHandles, TransportError>;

    /// Begin broadcasting the given advertising and scan-response payloads.
    fn start_advertising(
        &self,
        adv_data: &[u8],
        scan_rsp: &[u8],
        params: &AdvertisingParams,
    ) -> Result<(), TransportError>;

    /// Halt the broadcast.
    fn stop_advertising(&self) -> Result<(), TransportError>;

    /// Push a notification to `session` on `value_handle`.
    ///
    /// A single bounded attempt; implementations must not queue or retry.
    fn notify(
        &self,
        session: SessionHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError>;
}
