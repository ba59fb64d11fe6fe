//! Advertising Controller
//!
//! Owns the broadcast state and the two advertising payloads. The beacon
//! packet carries only the discovery flags and the 128-bit service UUID so
//! scanners resolve the device quickly; the device name (which may be
//! long) goes in the scan-response packet that centrals request lazily.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec;

use crate::ble::registry::Uuid128;
use crate::ble::transport::Transport;
use crate::error::Error;

/// Legacy advertising data budget, per payload.
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Advertising interval bounds in 0.625 ms units: 20 ms – 30 ms.
///
/// Deliberately fast to minimize discovery latency at the cost of radio
/// power.
pub const ADV_INTERVAL_MIN: u16 = 32;
pub const ADV_INTERVAL_MAX: u16 = 48;

// AD structure types and flag bits used in the payloads.
const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_INCOMPLETE_UUID128_LIST: u8 = 0x06;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_FLAGS_GENERAL_DISC_BREDR_UNSUP: u8 = 0x06;

/// One advertising payload within the link-layer budget.
pub type AdvPayload = Vec<u8, MAX_ADV_DATA_LEN>;

/// Advertising interval configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    pub interval_min: u16,
    pub interval_max: u16,
}

impl AdvertisingParams {
    /// The fast pair used by the lock peripheral.
    pub const fn fast() -> Self {
        Self {
            interval_min: ADV_INTERVAL_MIN,
            interval_max: ADV_INTERVAL_MAX,
        }
    }
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self::fast()
    }
}

/// Build the beacon payload: flags plus the 128-bit service UUID.
pub fn build_adv_payload(service_uuid: &Uuid128) -> Result<AdvPayload, Error> {
    let mut payload = AdvPayload::new();
    payload
        .extend_from_slice(&[2, AD_TYPE_FLAGS, AD_FLAGS_GENERAL_DISC_BREDR_UNSUP])
        .and_then(|_| payload.extend_from_slice(&[17, AD_TYPE_INCOMPLETE_UUID128_LIST]))
        .and_then(|_| payload.extend_from_slice(service_uuid.as_le_bytes()))
        .map_err(|_| Error::InvalidArgument)?;

    Ok(payload)
}

/// Build the scan-response payload: the complete local name.
///
/// Fails when the name does not fit the advertising budget alongside its
/// AD header.
pub fn build_scan_response(device_name: &str) -> Result<AdvPayload, Error> {
    let name = device_name.as_bytes();
    if name.is_empty() || name.len() + 2 > MAX_ADV_DATA_LEN {
        return Err(Error::InvalidArgument);
    }

    let mut payload = AdvPayload::new();
    payload
        .extend_from_slice(&[name.len() as u8 + 1, AD_TYPE_COMPLETE_LOCAL_NAME])
        .and_then(|_| payload.extend_from_slice(name))
        .map_err(|_| Error::InvalidArgument)?;

    Ok(payload)
}

/// Broadcast state plus the composed payloads.
pub struct AdvertisingController {
    adv_data: AdvPayload,
    scan_rsp: AdvPayload,
    params: AdvertisingParams,
    active: AtomicBool,
}

impl AdvertisingController {
    /// Compose both payloads up front; the device name and service UUID do
    /// not change after init.
    pub fn new(
        device_name: &str,
        service_uuid: &Uuid128,
        params: AdvertisingParams,
    ) -> Result<Self, Error> {
        Ok(Self {
            adv_data: build_adv_payload(service_uuid)?,
            scan_rsp: build_scan_response(device_name)?,
            params,
            active: AtomicBool::new(false),
        })
    }

    /// Start broadcasting. Idempotent: a second `start` while already
    /// advertising does not touch the transport.
    pub fn start<T: Transport>(&self, transport: &T) -> Result<(), Error> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("advertising already active");
            return Ok(());
        }

        match transport.start_advertising(&self.adv_data, &self.scan_rsp, &self.params) {
            Ok(()) => {
                info!("advertising started");
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                error!("failed to start advertising: {:?}", e);
                Err(Error::from(e))
            }
        }
    }

    /// Halt the broadcast.
    pub fn stop<T: Transport>(&self, transport: &T) -> Result<(), Error> {
        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        transport.stop_advertising().map_err(|e| {
            error!("failed to stop advertising: {:?}", e);
            Error::from(e)
        })
    }

    /// Record that the broadcast ended on the transport's side — a client
    /// connected, or a connect attempt failed. No transport call is made;
    /// only the bookkeeping changes, so a later `start` goes through.
    pub fn note_broadcast_ended(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn adv_data(&self) -> &[u8] {
        &self.adv_data
    }

    pub fn scan_response(&self) -> &[u8] {
        &self.scan_rsp
    }

    pub fn params(&self) -> &AdvertisingParams {
        &self.params
    }
}
