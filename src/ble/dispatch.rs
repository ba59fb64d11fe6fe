//! Characteristic Dispatcher
//!
//! Routes incoming attribute access operations to the per-characteristic
//! handlers and converts handler results into ATT-level error codes for
//! the remote peer. Handler bodies are bounded, synchronous, and
//! allocation-free: they run on the latency-sensitive transport worker
//! context and must never block it.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::Vec;

use crate::ble::registry::{self, CharacteristicId, Uuid128};
use crate::ble::server::EventHooks;
use crate::protocol::{encode_status, DateTimeRecord, DATETIME_RECORD_LEN, MAX_ATT_PAYLOAD};

/// Attribute access operation carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessOp {
    Read,
    Write,
}

/// One attribute access request, as handed over by the transport.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub uuid: Uuid128,
    pub op: AccessOp,
    /// Write payload; empty for reads.
    pub payload: &'a [u8],
}

/// Response buffer a read handler appends into.
pub type ResponseBuffer = Vec<u8, MAX_ATT_PAYLOAD>;

/// ATT error codes returned to the peer on a failed transaction.
///
/// A failed access only fails that transaction; it never disturbs the
/// session or advertising state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AttError {
    /// The write payload has the wrong length for the attribute.
    InvalidAttributeLength = 0x0D,
    /// Unmatched characteristic, or an operation it does not offer.
    UnlikelyError = 0x0E,
    /// The response buffer cannot hold the value.
    InsufficientResources = 0x11,
}

impl AttError {
    /// Raw code for the wire.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Route one access request to its characteristic handler.
///
/// The routing key is the request's 128-bit identifier, compared by exact
/// byte equality against the registered table, independent of declaration
/// order. Unmatched identifiers and unsupported operations on a matched
/// characteristic both yield [`AttError::UnlikelyError`].
pub fn dispatch<H: EventHooks>(
    hooks: &H,
    status: &AtomicU32,
    request: &AccessRequest<'_>,
    response: &mut ResponseBuffer,
) -> Result<(), AttError> {
    let Some(def) = registry::find_characteristic(&request.uuid) else {
        warn!("access to unknown characteristic");
        return Err(AttError::UnlikelyError);
    };

    match (def.id, request.op) {
        (CharacteristicId::Command, AccessOp::Write) => {
            command_write(hooks, request.payload)
        }
        (CharacteristicId::Status, AccessOp::Read) => status_read(status, response),
        (CharacteristicId::DateTime, AccessOp::Write) => {
            datetime_write(hooks, request.payload)
        }
        (id, op) => {
            warn!("unsupported operation {:?} on {:?}", op, id);
            Err(AttError::UnlikelyError)
        }
    }
}

/// Command write: bounded copy, then hand the bytes to the application.
///
/// The copy truncates at [`MAX_ATT_PAYLOAD`] rather than overflow; the
/// callback sees exactly the copied bytes and cannot fail the transaction.
fn command_write<H: EventHooks>(hooks: &H, payload: &[u8]) -> Result<(), AttError> {
    let mut data = [0u8; MAX_ATT_PAYLOAD];
    let len = payload.len().min(MAX_ATT_PAYLOAD);
    data[..len].copy_from_slice(&payload[..len]);

    debug!("command write: {} bytes", len);
    hooks.on_write(&data[..len]);
    Ok(())
}

/// Status read: append the current 4-byte value to the response.
fn status_read(status: &AtomicU32, response: &mut ResponseBuffer) -> Result<(), AttError> {
    let value = status.load(Ordering::Acquire);
    debug!("status read: {}", value);

    response
        .extend_from_slice(&encode_status(value))
        .map_err(|_| AttError::InsufficientResources)
}

/// Date/time write: exactly 7 bytes, decoded and forwarded to the clock
/// collaborator; any other length is rejected with no side effect.
fn datetime_write<H: EventHooks>(hooks: &H, payload: &[u8]) -> Result<(), AttError> {
    if payload.len() != DATETIME_RECORD_LEN {
        warn!("date/time write with invalid length {}", payload.len());
        return Err(AttError::InvalidAttributeLength);
    }

    // Length was checked; decode cannot fail.
    let record = DateTimeRecord::decode(payload).map_err(|_| AttError::InvalidAttributeLength)?;
    info!(
        "date/time set: {}-{}-{} {}:{}:{}",
        record.year(),
        record.month,
        record.day,
        record.hour,
        record.minute,
        record.second
    );

    hooks.on_time_set(record);
    Ok(())
}
