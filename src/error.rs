//! Unified error type for the lock peripheral.
//!
//! All variants carry only fixed-size data; no `alloc`. Implements
//! `defmt::Format` on target builds for efficient logging.

use crate::ble::dispatch::AttError;
use crate::ble::transport::TransportError;

/// Top-level error type returned by the public entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bad configuration at init (missing device name, payload that does
    /// not fit the advertising budget).
    InvalidArgument,

    /// Notify attempted with no active session.
    InvalidState,

    /// Payload exceeds a wire bound (512-byte notify limit).
    InvalidSize,

    /// The transport could not allocate an outbound buffer.
    ResourceExhausted,

    /// Unknown characteristic, or an operation the characteristic does not
    /// offer.
    Unsupported,

    /// The underlying stack rejected a registration or advertising call.
    TransportFailure,
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NoBuffers => Error::ResourceExhausted,
            TransportError::NotConnected => Error::InvalidState,
            TransportError::RegisterRejected
            | TransportError::AdvertisingRejected
            | TransportError::StackFailure => Error::TransportFailure,
        }
    }
}

impl From<AttError> for Error {
    fn from(e: AttError) -> Self {
        match e {
            AttError::InvalidAttributeLength => Error::InvalidSize,
            AttError::UnlikelyError => Error::Unsupported,
            AttError::InsufficientResources => Error::ResourceExhausted,
        }
    }
}
