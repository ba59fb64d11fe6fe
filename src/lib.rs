#![cfg_attr(not(test), no_std)]

//! Smart-Lock BLE Peripheral Firmware Library
//!
//! This library provides the core functionality for the smart-lock BLE
//! peripheral, organized into clear architectural layers:
//!
//! - `ble`: BLE peripheral session core (advertising, session, GATT dispatch)
//! - `protocol`: wire formats carried over the lock service characteristics
//! - `app`: lock application logic layered on top of the session core
//! - `indicator`: interface to the external visual indicator
//!
//! The library is hardware-agnostic: everything radio-specific sits behind
//! the [`ble::transport::Transport`] trait. The `embedded` cargo feature
//! enables the nRF52820/S140 firmware binary that provides the real
//! transport.

#[macro_use]
mod fmt;

pub mod app;
pub mod ble;
pub mod error;
pub mod indicator;
pub mod protocol;
