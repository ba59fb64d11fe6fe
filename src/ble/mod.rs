//! BLE Peripheral Session Core
//!
//! Contains the GAP/GATT logic of the lock peripheral: advertising
//! payloads and broadcast state, the single-connection session registry,
//! characteristic access dispatch, and server-initiated notifications.
//! Everything radio-specific is reached through [`transport::Transport`].

pub mod advertising;
pub mod dispatch;
pub mod notifications;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;
