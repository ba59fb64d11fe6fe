//! Notification Emitter
//!
//! Packages a value and pushes it to the subscribed client as a
//! server-initiated update on the Status characteristic. Each call is a
//! single bounded attempt: the emitter holds no outbound queue and never
//! retries — a failed notify is reported to the caller, who decides
//! whether to resend.

use crate::ble::session::SessionRegistry;
use crate::ble::transport::Transport;
use crate::error::Error;
use crate::protocol::MAX_ATT_PAYLOAD;

/// Emitter bound to the Status characteristic's value handle.
pub struct NotificationEmitter {
    value_handle: u16,
}

impl NotificationEmitter {
    pub const fn new(value_handle: u16) -> Self {
        Self { value_handle }
    }

    pub fn value_handle(&self) -> u16 {
        self.value_handle
    }

    /// Push `data` to the current session.
    ///
    /// Fails fast with [`Error::InvalidState`] when no client is connected
    /// and [`Error::InvalidSize`] above the 512-byte bound; neither case
    /// touches the transport. The session is re-read here rather than
    /// trusted from any earlier snapshot: it may have changed since the
    /// caller last looked, and the transport error maps back to
    /// [`Error::InvalidState`] if it changes again mid-call.
    pub fn notify<T: Transport>(
        &self,
        transport: &T,
        session: &SessionRegistry,
        data: &[u8],
    ) -> Result<(), Error> {
        let Some(handle) = session.current() else {
            warn!("notify with no client connected");
            return Err(Error::InvalidState);
        };

        if data.len() > MAX_ATT_PAYLOAD {
            error!("notify payload too large: {} bytes", data.len());
            return Err(Error::InvalidSize);
        }

        transport
            .notify(handle, self.value_handle, data)
            .map_err(|e| {
                error!("notify failed: {:?}", e);
                Error::from(e)
            })?;

        debug!("notification sent: {} bytes", data.len());
        Ok(())
    }
}
