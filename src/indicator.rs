//! Visual Indicator Interface
//!
//! The indicator hardware (an RGB status LED on the reference board) is an
//! external collaborator: the core only hands it discrete color tokens.
//! Updates are best-effort — callers log a failed update and move on, and
//! indicator errors never reach the session core.

/// Discrete indicator states understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorColor {
    Red,
    Green,
    Blue,
    Purple,
    Off,
}

/// Something that can display an [`IndicatorColor`].
pub trait Indicator {
    type Error;

    fn set_color(&mut self, color: IndicatorColor) -> Result<(), Self::Error>;
}

/// Indicator that drops every update; for boards without an LED and for
/// tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl Indicator for NullIndicator {
    type Error = core::convert::Infallible;

    fn set_color(&mut self, _color: IndicatorColor) -> Result<(), Self::Error> {
        Ok(())
    }
}
