use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Hardware hooks and tunables for a [`Sim7kClient`](crate::Sim7kClient).
///
/// The serial link itself is passed to the client separately; this trait
/// only covers the power control lines and the deadline applied to
/// responses that do not declare a longer one.
pub trait ModemConfig {
    type PowerPin: OutputPin;
    type EmergencyPin: OutputPin;

    const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Power key line. `None` if software has no control over it.
    fn power_pin(&mut self) -> Option<&mut Self::PowerPin>;

    /// Reset line pulsed as a last resort when the power key fails to
    /// revive the module.
    fn emergency_pin(&mut self) -> Option<&mut Self::EmergencyPin>;
}

pub struct NoPin;

impl ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
