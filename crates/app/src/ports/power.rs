//! Power port — switching device relays through the home-automation controller.

use std::future::Future;

use washhub_domain::device::Device;
use washhub_domain::error::WashHubError;
use washhub_domain::power::{PowerState, PowerTarget};

/// Switches device power and reports the relay state.
///
/// The adapter implementing this is the only component allowed to issue
/// switch commands to the controller.
pub trait PowerSwitch {
    /// Switch the device to `target` and wait until the controller reports
    /// that state.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Power`] when the controller is unreachable,
    /// rejects the command, or never reports the requested state.
    fn set_power(
        &self,
        device: &Device,
        target: PowerTarget,
    ) -> impl Future<Output = Result<(), WashHubError>> + Send;

    /// Read the current relay state of the device.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Power`] when the controller is unreachable.
    fn power_state(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<PowerState, WashHubError>> + Send;
}

impl<T: PowerSwitch + Send + Sync> PowerSwitch for std::sync::Arc<T> {
    fn set_power(
        &self,
        device: &Device,
        target: PowerTarget,
    ) -> impl Future<Output = Result<(), WashHubError>> + Send {
        (**self).set_power(device, target)
    }

    fn power_state(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<PowerState, WashHubError>> + Send {
        (**self).power_state(device)
    }
}
