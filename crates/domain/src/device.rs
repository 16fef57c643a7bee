//! Device — a washing machine or dryer whose mains power is switched by the
//! home-automation controller.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WashHubError};
use crate::id::DeviceId;

/// A switchable laundry machine.
///
/// `switch_name` and `power_name` are the identifiers the controller uses
/// for the relay and for the power meter of this machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub switch_name: String,
    pub power_name: String,
    /// Disabled devices accept no new executions. One already in flight
    /// still runs to its end, and the safety sweep still switches the
    /// device off when it is idle.
    pub enabled: bool,
    /// Power draw (watts) below which a running program counts as idle.
    pub auto_end_threshold: f64,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `switch_name` or `power_name` is empty
    ///   ([`ValidationError::EmptyProtocolName`])
    /// - `auto_end_threshold` is negative or not finite
    ///   ([`ValidationError::InvalidThreshold`])
    pub fn validate(&self) -> Result<(), WashHubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.switch_name.is_empty() {
            return Err(ValidationError::EmptyProtocolName {
                field: "switch_name",
            }
            .into());
        }
        if self.power_name.is_empty() {
            return Err(ValidationError::EmptyProtocolName {
                field: "power_name",
            }
            .into());
        }
        if !self.auto_end_threshold.is_finite() || self.auto_end_threshold < 0.0 {
            return Err(ValidationError::InvalidThreshold.into());
        }
        Ok(())
    }

    /// Whether a power sample in watts is low enough to count as idle.
    #[must_use]
    pub fn is_idle_draw(&self, watts: f64) -> bool {
        watts < self.auto_end_threshold
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    switch_name: Option<String>,
    power_name: Option<String>,
    enabled: Option<bool>,
    auto_end_threshold: Option<f64>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn switch_name(mut self, switch_name: impl Into<String>) -> Self {
        self.switch_name = Some(switch_name.into());
        self
    }

    #[must_use]
    pub fn power_name(mut self, power_name: impl Into<String>) -> Self {
        self.power_name = Some(power_name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn auto_end_threshold(mut self, watts: f64) -> Self {
        self.auto_end_threshold = Some(watts);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// Devices are enabled by default and have a zero threshold (auto-end
    /// never triggers) unless configured otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Validation`] if any invariant fails.
    pub fn build(self) -> Result<Device, WashHubError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            switch_name: self.switch_name.unwrap_or_default(),
            power_name: self.power_name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            auto_end_threshold: self.auto_end_threshold.unwrap_or(0.0),
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wm1() -> DeviceBuilder {
        Device::builder()
            .name("WM1")
            .switch_name("wm1sw")
            .power_name("wm1pm")
    }

    #[test]
    fn should_build_valid_device_with_defaults() {
        let device = wm1().build().unwrap();
        assert_eq!(device.name, "WM1");
        assert_eq!(device.switch_name, "wm1sw");
        assert_eq!(device.power_name, "wm1pm");
        assert!(device.enabled);
        assert!((device.auto_end_threshold - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder()
            .switch_name("wm1sw")
            .power_name("wm1pm")
            .build();
        assert!(matches!(
            result,
            Err(WashHubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_switch_name_is_empty() {
        let result = Device::builder().name("WM1").power_name("wm1pm").build();
        assert!(matches!(
            result,
            Err(WashHubError::Validation(ValidationError::EmptyProtocolName {
                field: "switch_name"
            }))
        ));
    }

    #[test]
    fn should_reject_negative_threshold() {
        let result = wm1().auto_end_threshold(-1.0).build();
        assert!(matches!(
            result,
            Err(WashHubError::Validation(ValidationError::InvalidThreshold))
        ));
    }

    #[test]
    fn should_treat_draw_below_threshold_as_idle() {
        let device = wm1().auto_end_threshold(5.0).build().unwrap();
        assert!(device.is_idle_draw(0.0));
        assert!(device.is_idle_draw(4.9));
        assert!(!device.is_idle_draw(5.0));
        assert!(!device.is_idle_draw(6.0));
    }

    #[test]
    fn should_compare_devices_by_identity() {
        let a = wm1().build().unwrap();
        let mut b = a.clone();
        b.name = "renamed".to_string();
        assert_eq!(a, b);
        assert_ne!(a, wm1().build().unwrap());
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let device = wm1().auto_end_threshold(5.0).build().unwrap();
        let json = serde_json::to_string(&device).unwrap();
        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, device.id);
        assert_eq!(parsed.power_name, "wm1pm");
    }
}
