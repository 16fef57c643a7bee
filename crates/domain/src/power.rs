//! Power vocabulary shared by the controller adapter and the lifecycle manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical view of a device's relay as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
    /// Switch-on requested, not yet acknowledged by the relay.
    SetOn,
    /// Switch-off requested, not yet acknowledged by the relay.
    SetOff,
    #[default]
    Unknown,
}

impl PowerState {
    /// Parse the controller's `state` reading. Anything unrecognised is
    /// [`Unknown`](Self::Unknown).
    #[must_use]
    pub fn from_controller(raw: &str) -> Self {
        match raw.trim() {
            "on" => Self::On,
            "off" => Self::Off,
            "set_on" => Self::SetOn,
            "set_off" => Self::SetOff,
            _ => Self::Unknown,
        }
    }

    /// `On` or `Off`, as opposed to a transitional or unknown state.
    #[must_use]
    pub fn is_definite(self) -> bool {
        matches!(self, Self::On | Self::Off)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::SetOn => f.write_str("set_on"),
            Self::SetOff => f.write_str("set_off"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A state a relay may be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerTarget {
    On,
    Off,
}

impl PowerTarget {
    /// The argument of the controller's `set` command.
    #[must_use]
    pub fn command_arg(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl From<PowerTarget> for PowerState {
    fn from(target: PowerTarget) -> Self {
        match target {
            PowerTarget::On => Self::On,
            PowerTarget::Off => Self::Off,
        }
    }
}

impl fmt::Display for PowerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_arg())
    }
}

/// A power reading reported by the controller's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    /// The controller name of the power meter.
    pub power_name: String,
    pub watts: f64,
}
