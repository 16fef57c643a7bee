//! # washhub-adapter-fhem
//!
//! FHEM adapter — switches device relays and receives power readings from an
//! FHEM home-automation server over its telnet port.
//!
//! ## How it works
//!
//! Two line-oriented sessions are kept open to the controller:
//!
//! | Session | Purpose |
//! |---------|---------|
//! | commands | `set <switch> on\|off`, `get <switch> param state`, `version` health checks |
//! | events | `inform on`; power readings are forwarded as [`PowerSample`]s |
//!
//! Every switch command is verified by polling the relay state until it
//! reports the requested value.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `washhub-app` and `washhub-domain`.
//!
//! [`PowerSample`]: washhub_domain::power::PowerSample

mod config;
mod error;
mod events;
pub mod line_client;
pub mod parser;
mod session;
mod switch;

#[cfg(test)]
mod fake_controller;

pub use config::FhemConfig;
pub use error::FhemError;
pub use line_client::LineClient;
pub use switch::FhemPowerSwitch;
