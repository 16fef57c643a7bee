//! # washhub-domain
//!
//! Pure domain model for the washhub laundry controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (switchable washing machines and dryers)
//! - Define **Programs** (what a user may run on a device, and for how long)
//! - Define **Executions** (one timed, billed use of a device by a user)
//! - Define **Power** vocabulary (controller power states, switch targets, samples)
//! - Define lifecycle **Events** and user **Notifications**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod execution;
pub mod notification;
pub mod power;
pub mod program;
pub mod user;
