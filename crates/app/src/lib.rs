//! # washhub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `PowerSwitch` — switch a device's relay and read its power state
//!   - `ExecutionRepository` — start/stop/reset transitions of execution records
//!   - `DeviceRepository` — managed devices and execution start/end hooks
//!   - `UserLedger` — settle an execution with its user
//!   - `Notifier` — best-effort user notifications
//! - Provide the **execution lifecycle manager** (`ExecutionManager`): power on,
//!   natural expiry, auto-end from power samples, abort, retry, and the
//!   periodic safety sweep
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `washhub-domain` only (plus `tokio` for tasks, timers and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
