//! # washhub-adapter-memory
//!
//! In-process data collaborator for demos and tests.
//!
//! ## Provided ports
//!
//! | Type | Ports |
//! |------|-------|
//! | [`MemoryStore`] | `ExecutionRepository`, `DeviceRepository`, `UserLedger` |
//! | [`LogNotifier`] | `Notifier` (writes notifications to the log) |
//!
//! Nothing survives a restart.
//!
//! ## Dependency rule
//!
//! Depends on `washhub-app` (port traits) and `washhub-domain` only.

mod notifier;
mod store;

pub use notifier::LogNotifier;
pub use store::MemoryStore;
