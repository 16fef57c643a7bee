//! Application services — use-case implementations.
//!
//! Services accept port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod execution_manager;
pub mod safety_sweep;

mod completion;
mod device_lock;
mod timer;

pub use execution_manager::ExecutionManager;
pub use safety_sweep::DEFAULT_SWEEP_INTERVAL;
