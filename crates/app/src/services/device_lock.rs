//! Per-device async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use washhub_domain::id::DeviceId;

/// One async mutex per device, created on first use.
///
/// Every operation touching a device's power or its execution holds the
/// device's lock for its whole duration.
#[derive(Debug, Default)]
pub(crate) struct DeviceLocks {
    locks: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceLocks {
    /// Wait for exclusive access to the device.
    pub(crate) async fn lock(&self, device: DeviceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(device).or_default())
        };
        lock.lock_owned().await
    }
}
