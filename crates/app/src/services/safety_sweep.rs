//! Safety sweep — forces idle devices off.
//!
//! A device without a tracked execution must not stay powered.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use washhub_domain::error::WashHubError;
use washhub_domain::power::{PowerState, PowerTarget};

use super::execution_manager::ExecutionManager;
use crate::ports::{DeviceRepository, ExecutionRepository, Notifier, PowerSwitch, UserLedger};

/// Default time between two sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(20);

impl<P, S, N> ExecutionManager<P, S, N>
where
    P: PowerSwitch + Send + Sync + 'static,
    S: ExecutionRepository + DeviceRepository + UserLedger + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Check every managed device once and switch off the ones that are on
    /// without a tracked execution.
    ///
    /// Per-device failures are logged and the sweep moves on to the next
    /// device.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the managed devices cannot be listed.
    pub async fn sweep_once(&self) -> Result<(), WashHubError> {
        let devices = self.inner.store.managed_devices().await?;
        for device in devices {
            let _device_guard = self.inner.device_locks.lock(device.id).await;
            if self.inner.has_active_execution(device.id) {
                continue;
            }
            match self.inner.power.power_state(&device).await {
                Ok(PowerState::On) => {
                    tracing::warn!(device = %device.name, "idle device is powered, switching off");
                    if let Err(err) = self.inner.power.set_power(&device, PowerTarget::Off).await {
                        tracing::error!(device = %device.name, error = %err, "failed to switch off idle device");
                    }
                }
                Ok(state) => {
                    tracing::trace!(device = %device.name, %state, "idle device checked");
                }
                Err(err) => {
                    tracing::warn!(device = %device.name, error = %err, "failed to read power state");
                }
            }
        }
        Ok(())
    }

    /// Run [`ExecutionManager::sweep_once`] every `interval` in the background
    /// until [`ExecutionManager::shutdown`]. Restarting replaces the running
    /// sweep.
    pub fn start_safety_sweep(&self, interval: Duration) {
        let manager = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = manager.upgrade() else {
                    break;
                };
                if let Err(err) = (ExecutionManager { inner }).sweep_once().await {
                    tracing::warn!(error = %err, "safety sweep failed");
                }
            }
        });
        let previous = self
            .inner
            .sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::info!(interval_secs = interval.as_secs(), "safety sweep started");
    }
}

#[cfg(test)]
mod tests {
    use washhub_domain::execution::Execution;
    use washhub_domain::program::Program;
    use washhub_domain::user::User;

    use super::*;
    use crate::services::execution_manager::tests::{device, setup};

    #[tokio::test]
    async fn should_switch_off_idle_device_that_is_on() {
        let (manager, power, _, _) = setup(vec![device("WM1", 5.0), device("WM2", 5.0)]);
        power.set_state("WM1", PowerState::On);
        power.set_state("WM2", PowerState::Off);

        manager.sweep_once().await.unwrap();

        assert_eq!(power.count("WM1", PowerTarget::Off), 1);
        assert_eq!(power.count("WM2", PowerTarget::Off), 0);
    }

    #[tokio::test]
    async fn should_leave_devices_with_running_execution_alone() {
        let wm1 = device("WM1", 5.0);
        let (manager, power, _, _) = setup(vec![wm1.clone()]);
        let program = Program::builder()
            .name("Cotton 60")
            .max_duration(Duration::from_secs(3600))
            .build()
            .unwrap();
        manager
            .start_execution(Execution::new(wm1, program, User::new("bob")))
            .await
            .unwrap();

        manager.sweep_once().await.unwrap();

        assert_eq!(power.count("WM1", PowerTarget::Off), 0);
    }

    #[tokio::test]
    async fn should_switch_off_disabled_device_too() {
        let mut wm1 = device("WM1", 5.0);
        wm1.enabled = false;
        let (manager, power, _, _) = setup(vec![wm1]);
        power.set_state("WM1", PowerState::On);

        manager.sweep_once().await.unwrap();

        assert_eq!(power.count("WM1", PowerTarget::Off), 1);
    }

    #[tokio::test]
    async fn should_continue_sweep_after_device_error() {
        let (manager, power, _, _) = setup(vec![device("WM1", 5.0), device("WM2", 5.0)]);
        power.failing.lock().unwrap().insert("WM1".to_string());
        power.set_state("WM1", PowerState::On);
        power.set_state("WM2", PowerState::On);

        manager.sweep_once().await.unwrap();

        assert_eq!(power.count("WM1", PowerTarget::Off), 0);
        assert_eq!(power.count("WM2", PowerTarget::Off), 1);
    }

    #[tokio::test]
    async fn should_ignore_transitional_and_unknown_states() {
        let (manager, power, _, _) = setup(vec![device("WM1", 5.0), device("WM2", 5.0)]);
        power.set_state("WM1", PowerState::SetOn);

        manager.sweep_once().await.unwrap();

        assert!(power.commands.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_sweep_periodically_until_shutdown() {
        let (manager, power, _, _) = setup(vec![device("WM1", 5.0)]);
        manager.start_safety_sweep(DEFAULT_SWEEP_INTERVAL);

        power.set_state("WM1", PowerState::On);
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(power.count("WM1", PowerTarget::Off), 1);

        power.set_state("WM1", PowerState::On);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(power.count("WM1", PowerTarget::Off), 2);

        manager.shutdown();
        power.set_state("WM1", PowerState::On);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(power.count("WM1", PowerTarget::Off), 2);
    }
}
