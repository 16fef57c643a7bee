//! In-memory execution records, managed devices and settlements.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use washhub_app::ports::{DeviceRepository, ExecutionRepository, UserLedger};
use washhub_domain::device::Device;
use washhub_domain::error::{NotFoundError, WashHubError};
use washhub_domain::execution::Execution;
use washhub_domain::id::{DeviceId, ExecutionId};
use washhub_domain::time::{format_hms, now};

#[derive(Debug, Default)]
struct State {
    devices: Vec<Device>,
    executions: HashMap<ExecutionId, Execution>,
    settled: HashSet<ExecutionId>,
}

/// Devices, executions and settlements held in process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// A store managing `devices`.
    #[must_use]
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            state: Mutex::new(State {
                devices,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a managed device by name.
    #[must_use]
    pub fn device(&self, name: &str) -> Option<Device> {
        self.state().devices.iter().find(|d| d.name == name).cloned()
    }

    fn execution(&self, id: ExecutionId) -> Option<Execution> {
        self.state().executions.get(&id).cloned()
    }

    #[cfg(test)]
    fn is_settled(&self, id: ExecutionId) -> bool {
        self.state().settled.contains(&id)
    }

    fn save(&self, execution: &Execution) {
        self.state()
            .executions
            .insert(execution.id, execution.clone());
    }
}

impl ExecutionRepository for MemoryStore {
    async fn start(&self, mut execution: Execution) -> Result<Execution, WashHubError> {
        if let Some(stored) = self.execution(execution.id) {
            execution.started_at = stored.started_at.or(execution.started_at);
        }
        execution.mark_started(now());
        self.save(&execution);
        tracing::debug!(execution_id = %execution.id, device = %execution.device.name, "execution record started");
        Ok(execution)
    }

    async fn stop(&self, mut execution: Execution) -> Result<Execution, WashHubError> {
        if self.execution(execution.id).is_none() {
            return Err(NotFoundError {
                entity: "Execution",
                id: execution.id.to_string(),
            }
            .into());
        }
        execution.mark_stopped(now());
        self.save(&execution);
        tracing::debug!(execution_id = %execution.id, device = %execution.device.name, "execution record stopped");
        Ok(execution)
    }

    async fn reset(&self, mut execution: Execution) -> Result<Execution, WashHubError> {
        execution.reset();
        self.save(&execution);
        tracing::debug!(execution_id = %execution.id, "execution record reset");
        Ok(execution)
    }

    async fn find_running(&self, device_id: DeviceId) -> Result<Option<Execution>, WashHubError> {
        Ok(self
            .state()
            .executions
            .values()
            .find(|e| e.device.id == device_id && e.is_running())
            .cloned())
    }
}

impl DeviceRepository for MemoryStore {
    async fn managed_devices(&self) -> Result<Vec<Device>, WashHubError> {
        Ok(self.state().devices.clone())
    }

    async fn execution_started(&self, device: &Device, execution: &Execution) {
        tracing::debug!(device = %device.name, user = %execution.user.name, "device in use");
    }

    async fn execution_ended(&self, device: &Device) {
        tracing::debug!(device = %device.name, "device released");
    }
}

impl UserLedger for MemoryStore {
    async fn settle(&self, execution: &Execution) -> Result<(), WashHubError> {
        if !self.state().settled.insert(execution.id) {
            tracing::debug!(execution_id = %execution.id, "already settled");
            return Ok(());
        }
        let used = format_hms(execution.elapsed(now()));
        tracing::info!(
            execution_id = %execution.id,
            user = %execution.user.name,
            program = %execution.program.name,
            %used,
            "execution settled"
        );
        Ok(())
    }
}
