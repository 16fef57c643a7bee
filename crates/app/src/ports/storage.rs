//! Storage ports — the data-access collaborator.
//!
//! Persistence of devices, users, programs and executions is owned by the
//! outside world. The lifecycle manager only drives the transition points of
//! an execution record, reads the managed devices and settles payments.

use std::future::Future;

use washhub_domain::device::Device;
use washhub_domain::error::WashHubError;
use washhub_domain::execution::Execution;
use washhub_domain::id::DeviceId;

/// Transition points of [`Execution`] records.
pub trait ExecutionRepository {
    /// Persist the start transition and return the updated record.
    ///
    /// A record that already carries a start time keeps it.
    fn start(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send;

    /// Persist the stop transition and return the updated record.
    fn stop(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send;

    /// Undo a start transition that could not be completed.
    fn reset(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send;

    /// The execution recorded as running on a device, if any.
    ///
    /// Used to resume executions that were in flight when the process stopped.
    fn find_running(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<Execution>, WashHubError>> + Send;
}

/// Devices managed by this kiosk.
pub trait DeviceRepository {
    /// All devices this kiosk is responsible for.
    fn managed_devices(&self) -> impl Future<Output = Result<Vec<Device>, WashHubError>> + Send;

    /// Hook: an execution has begun on the device.
    fn execution_started(
        &self,
        device: &Device,
        execution: &Execution,
    ) -> impl Future<Output = ()> + Send;

    /// Hook: the device's execution has ended.
    fn execution_ended(&self, device: &Device) -> impl Future<Output = ()> + Send;
}

/// Payment settlement.
pub trait UserLedger {
    /// Charge the execution's user.
    ///
    /// Implementations must make this idempotent per execution; a retried
    /// completion may call it again after an earlier failure.
    fn settle(&self, execution: &Execution) -> impl Future<Output = Result<(), WashHubError>> + Send;
}

impl<T: ExecutionRepository + Send + Sync> ExecutionRepository for std::sync::Arc<T> {
    fn start(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send {
        (**self).start(execution)
    }

    fn stop(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send {
        (**self).stop(execution)
    }

    fn reset(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, WashHubError>> + Send {
        (**self).reset(execution)
    }

    fn find_running(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<Execution>, WashHubError>> + Send {
        (**self).find_running(device_id)
    }
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for std::sync::Arc<T> {
    fn managed_devices(&self) -> impl Future<Output = Result<Vec<Device>, WashHubError>> + Send {
        (**self).managed_devices()
    }

    fn execution_started(
        &self,
        device: &Device,
        execution: &Execution,
    ) -> impl Future<Output = ()> + Send {
        (**self).execution_started(device, execution)
    }

    fn execution_ended(&self, device: &Device) -> impl Future<Output = ()> + Send {
        (**self).execution_ended(device)
    }
}

impl<T: UserLedger + Send + Sync> UserLedger for std::sync::Arc<T> {
    fn settle(&self, execution: &Execution) -> impl Future<Output = Result<(), WashHubError>> + Send {
        (**self).settle(execution)
    }
}
