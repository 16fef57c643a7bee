//! Execution lifecycle manager — owns in-flight executions.
//!
//! An execution is `NOT_STARTED → RUNNING → {FINISHED | ABORTED}`. The manager
//! powers the device on, schedules the natural end of the program, ends idle
//! programs early from power samples, and guarantees that every execution is
//! completed (device off, record stopped, user settled) exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use washhub_domain::error::{ExecutionStateError, WashHubError};
use washhub_domain::event::ExecutionEvent;
use washhub_domain::execution::Execution;
use washhub_domain::id::{DeviceId, ExecutionId};
use washhub_domain::notification::Notification;
use washhub_domain::power::{PowerSample, PowerTarget};
use washhub_domain::time::{format_hms, now};

use super::completion::CompletionTask;
use super::device_lock::DeviceLocks;
use super::timer::Timer;
use crate::event_bus::InProcessEventBus;
use crate::ports::{DeviceRepository, ExecutionRepository, Notifier, PowerSwitch, UserLedger};

const EVENT_CAPACITY: usize = 256;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(super) struct Inner<P, S, N> {
    pub(super) power: P,
    pub(super) store: S,
    notifier: N,
    events: InProcessEventBus,
    pub(super) device_locks: DeviceLocks,
    active: Mutex<HashMap<ExecutionId, Arc<CompletionTask>>>,
    pending_stops: Mutex<HashMap<ExecutionId, Timer>>,
    pub(super) sweep: Mutex<Option<JoinHandle<()>>>,
}

impl<P, S, N> Inner<P, S, N> {
    fn task(&self, execution_id: ExecutionId) -> Option<Arc<CompletionTask>> {
        locked(&self.active).get(&execution_id).cloned()
    }

    pub(super) fn has_active_execution(&self, device_id: DeviceId) -> bool {
        locked(&self.active)
            .values()
            .any(|task| task.device_id() == device_id)
    }

    fn register(&self, execution: &Execution) -> Result<Arc<CompletionTask>, WashHubError> {
        let mut active = locked(&self.active);
        if active
            .values()
            .any(|task| task.device_id() == execution.device.id)
        {
            return Err(ExecutionStateError::AlreadyRunning {
                device: execution.device.name.clone(),
            }
            .into());
        }
        let task = Arc::new(CompletionTask::new(execution.clone()));
        active.insert(execution.id, Arc::clone(&task));
        Ok(task)
    }

    fn unregister(&self, execution_id: ExecutionId) {
        if let Some(task) = locked(&self.active).remove(&execution_id) {
            task.disarm();
        }
        self.cancel_pending_stop(execution_id);
    }

    fn cancel_pending_stop(&self, execution_id: ExecutionId) {
        if let Some(timer) = locked(&self.pending_stops).remove(&execution_id) {
            timer.cancel();
        }
    }

    /// Log the failure, publish it, and hand the error back to the caller.
    fn fail(&self, execution: Execution, error: WashHubError) -> WashHubError {
        tracing::error!(
            execution_id = %execution.id,
            device = %execution.device.name,
            error = %error,
            "execution lifecycle step failed"
        );
        self.events.emit(ExecutionEvent::failed(execution, &error));
        error
    }
}

/// Owns every running execution and drives it to completion.
///
/// Cheap to clone; all clones share the same state.
pub struct ExecutionManager<P, S, N> {
    pub(super) inner: Arc<Inner<P, S, N>>,
}

impl<P, S, N> Clone for ExecutionManager<P, S, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S, N> ExecutionManager<P, S, N> {
    /// Create a manager with no tracked executions.
    pub fn new(power: P, store: S, notifier: N) -> Self {
        Self {
            inner: Arc::new(Inner {
                power,
                store,
                notifier,
                events: InProcessEventBus::new(EVENT_CAPACITY),
                device_locks: DeviceLocks::default(),
                active: Mutex::new(HashMap::new()),
                pending_stops: Mutex::new(HashMap::new()),
                sweep: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to lifecycle events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of every tracked execution that is running.
    ///
    /// Executions whose start is not persisted yet, or whose completion
    /// stopped them but failed later, are left out.
    #[must_use]
    pub fn running_executions(&self) -> Vec<Execution> {
        locked(&self.inner.active)
            .values()
            .map(|task| task.execution())
            .filter(Execution::is_running)
            .collect()
    }

    /// The execution tracked on a device, if any, including one whose
    /// completion failed and awaits a retry.
    #[must_use]
    pub fn tracked_execution(&self, device_id: DeviceId) -> Option<Execution> {
        locked(&self.inner.active)
            .values()
            .find(|task| task.device_id() == device_id)
            .map(|task| task.execution())
    }

    /// Cancel every timer and the safety sweep.
    ///
    /// Tracked executions stay running in storage and are picked up again by
    /// [`ExecutionManager::resume_interrupted`] on the next start.
    pub fn shutdown(&self) {
        if let Some(sweep) = locked(&self.inner.sweep).take() {
            sweep.abort();
        }
        for task in locked(&self.inner.active).values() {
            task.disarm();
        }
        for (_, timer) in locked(&self.inner.pending_stops).drain() {
            timer.cancel();
        }
        tracing::info!("execution manager stopped");
    }
}

impl<P, S, N> ExecutionManager<P, S, N>
where
    P: PowerSwitch + Send + Sync + 'static,
    S: ExecutionRepository + DeviceRepository + UserLedger + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Start an execution: persist it, power the device on and schedule its end.
    ///
    /// Any failure leaves nothing tracked; a failure after the record was
    /// started resets the record.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionStateError::DeviceDisabled`] for a new execution on
    /// a disabled device, [`ExecutionStateError::AlreadyRunning`] when the
    /// device already has a tracked execution, or the storage/power error
    /// that aborted the start.
    #[tracing::instrument(
        skip(self, execution),
        fields(execution_id = %execution.id, device = %execution.device.name)
    )]
    pub async fn start_execution(&self, execution: Execution) -> Result<Execution, WashHubError> {
        let inner = &self.inner;
        let device = execution.device.clone();
        let execution_id = execution.id;
        let _device_guard = inner.device_locks.lock(device.id).await;

        if !device.enabled && execution.started_at.is_none() {
            tracing::warn!("device disabled, execution refused");
            return Err(ExecutionStateError::DeviceDisabled {
                device: device.name.clone(),
            }
            .into());
        }
        let task = inner.register(&execution)?;

        let execution = match inner.store.start(execution.clone()).await {
            Ok(started) => started,
            Err(err) => {
                inner.unregister(execution_id);
                return Err(inner.fail(execution, err));
            }
        };
        task.update_execution(execution.clone());

        if let Err(err) = inner.power.set_power(&device, PowerTarget::On).await {
            inner.unregister(execution_id);
            let execution = match inner.store.reset(execution.clone()).await {
                Ok(reset) => reset,
                Err(reset_err) => {
                    tracing::error!(error = %reset_err, "failed to reset execution record");
                    execution
                }
            };
            return Err(inner.fail(execution, err));
        }

        inner.store.execution_started(&device, &execution).await;

        let remaining = execution.remaining_time(now());
        task.arm(self.schedule_completion(execution_id, remaining));
        self.evaluate_power_locked(execution_id, 0.0);

        tracing::info!(remaining = %format_hms(remaining), "execution started");
        inner.events.emit(ExecutionEvent::started(execution.clone()));
        Ok(execution)
    }

    /// Feed a power reading for a running execution.
    ///
    /// Only programs with auto-end react. A reading below the device's
    /// threshold schedules a delayed stop (unless one is already waiting);
    /// any other reading cancels the waiting stop. Untracked executions are
    /// ignored.
    pub async fn on_power_measurement_available(&self, execution_id: ExecutionId, watts: f64) {
        let Some(task) = self.inner.task(execution_id) else {
            return;
        };
        let _device_guard = self.inner.device_locks.lock(task.device_id()).await;
        self.evaluate_power_locked(execution_id, watts);
    }

    /// Apply a sample to every running execution whose device reports under
    /// the sample's power name.
    pub async fn dispatch_power_sample(&self, sample: &PowerSample) {
        let targets: Vec<ExecutionId> = locked(&self.inner.active)
            .values()
            .map(|task| task.execution())
            .filter(|execution| {
                execution.is_running() && execution.device.power_name == sample.power_name
            })
            .map(|execution| execution.id)
            .collect();
        for execution_id in targets {
            self.on_power_measurement_available(execution_id, sample.watts)
                .await;
        }
    }

    /// Forward every sample received on `samples` to
    /// [`ExecutionManager::dispatch_power_sample`] until the sender is dropped.
    pub fn spawn_power_listener(
        &self,
        mut samples: mpsc::UnboundedReceiver<PowerSample>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(sample) = samples.recv().await {
                manager.dispatch_power_sample(&sample).await;
            }
            tracing::debug!("power sample channel closed");
        })
    }

    /// End a running execution now, on the user's request.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionStateError::NotRunning`] for an untracked execution,
    /// or the error of the completion step that failed. A failed completion
    /// stays tracked and can be retried.
    #[tracing::instrument(skip(self))]
    pub async fn abort_execution(&self, execution_id: ExecutionId) -> Result<(), WashHubError> {
        let task = self.tracked(execution_id)?;
        task.mark_aborted();
        self.complete(task).await
    }

    /// Run the completion again after an earlier attempt failed.
    ///
    /// Steps that already succeeded are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionStateError::NotRunning`] for an untracked execution,
    /// or the error of the completion step that failed again.
    #[tracing::instrument(skip(self))]
    pub async fn retry_finish_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<(), WashHubError> {
        let task = self.tracked(execution_id)?;
        self.complete(task).await
    }

    /// Pick up executions that were running when the process last stopped.
    ///
    /// Each one keeps its original start time, so its remaining time continues
    /// where it left off. Devices whose execution cannot be resumed are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the managed devices cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn resume_interrupted(&self) -> Result<Vec<Execution>, WashHubError> {
        let devices = self.inner.store.managed_devices().await?;
        let mut resumed = Vec::new();
        for device in devices {
            match self.inner.store.find_running(device.id).await {
                Ok(Some(execution)) => match self.start_execution(execution).await {
                    Ok(execution) => resumed.push(execution),
                    Err(err) => {
                        tracing::error!(device = %device.name, error = %err, "failed to resume execution");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(device = %device.name, error = %err, "failed to look up running execution");
                }
            }
        }
        tracing::info!(count = resumed.len(), "resumed interrupted executions");
        Ok(resumed)
    }

    fn tracked(&self, execution_id: ExecutionId) -> Result<Arc<CompletionTask>, WashHubError> {
        self.inner.task(execution_id).ok_or_else(|| {
            ExecutionStateError::NotRunning {
                execution: execution_id.to_string(),
            }
            .into()
        })
    }

    /// Auto-end evaluation. The caller holds the device lock.
    fn evaluate_power_locked(&self, execution_id: ExecutionId, watts: f64) {
        let Some(task) = self.inner.task(execution_id) else {
            return;
        };
        let execution = task.execution();
        if !execution.program.auto_end || !execution.is_running() {
            return;
        }

        let mut pending = locked(&self.inner.pending_stops);
        if execution.device.is_idle_draw(watts) {
            if pending.get(&execution_id).is_some_and(|timer| !timer.has_fired()) {
                return;
            }
            let delay = execution.earliest_auto_end(now());
            tracing::debug!(
                execution_id = %execution_id,
                device = %execution.device.name,
                watts,
                delay = %format_hms(delay),
                "device idle, scheduling auto-stop"
            );
            pending.insert(execution_id, self.schedule_completion(execution_id, delay));
        } else if let Some(timer) = pending.remove(&execution_id) {
            tracing::debug!(
                execution_id = %execution_id,
                device = %execution.device.name,
                watts,
                "device active again, auto-stop cancelled"
            );
            timer.cancel();
        }
    }

    fn schedule_completion(&self, execution_id: ExecutionId, delay: Duration) -> Timer {
        let manager: Weak<Inner<P, S, N>> = Arc::downgrade(&self.inner);
        Timer::schedule(delay, async move {
            let Some(inner) = manager.upgrade() else {
                return;
            };
            let manager = ExecutionManager { inner };
            let Some(task) = manager.inner.task(execution_id) else {
                return;
            };
            if let Err(err) = manager.complete(task).await {
                tracing::warn!(execution_id = %execution_id, error = %err, "scheduled completion failed");
            }
        })
    }

    /// Run the completion steps of a task, under the device lock then the
    /// task lock.
    async fn complete(&self, task: Arc<CompletionTask>) -> Result<(), WashHubError> {
        let inner = &self.inner;
        let device_guard = inner.device_locks.lock(task.device_id()).await;
        let mut progress = task.lock_progress().await;
        if progress.executed {
            return Ok(());
        }

        task.disarm();
        inner.cancel_pending_stop(task.execution_id());
        let mut execution = task.execution();

        if !progress.powered_off {
            if let Err(err) = inner
                .power
                .set_power(&execution.device, PowerTarget::Off)
                .await
            {
                return Err(inner.fail(execution, err));
            }
            progress.powered_off = true;
        }

        if !progress.stopped {
            match inner.store.stop(execution.clone()).await {
                Ok(stopped) => {
                    task.update_execution(stopped.clone());
                    execution = stopped;
                    progress.stopped = true;
                }
                Err(err) => return Err(inner.fail(execution, err)),
            }
        }

        if !progress.released {
            inner.store.execution_ended(&execution.device).await;
            progress.released = true;
        }

        if !progress.settled {
            if let Err(err) = inner.store.settle(&execution).await {
                return Err(inner.fail(execution, err));
            }
            progress.settled = true;
        }

        inner.unregister(execution.id);
        progress.executed = true;

        let aborted = task.is_aborted();
        tracing::info!(
            execution_id = %execution.id,
            device = %execution.device.name,
            aborted,
            elapsed = %format_hms(execution.elapsed(now())),
            "execution finished"
        );
        inner.events.emit(ExecutionEvent::finished(execution.clone(), aborted));
        drop(progress);
        drop(device_guard);

        self.notify_user(&execution, aborted).await;
        Ok(())
    }

    async fn notify_user(&self, execution: &Execution, aborted: bool) {
        if !execution.user.has_notification_channel() {
            return;
        }
        let notification = Notification::for_completion(execution, aborted, now());
        if let Err(err) = self.inner.notifier.notify(&notification).await {
            tracing::warn!(
                execution_id = %execution.id,
                user = %execution.user.name,
                error = %err,
                "failed to notify user"
            );
        }
    }
}
