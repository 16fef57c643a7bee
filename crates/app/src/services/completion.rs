//! Completion task — the one-shot finishing action bound to an execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::MutexGuard;

use washhub_domain::execution::Execution;
use washhub_domain::id::{DeviceId, ExecutionId};

use super::timer::Timer;

/// Which completion steps already succeeded.
///
/// A retried completion resumes after the last successful step.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    pub(crate) powered_off: bool,
    pub(crate) stopped: bool,
    pub(crate) released: bool,
    pub(crate) settled: bool,
    /// Set once every step succeeded. A completion that finds it set is a no-op.
    pub(crate) executed: bool,
}

/// Tracks one running execution until it has been completed.
#[derive(Debug)]
pub(crate) struct CompletionTask {
    execution: Mutex<Execution>,
    progress: tokio::sync::Mutex<Progress>,
    aborted: AtomicBool,
    timer: Mutex<Option<Timer>>,
}

impl CompletionTask {
    pub(crate) fn new(execution: Execution) -> Self {
        Self {
            execution: Mutex::new(execution),
            progress: tokio::sync::Mutex::new(Progress::default()),
            aborted: AtomicBool::new(false),
            timer: Mutex::new(None),
        }
    }

    /// Latest known state of the execution record.
    pub(crate) fn execution(&self) -> Execution {
        self.execution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn update_execution(&self, execution: Execution) {
        *self.execution.lock().unwrap_or_else(PoisonError::into_inner) = execution;
    }

    pub(crate) fn execution_id(&self) -> ExecutionId {
        self.execution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .id
    }

    pub(crate) fn device_id(&self) -> DeviceId {
        self.execution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .device
            .id
    }

    /// The user asked to end the execution early. Sticky.
    pub(crate) fn mark_aborted(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Attach the natural-timeout timer, cancelling any previous one.
    pub(crate) fn arm(&self, timer: Timer) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel the natural-timeout timer, if any.
    pub(crate) fn disarm(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }

    /// Exclusive access to the step progress.
    ///
    /// Must be taken after the device lock.
    pub(crate) async fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().await
    }
}
