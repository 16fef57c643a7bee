//! Lifecycle events published by the execution manager.
//!
//! Listeners subscribe to a stream of these instead of registering
//! callbacks. Events are cloned to every subscriber.

use serde::{Deserialize, Serialize};

use crate::execution::Execution;
use crate::time::{Timestamp, now};

/// What happened to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEventKind {
    /// The device was powered on and the execution is being tracked.
    Started,
    /// The device was powered off and the execution was settled.
    Finished { aborted: bool },
    /// A lifecycle step failed. The execution stays tracked and can be retried.
    Failed { error: String },
}

/// An immutable record of a lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub kind: ExecutionEventKind,
    pub execution: Execution,
    pub timestamp: Timestamp,
}

impl ExecutionEvent {
    #[must_use]
    pub fn started(execution: Execution) -> Self {
        Self::new(ExecutionEventKind::Started, execution)
    }

    #[must_use]
    pub fn finished(execution: Execution, aborted: bool) -> Self {
        Self::new(ExecutionEventKind::Finished { aborted }, execution)
    }

    /// Build a failure event. The error's source chain is flattened into
    /// the message so subscribers see the root cause.
    #[must_use]
    pub fn failed(execution: Execution, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Self::new(ExecutionEventKind::Failed { error: message }, execution)
    }

    fn new(kind: ExecutionEventKind, execution: Execution) -> Self {
        Self {
            kind,
            execution,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.kind, ExecutionEventKind::Finished { .. })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.kind, ExecutionEventKind::Failed { .. })
    }
}
