//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`WashHubError`] at port boundaries.

use std::error::Error as StdError;

/// Boxed source error carried across port boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Top-level error shared by the domain, the application layer and the ports.
#[derive(Debug, thiserror::Error)]
pub enum WashHubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Execution(#[from] ExecutionStateError),

    /// The power controller could not be reached or did not do what it was told.
    #[error("power control failed: {0}")]
    Power(#[source] BoxError),

    /// The data-access collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

/// Domain invariant violations detected by `validate()` and the builders.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("{field} must not be empty")]
    EmptyProtocolName { field: &'static str },

    #[error("auto-end threshold must be a finite, non-negative number of watts")]
    InvalidThreshold,

    #[error("program duration must be greater than zero")]
    ZeroDuration,
}

/// A looked-up record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An execution lifecycle call did not match the tracked state.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionStateError {
    #[error("device {device} already has a running execution")]
    AlreadyRunning { device: String },

    #[error("execution {execution} is not running")]
    NotRunning { execution: String },

    #[error("device {device} is disabled")]
    DeviceDisabled { device: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error() {
        let err: WashHubError = ValidationError::EmptyName.into();
        assert!(matches!(err, WashHubError::Validation(ValidationError::EmptyName)));
    }

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err: WashHubError = NotFoundError {
            entity: "Device",
            id: "WM1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Device WM1 not found");
    }

    #[test]
    fn should_include_source_in_power_error_message() {
        let source: BoxError = "controller said no".into();
        let err = WashHubError::Power(source);
        assert_eq!(err.to_string(), "power control failed: controller said no");
    }

    #[test]
    fn should_display_already_running_with_device() {
        let err = ExecutionStateError::AlreadyRunning {
            device: "WM1".to_string(),
        };
        assert_eq!(err.to_string(), "device WM1 already has a running execution");
    }
}
