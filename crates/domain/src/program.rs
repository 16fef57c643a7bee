//! Program — what a user can run on a device, and for how long.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WashHubError};
use crate::id::ProgramId;

/// How a program is metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramKind {
    /// Flat price, runs up to `max_duration`.
    Fixed,
    /// Billed by elapsed time, runs up to `max_duration`.
    Dynamic,
    /// Short power-on window that only unlocks the door.
    OpenDoor,
}

/// A program definition. Immutable for the lifetime of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub kind: ProgramKind,
    /// Whether low power draw may end the program before `max_duration`.
    pub auto_end: bool,
    pub max_duration: Duration,
    /// Offset from the start before which auto-end never fires.
    pub earliest_auto_end: Duration,
    /// How long the draw must stay below the device threshold before the
    /// program is ended.
    pub auto_end_grace: Duration,
}

impl Program {
    /// Create a builder for constructing a [`Program`].
    #[must_use]
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Validation`] when the name is empty or the
    /// maximum duration is zero.
    pub fn validate(&self) -> Result<(), WashHubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.max_duration.is_zero() {
            return Err(ValidationError::ZeroDuration.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Program`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    id: Option<ProgramId>,
    name: Option<String>,
    kind: Option<ProgramKind>,
    auto_end: bool,
    max_duration: Option<Duration>,
    earliest_auto_end: Option<Duration>,
    auto_end_grace: Option<Duration>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn id(mut self, id: ProgramId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ProgramKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn auto_end(mut self, auto_end: bool) -> Self {
        self.auto_end = auto_end;
        self
    }

    #[must_use]
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    #[must_use]
    pub fn earliest_auto_end(mut self, offset: Duration) -> Self {
        self.earliest_auto_end = Some(offset);
        self
    }

    #[must_use]
    pub fn auto_end_grace(mut self, grace: Duration) -> Self {
        self.auto_end_grace = Some(grace);
        self
    }

    /// Consume the builder, validate, and return a [`Program`].
    ///
    /// Defaults: `FIXED`, no auto-end, zero earliest auto-end offset and a
    /// two minute grace period.
    ///
    /// # Errors
    ///
    /// Returns [`WashHubError::Validation`] if the name is missing or the
    /// maximum duration is missing or zero.
    pub fn build(self) -> Result<Program, WashHubError> {
        let program = Program {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            kind: self.kind.unwrap_or(ProgramKind::Fixed),
            auto_end: self.auto_end,
            max_duration: self.max_duration.unwrap_or_default(),
            earliest_auto_end: self.earliest_auto_end.unwrap_or_default(),
            auto_end_grace: self
                .auto_end_grace
                .unwrap_or(Duration::from_secs(120)),
        };
        program.validate()?;
        Ok(program)
    }
}
