//! Execution — one timed, billed use of a device by a user running a program.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::id::ExecutionId;
use crate::program::Program;
use crate::time::{Timestamp, between};
use crate::user::User;

/// A program run on a device on behalf of a user.
///
/// Created by the data-access collaborator before it is handed to the
/// lifecycle manager. `started_at` and `stopped_at` are set by the
/// repository's `start` and `stop` transitions and cleared by `reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub device: Device,
    pub program: Program,
    pub user: User,
    pub started_at: Option<Timestamp>,
    pub stopped_at: Option<Timestamp>,
}

impl Execution {
    /// A not-yet-started execution.
    #[must_use]
    pub fn new(device: Device, program: Program, user: User) -> Self {
        Self {
            id: ExecutionId::new(),
            device,
            program,
            user,
            started_at: None,
            stopped_at: None,
        }
    }

    /// Started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// Time spent running, up to `now` or up to the stop time.
    #[must_use]
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        match self.started_at {
            Some(start) => between(start, self.stopped_at.unwrap_or(now)),
            None => Duration::ZERO,
        }
    }

    /// Time left until the program's maximum duration is reached.
    ///
    /// An execution that has not started yet has its full duration left.
    #[must_use]
    pub fn remaining_time(&self, now: Timestamp) -> Duration {
        self.program.max_duration.saturating_sub(self.elapsed(now))
    }

    /// Delay after which an idle device may end this execution.
    ///
    /// At least the program's grace period, and never before the program's
    /// earliest auto-end offset has passed.
    #[must_use]
    pub fn earliest_auto_end(&self, now: Timestamp) -> Duration {
        let until_allowed = self
            .program
            .earliest_auto_end
            .saturating_sub(self.elapsed(now));
        self.program.auto_end_grace.max(until_allowed)
    }

    /// Record the start transition. Keeps an existing start time so a
    /// resumed execution continues where it left off.
    pub fn mark_started(&mut self, at: Timestamp) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
        self.stopped_at = None;
    }

    /// Record the stop transition.
    pub fn mark_stopped(&mut self, at: Timestamp) {
        self.stopped_at = Some(at);
    }

    /// Undo a start that could not be completed.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.stopped_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramKind;
    use crate::time::now;

    fn execution(auto_end: bool) -> Execution {
        let device = Device::builder()
            .name("WM1")
            .switch_name("wm1sw")
            .power_name("wm1pm")
            .auto_end_threshold(5.0)
            .build()
            .unwrap();
        let program = Program::builder()
            .name("Cotton 60")
            .kind(ProgramKind::Fixed)
            .auto_end(auto_end)
            .max_duration(Duration::from_secs(3600))
            .earliest_auto_end(Duration::from_secs(600))
            .auto_end_grace(Duration::from_secs(120))
            .build()
            .unwrap();
        Execution::new(device, program, User::new("alice"))
    }

    #[test]
    fn should_not_be_running_before_start() {
        let e = execution(false);
        assert!(!e.is_running());
        assert_eq!(e.remaining_time(now()), Duration::from_secs(3600));
    }

    #[test]
    fn should_be_running_after_start_until_stop() {
        let mut e = execution(false);
        let t0 = now();
        e.mark_started(t0);
        assert!(e.is_running());
        e.mark_stopped(t0 + chrono::Duration::seconds(10));
        assert!(!e.is_running());
        assert_eq!(e.elapsed(t0 + chrono::Duration::seconds(99)), Duration::from_secs(10));
    }

    #[test]
    fn should_count_down_remaining_time() {
        let mut e = execution(false);
        let t0 = now();
        e.mark_started(t0);
        let later = t0 + chrono::Duration::seconds(1000);
        assert_eq!(e.remaining_time(later), Duration::from_secs(2600));
        let way_later = t0 + chrono::Duration::seconds(5000);
        assert_eq!(e.remaining_time(way_later), Duration::ZERO);
    }

    #[test]
    fn should_keep_original_start_when_resumed() {
        let mut e = execution(false);
        let t0 = now();
        e.mark_started(t0);
        e.mark_started(t0 + chrono::Duration::seconds(300));
        assert_eq!(e.started_at, Some(t0));
    }

    #[test]
    fn should_clear_timestamps_on_reset() {
        let mut e = execution(false);
        e.mark_started(now());
        e.reset();
        assert!(e.started_at.is_none());
        assert!(!e.is_running());
    }

    #[test]
    fn should_hold_auto_end_until_earliest_offset() {
        let mut e = execution(true);
        let t0 = now();
        e.mark_started(t0);
        assert_eq!(e.earliest_auto_end(t0), Duration::from_secs(600));
        let later = t0 + chrono::Duration::seconds(550);
        assert_eq!(e.earliest_auto_end(later), Duration::from_secs(120));
    }
}
