//! Notification — what a user is told when their execution ends.

use serde::{Deserialize, Serialize};

use crate::execution::Execution;
use crate::time::Timestamp;
use crate::user::User;

/// A message for one user, in a short (push) and a long (email) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: User,
    pub title: String,
    pub short_message: String,
    pub long_message: String,
}

impl Notification {
    /// Build the end-of-execution message.
    #[must_use]
    pub fn for_completion(execution: &Execution, aborted: bool, at: Timestamp) -> Self {
        let device = &execution.device.name;
        let user = &execution.user.name;
        let time = at.format("%H:%M");

        let (title, short_message, long_message) = if aborted {
            (
                "Laundry program aborted".to_string(),
                format!("The program on {device} has been aborted."),
                format!(
                    "Hello {user},\n\nyour program on {device} has just been aborted.\nTime: {time}\n\n--\nwashhub"
                ),
            )
        } else {
            (
                format!("{device} is done!"),
                format!("{device} is done. Please remove your laundry."),
                format!(
                    "Hello {user},\n\n{device} has just finished.\nTime: {time}\nPlease remove your laundry.\n\n--\nwashhub"
                ),
            )
        };

        Self {
            recipient: execution.user.clone(),
            title,
            short_message,
            long_message,
        }
    }
}
