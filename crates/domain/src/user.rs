//! User — the person an execution is billed to and notified about.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// A kiosk user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub email_notification: bool,
    pub push_key: Option<String>,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl User {
    /// Create a user without any notification channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: None,
            email_notification: false,
            push_key: None,
        }
    }

    /// Whether the user asked to be notified by email and has an address.
    #[must_use]
    pub fn wants_email(&self) -> bool {
        self.email_notification && self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Whether the user registered a push key.
    #[must_use]
    pub fn wants_push(&self) -> bool {
        self.push_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Whether any notification channel is configured for this user.
    #[must_use]
    pub fn has_notification_channel(&self) -> bool {
        self.wants_email() || self.wants_push()
    }
}
