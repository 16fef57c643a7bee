//! Notifier port — tells users that their execution ended.

use std::future::Future;

use washhub_domain::error::WashHubError;
use washhub_domain::notification::Notification;

/// Delivers notifications over whatever channels the recipient configured
/// (email, push, …).
///
/// Delivery is best-effort: the execution manager logs failures and never
/// retries them.
pub trait Notifier {
    /// Deliver one notification.
    fn notify(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), WashHubError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn notify(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), WashHubError>> + Send {
        (**self).notify(notification)
    }
}
