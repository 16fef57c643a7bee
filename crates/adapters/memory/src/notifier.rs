use washhub_app::ports::Notifier;
use washhub_domain::error::WashHubError;
use washhub_domain::notification::Notification;

/// [`Notifier`] that writes every notification to the log instead of
/// sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), WashHubError> {
        let recipient = &notification.recipient;
        tracing::info!(
            user = %recipient.name,
            email = recipient.wants_email(),
            push = recipient.wants_push(),
            title = %notification.title,
            message = %notification.short_message,
            "notification"
        );
        Ok(())
    }
}
