//! Cancellable one-shot timers.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A delayed action running on the tokio runtime.
///
/// Cancelling only stops the wait. Once the delay has elapsed the action is
/// handed to its own task and always runs to the end, even if the timer is
/// cancelled afterwards.
#[derive(Debug)]
pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `action` after `delay`.
    pub(crate) fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action);
        });
        Self { handle }
    }

    /// Stop waiting. No-op when the timer already fired.
    pub(crate) fn cancel(&self) {
        self.handle.abort();
    }

    /// The delay has elapsed and the action was handed off.
    pub(crate) fn has_fired(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_action(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_action_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let timer = Timer::schedule(Duration::from_secs(10), counting_action(&counter));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(timer.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_run_cancelled_action() {
        let counter = Arc::new(AtomicUsize::new(0));
        let timer = Timer::schedule(Duration::from_secs(10), counting_action(&counter));

        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_finish_action_when_cancelled_after_firing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slow = {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        };
        let timer = Timer::schedule(Duration::from_secs(1), slow);

        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
