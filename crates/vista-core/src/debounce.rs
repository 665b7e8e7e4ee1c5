//! Scoped debounce timer.
//!
//! A [`Debouncer`] delays an async action until input has been quiet for a
//! fixed interval. Scheduling again before the interval elapses replaces the
//! pending action. The timer belongs to the component that created it:
//! dropping the debouncer aborts whatever is still pending, so no callback
//! ever fires after its owner is gone.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default quiet period for autocomplete-style lookups.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Delays an action until input settles.
#[derive(Debug)]
pub struct Debouncer {
    handle: Handle,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer that spawns onto the given runtime.
    pub fn new(handle: Handle, delay: Duration) -> Self {
        Self {
            handle,
            delay,
            pending: None,
        }
    }

    /// Create a debouncer on the current runtime.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn on_current(delay: Duration) -> Self {
        Self::new(Handle::current(), delay)
    }

    /// The configured quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action` to run after the quiet period, replacing any pending one.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    /// Cancel the pending action, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    /// Whether an action is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_only_last_scheduled_action_fires() {
        let fired = Arc::new(AtomicU32::new(0));
        let last = Arc::new(AtomicU32::new(0));
        let mut debouncer = Debouncer::on_current(Duration::from_millis(30));

        for i in 1..=3 {
            let fired = fired.clone();
            let last = last.clone();
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 3);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_drop_cancels_pending_action() {
        let fired = Arc::new(AtomicU32::new(0));
        {
            let mut debouncer = Debouncer::on_current(Duration::from_millis(30));
            let fired = fired.clone();
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            assert!(debouncer.is_pending());
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_clears_pending() {
        let mut debouncer = Debouncer::on_current(DEFAULT_DEBOUNCE);
        debouncer.schedule(async {});
        debouncer.cancel();
        assert!(!debouncer.is_pending());
    }
}
