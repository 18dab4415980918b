use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative, single-shot cancellation flag shared by every long-lived
/// task (spec.md §4.14). `stop()` is idempotent; `stop_requested()` is a
/// cheap, lock-free observation any blocking-boundary loop can poll.
///
/// Tasks that are parked on a `tokio::time::sleep` or socket-receive
/// timeout observe cancellation at the next wakeup; tasks parked on
/// `notified()` are woken immediately by `stop()`.
#[derive(Debug, Default)]
pub struct Stoppable {
    flag: AtomicBool,
    notify: Notify,
}

impl Stoppable {
    pub fn new() -> Arc<Self> {
        Arc::new(Stoppable { flag: AtomicBool::new(false), notify: Notify::new() })
    }

    /// Requests cancellation. Safe to call more than once or from more
    /// than one caller; only the first call has any effect.
    pub fn stop(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Parks until `stop()` is called, or returns immediately if it
    /// already has been. Intended for loops that otherwise have no
    /// natural blocking boundary to poll at.
    pub async fn wait_for_stop(&self) {
        if self.stop_requested() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_and_observable() {
        let s = Stoppable::new();
        assert!(!s.stop_requested());
        s.stop();
        s.stop();
        assert!(s.stop_requested());
    }

    #[tokio::test]
    async fn wait_for_stop_returns_after_stop() {
        let s = Stoppable::new();
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move {
                s.wait_for_stop().await;
            })
        };
        tokio::task::yield_now().await;
        s.stop();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter did not observe stop in time")
            .unwrap();
    }
}
