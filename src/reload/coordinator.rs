//! One-shot change signal.
//!
//! Each generation of the signal is a `watch` channel that only ever moves
//! from `false` to `true`. `broadcast` fires the current generation and
//! takes it out of the slot, so the next `subscribe` starts a fresh one.
//!
//! ```text
//! subscribe() ─┐
//! subscribe() ─┼─> generation N ──broadcast()──> all waiters resume
//! subscribe() ─┘
//! subscribe() ───> generation N+1 (lazily created)
//! ```

use parking_lot::Mutex;
use tokio::sync::watch;

/// Hands out change signals and fires them all at once.
#[derive(Debug, Default)]
pub struct ReloadCoordinator {
    current: Mutex<Option<watch::Sender<bool>>>,
}

impl ReloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that fires on the next [`broadcast`](Self::broadcast).
    ///
    /// Every subscriber between two broadcasts shares one generation.
    pub fn subscribe(&self) -> ReloadSignal {
        let mut current = self.current.lock();
        let sender = current.get_or_insert_with(|| watch::channel(false).0);
        ReloadSignal {
            rx: sender.subscribe(),
        }
    }

    /// Fire the current generation, waking every waiter.
    ///
    /// Returns `false` when nobody subscribed since the last broadcast.
    pub fn broadcast(&self) -> bool {
        let Some(sender) = self.current.lock().take() else {
            return false;
        };
        // `send_replace` succeeds even if every receiver is gone.
        sender.send_replace(true);
        true
    }
}

/// A subscription to one generation of the change signal.
#[derive(Debug)]
pub struct ReloadSignal {
    rx: watch::Receiver<bool>,
}

impl ReloadSignal {
    /// Wait until the generation fires.
    ///
    /// Resolves immediately if it already fired before this call.
    pub async fn wait(mut self) {
        // A closed channel means the sender was dropped without firing,
        // which only happens together with a broadcast.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    #[cfg(test)]
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broadcast_wakes_all_waiters() {
        let coordinator = Arc::new(ReloadCoordinator::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| tokio::spawn(coordinator.subscribe().wait()))
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.broadcast());

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter not woken")
                .unwrap();
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_is_noop() {
        let coordinator = ReloadCoordinator::new();
        assert!(!coordinator.broadcast());
        assert!(!coordinator.broadcast());
    }

    #[test]
    fn test_broadcast_after_subscribers_dropped() {
        let coordinator = ReloadCoordinator::new();
        drop(coordinator.subscribe());
        assert!(coordinator.broadcast());
    }

    #[test]
    fn test_fired_before_wait_is_observed() {
        let coordinator = ReloadCoordinator::new();
        let signal = coordinator.subscribe();
        coordinator.broadcast();
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_wait_after_fire_returns_immediately() {
        let coordinator = ReloadCoordinator::new();
        let signal = coordinator.subscribe();
        coordinator.broadcast();

        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("fired signal should not block");
    }

    #[tokio::test]
    async fn test_next_generation_is_fresh() {
        let coordinator = ReloadCoordinator::new();
        let first = coordinator.subscribe();
        coordinator.broadcast();

        let second = coordinator.subscribe();
        assert!(first.is_fired());
        assert!(!second.is_fired());

        let pending = tokio::time::timeout(Duration::from_millis(50), second.wait()).await;
        assert!(pending.is_err(), "new generation must wait for the next broadcast");
    }

    #[test]
    fn test_subscribers_share_a_generation() {
        let coordinator = ReloadCoordinator::new();
        let a = coordinator.subscribe();
        let b = coordinator.subscribe();
        coordinator.broadcast();
        assert!(a.is_fired() && b.is_fired());
    }
}
