//! Periodic expiry check.

use crate::SessionManager;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Handle to a running expiry watch. The task stops when this is dropped.
#[derive(Debug)]
pub struct ExpiryWatch {
    handle: JoinHandle<()>,
}

impl ExpiryWatch {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ExpiryWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SessionManager {
    /// Check expiry every `interval` on the current tokio runtime.
    ///
    /// The first check runs immediately. The task holds only a weak reference
    /// and exits once the manager is dropped.
    pub fn spawn_expiry_watch(self: &Arc<Self>, interval: Duration) -> ExpiryWatch {
        let manager: Weak<SessionManager> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager dropped, stopping expiry watch");
                    break;
                };
                if manager.check_expiry() {
                    debug!("Expiry watch ended the session");
                }
            }
        });

        ExpiryWatch { handle }
    }
}

#[cfg(test)]
mod tests {
    use crate::credential::test_tokens::token_expiring_at;
    use crate::session::test_support::*;
    use crate::{SessionEvent, SignOutReason};
    use portal_storage::MemoryStorage;
    use std::sync::Arc;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test(start_paused = true)]
    async fn test_watch_expires_session() {
        let clock = TestClock::at(NOW);
        let manager = Arc::new(manager_with(Arc::new(MemoryStorage::new()), &clock));
        manager.sign_in(&token_expiring_at(NOW + 100)).unwrap();
        let mut events = manager.subscribe();

        let _watch = manager.spawn_expiry_watch(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.is_authenticated());

        clock.advance(45);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(!manager.is_authenticated());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut {
                reason: SignOutReason::Expired
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_is_quiet_without_session() {
        let clock = TestClock::at(NOW);
        let manager = Arc::new(manager_with(Arc::new(MemoryStorage::new()), &clock));
        let mut events = manager.subscribe();

        let _watch = manager.spawn_expiry_watch(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert!(events.try_recv().is_err());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_stops_watch() {
        let clock = TestClock::at(NOW);
        let manager = Arc::new(manager_with(Arc::new(MemoryStorage::new()), &clock));
        manager.sign_in(&token_expiring_at(NOW + 100)).unwrap();

        let watch = manager.spawn_expiry_watch(Duration::from_secs(30));
        assert!(watch.is_running());
        drop(watch);

        clock.advance(3600);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_exits_when_manager_dropped() {
        let clock = TestClock::at(NOW);
        let manager = Arc::new(manager_with(Arc::new(MemoryStorage::new()), &clock));
        let watch = manager.spawn_expiry_watch(Duration::from_secs(1));
        drop(manager);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!watch.is_running());
    }
}
