use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::notification::{Notification, NotificationSink, NotifyError};

/// In-memory sink that records what it was asked to deliver.
///
/// Can be switched into a failing mode to exercise error handling.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    sent: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    changed: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Notifications delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Deliveries attempted so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` notifications have been delivered.
    pub async fn wait_for(&self, n: usize) -> Vec<Notification> {
        loop {
            let changed = self.inner.changed.notified();
            {
                let sent = self.lock();
                if sent.len() >= n {
                    return sent.clone();
                }
            }
            changed.await;
        }
    }

    /// Waits until at least `n` deliveries have been attempted.
    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let changed = self.inner.changed.notified();
            if self.attempts() >= n {
                return;
            }
            changed.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        // A panic while holding the lock can't leave the Vec half-written
        self.inner
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let result = if self.inner.failing.load(Ordering::SeqCst) {
            Err(NotifyError::Transport("recording sink set to fail".to_string()))
        } else {
            self.lock().push(notification.clone());
            Ok(())
        };
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
        result
    }
}
