use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{Notification, NotificationSink};

/// Default number of notifications that may wait for delivery.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Hands notifications to a background delivery worker.
///
/// Enqueueing never waits. When the queue is full the notification is
/// dropped with a warning.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notification>>,
}

impl Notifier {
    /// Starts a delivery worker for `sink` on the current runtime.
    ///
    /// The worker exits once every clone of the returned notifier is dropped
    /// and the queue has drained.
    pub fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(deliver(sink, rx));
        (Self { tx: Some(tx) }, worker)
    }

    /// A notifier that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether notifications reach a delivery worker.
    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queues a notification. Returns false if it was dropped.
    pub fn enqueue(&self, notification: Notification) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    booking_id = %dropped.booking.id,
                    kind = dropped.kind.as_str(),
                    "notification queue full, dropping notification"
                );
                metrics::counter!("notifications_dropped_total").increment(1);
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                tracing::warn!(
                    booking_id = %dropped.booking.id,
                    "notification worker stopped, dropping notification"
                );
                metrics::counter!("notifications_dropped_total").increment(1);
                false
            }
        }
    }
}

async fn deliver(sink: Arc<dyn NotificationSink>, mut rx: mpsc::Receiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        let kind = notification.kind.as_str();
        match sink.notify(&notification).await {
            Ok(()) => {
                metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
            }
            Err(e) => {
                tracing::warn!(
                    booking_id = %notification.booking.id,
                    kind,
                    error = %e,
                    "failed to deliver notification"
                );
                metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
            }
        }
    }
    tracing::debug!("notification worker stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use slot_store::{Booking, BookingId, EventId, Requester, Slot, SlotId, SlotInfo};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::notification::{NotifyError, RecordingSink};

    fn notification() -> Notification {
        let slot = Slot {
            id: SlotId::new(),
            event_id: EventId::new(),
            start_time: Utc::now(),
        };
        Notification::created(
            Booking {
                id: BookingId::new(),
                slot_id: slot.id,
                requester: Requester::new("Alice", "alice@x.com").unwrap(),
                created_at: Utc::now(),
            },
            SlotInfo {
                slot,
                event_title: "Yoga".to_string(),
                capacity: 1,
            },
        )
    }

    /// Blocks every delivery until a permit is added.
    struct GatedSink {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl NotificationSink for GatedSink {
        async fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let sink = RecordingSink::new();
        let (notifier, _worker) = Notifier::spawn(Arc::new(sink.clone()), 8);

        let first = notification();
        let second = notification();
        assert!(notifier.enqueue(first.clone()));
        assert!(notifier.enqueue(second.clone()));

        let sent = tokio::time::timeout(Duration::from_secs(1), sink.wait_for(2))
            .await
            .unwrap();
        assert_eq!(sent, vec![first, second]);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_worker() {
        let sink = RecordingSink::new();
        sink.set_failing(true);
        let (notifier, _worker) = Notifier::spawn(Arc::new(sink.clone()), 8);

        notifier.enqueue(notification());
        tokio::time::timeout(Duration::from_secs(1), sink.wait_for_attempts(1))
            .await
            .unwrap();

        sink.set_failing(false);
        notifier.enqueue(notification());
        let sent = tokio::time::timeout(Duration::from_secs(1), sink.wait_for(1))
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sink.attempts(), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_without_waiting() {
        let gate = Arc::new(Semaphore::new(0));
        let (notifier, _worker) = Notifier::spawn(Arc::new(GatedSink { gate: gate.clone() }), 1);

        // One in flight at the sink, one in the queue, the rest dropped
        let accepted = (0..10).filter(|_| notifier.enqueue(notification())).count();
        assert!(accepted <= 2, "accepted {accepted}");
        assert!(accepted >= 1);

        gate.add_permits(10);
    }

    #[tokio::test]
    async fn worker_exits_when_notifier_dropped() {
        let sink = RecordingSink::new();
        let (notifier, worker) = Notifier::spawn(Arc::new(sink.clone()), 8);
        notifier.enqueue(notification());
        drop(notifier);

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn disabled_discards() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(!notifier.enqueue(notification()));
    }

    #[tokio::test]
    async fn spawned_notifier_is_enabled() {
        let (notifier, _worker) = Notifier::spawn(Arc::new(RecordingSink::new()), 8);
        assert!(notifier.is_enabled());
    }
}
