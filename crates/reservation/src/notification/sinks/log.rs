use async_trait::async_trait;

use crate::notification::{Notification, NotificationSink, NotifyError};

/// Writes notifications to the tracing log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind.as_str(),
            booking_id = %notification.booking.id,
            to = %notification.booking.requester.email,
            event = %notification.slot.event_title,
            start_time = %notification.slot.slot.start_time,
            "booking notification"
        );
        Ok(())
    }
}
