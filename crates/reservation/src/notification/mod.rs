//! Best-effort booking notifications.
//!
//! The engine hands each notification to a [`Notifier`], which queues it for
//! a background worker and returns immediately. Delivery happens outside the
//! admission decision: a slow, failing or absent sink never changes the
//! outcome of a reservation or cancellation.

pub mod dispatcher;
pub mod email;
pub mod sinks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slot_store::{Booking, SlotInfo};
use thiserror::Error;

pub use dispatcher::{DEFAULT_QUEUE_CAPACITY, Notifier};
pub use sinks::{LogSink, RecordingSink, SmtpConfig, SmtpSink};

/// What happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Created,
    Cancelled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Created => "created",
            NotificationKind::Cancelled => "cancelled",
        }
    }
}

/// A booking change together with the slot context needed to describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking: Booking,
    pub slot: SlotInfo,
}

impl Notification {
    pub fn created(booking: Booking, slot: SlotInfo) -> Self {
        Self {
            kind: NotificationKind::Created,
            booking,
            slot,
        }
    }

    pub fn cancelled(booking: Booking, slot: SlotInfo) -> Self {
        Self {
            kind: NotificationKind::Cancelled,
            booking,
            slot,
        }
    }
}

/// Errors a sink may report. They are logged and counted, never propagated.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A sender or recipient address could not be used.
    #[error("Invalid address: {0}")]
    Address(String),

    /// The message could not be built.
    #[error("Invalid message: {0}")]
    Message(String),

    /// The delivery channel failed.
    #[error("Delivery failed: {0}")]
    Transport(String),
}

/// A delivery channel for booking notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}
