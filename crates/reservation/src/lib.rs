//! Slot reservation engine.
//!
//! This crate provides:
//! - [`ReservationEngine`]: atomic admission control for slot bookings,
//!   with bounded retries on transient contention
//! - [`CatalogService`]: event and slot management
//! - [`Notifier`] and [`NotificationSink`]s for best-effort booking notices

pub mod admission;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod notification;
pub mod retry;

pub use catalog::CatalogService;
pub use engine::ReservationEngine;
pub use error::{CatalogError, Conflict, Missing, ReservationError};
pub use notification::{
    LogSink, Notification, NotificationKind, NotificationSink, Notifier, NotifyError,
    RecordingSink, SmtpConfig, SmtpSink,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
