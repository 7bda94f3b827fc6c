use thiserror::Error;

use crate::SlotId;

/// Errors that can occur when interacting with the slot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another unit of work holds, or raced for, the same rows.
    /// The attempted mutation had no effect and may be retried.
    #[error("Contention on {0}")]
    Contention(String),

    /// A transient failure persisted through every retry attempt.
    #[error("Slot still contended after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The storage backend refused the operation. Nothing was written.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// An event definition failed validation.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Contention on a single slot.
    pub fn contended_slot(slot_id: SlotId) -> Self {
        StoreError::Contention(format!("slot {slot_id}"))
    }

    /// Returns true if the operation may succeed when re-run from scratch.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

/// Result type for slot store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
