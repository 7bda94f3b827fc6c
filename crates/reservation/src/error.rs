//! Reservation error types.

use slot_store::StoreError;
use thiserror::Error;

/// The entity a request referred to that doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Event,
    Slot,
    Booking,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Missing::Event => "Event",
            Missing::Slot => "Time slot",
            Missing::Booking => "Booking",
        };
        f.write_str(name)
    }
}

/// Why an admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    /// The requester already holds a booking on the slot.
    #[error("You have already booked this time slot")]
    Duplicate,

    /// The slot is at capacity.
    #[error("This time slot is already fully booked (max {capacity} bookings allowed)")]
    Full { capacity: u32 },
}

/// Errors returned by the reservation engine.
///
/// Transient contention never appears here: it is retried inside the engine
/// and, if it persists, reported as [`StoreError::RetriesExhausted`].
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// Persistence failed. Nothing was written.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ReservationError {
    /// Returns true if the same request may succeed when issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::Storage(_))
    }
}

/// Errors returned by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("{0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidEvent(msg) => CatalogError::Invalid(msg),
            other => CatalogError::Storage(other),
        }
    }
}
