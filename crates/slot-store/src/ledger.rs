//! The capacity ledger: committed bookings per slot.
//!
//! Occupancy is never stored as a counter. It is always counted from the
//! booking set, and the count that gates an admission is taken inside the
//! same [`SlotUnit`] that inserts the booking.

use async_trait::async_trait;

use crate::{Booking, BookingId, Email, Requester, Result, SlotId, SlotInfo};

/// Point-in-time view of one slot's ledger from one requester's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    /// Number of bookings committed on the slot.
    pub occupancy: u32,

    /// The requester's existing booking on the slot, if any.
    pub held_by_requester: Option<BookingId>,
}

impl LedgerSnapshot {
    /// Returns true if the requester already holds a booking on the slot.
    pub fn is_held(&self) -> bool {
        self.held_by_requester.is_some()
    }
}

/// An atomic unit of work scoped to a single slot.
///
/// While a unit is open it holds the slot's exclusive lock: no other unit
/// can read or change the slot's bookings, and the slot cannot be deleted.
/// Writes become visible only on [`commit`](SlotUnit::commit); dropping the
/// unit without committing discards them.
#[async_trait]
pub trait SlotUnit: Send {
    /// The locked slot and its event's capacity.
    fn info(&self) -> &SlotInfo;

    /// Reads the slot's ledger, including writes staged in this unit.
    async fn ledger(&mut self, email: &Email) -> Result<LedgerSnapshot>;

    /// Stages a new booking on the slot.
    async fn insert_booking(&mut self, requester: &Requester) -> Result<Booking>;

    /// Stages the removal of a booking held on this slot.
    ///
    /// Returns None if the slot holds no booking with that ID.
    async fn remove_booking(&mut self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Makes all staged writes visible and releases the slot.
    ///
    /// On error nothing staged in the unit is applied.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Read access to bookings, and the only way to change them.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Reads a slot's ledger outside of any unit.
    ///
    /// Useful for failing fast; the answer may be stale by the time a unit
    /// is opened.
    async fn snapshot(&self, slot_id: SlotId, email: &Email) -> Result<LedgerSnapshot>;

    /// Retrieves a booking.
    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Lists every booking held by a requester, across all events.
    async fn bookings_for_requester(&self, email: &Email) -> Result<Vec<Booking>>;

    /// Opens an atomic unit on a slot, waiting for its lock.
    ///
    /// Returns None if the slot doesn't exist once the lock is held.
    /// Fails with [`StoreError::Contention`](crate::StoreError::Contention)
    /// if the lock can't be taken in time.
    async fn begin_slot_unit(&self, slot_id: SlotId) -> Result<Option<Box<dyn SlotUnit>>>;
}
