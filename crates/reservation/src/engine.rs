//! Reservation admission and cancellation.

use std::sync::Arc;
use std::time::Instant;

use slot_store::{
    Booking, BookingId, Email, EventId, Requester, SlotId, SlotInfo, SlotStore, StoreError,
};

use crate::admission;
use crate::error::{Missing, ReservationError};
use crate::notification::{Notification, Notifier};
use crate::retry::RetryPolicy;

/// Admits and cancels bookings against a slot store.
///
/// Every admission is decided inside a [`SlotUnit`](slot_store::SlotUnit),
/// so concurrent calls on the same slot behave as if applied one at a time.
/// The checks made before the unit is opened only fail fast.
pub struct ReservationEngine<S: SlotStore + ?Sized> {
    store: Arc<S>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl<S: SlotStore + ?Sized> Clone for ReservationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
            retry: self.retry,
        }
    }
}

impl<S: SlotStore + ?Sized> ReservationEngine<S> {
    /// Creates an engine with the default retry policy.
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The notifier used for booking confirmations and cancellations.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Reserves a slot of an event for a requester.
    ///
    /// Rejects with `NotFound` if the event or slot is missing, or the slot
    /// belongs to another event; with `Conflict::Duplicate` if the requester
    /// already holds the slot; with `Conflict::Full` if the slot is at
    /// capacity. Schedules a confirmation on success.
    #[tracing::instrument(skip(self, requester), fields(email = %requester.email))]
    pub async fn reserve(
        &self,
        event_id: EventId,
        slot_id: SlotId,
        requester: Requester,
    ) -> Result<Booking, ReservationError> {
        let start = Instant::now();
        let result = self.admit(event_id, slot_id, &requester).await;

        metrics::histogram!("reservation_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::counter!("reservations_total", "outcome" => outcome(&result)).increment(1);

        let (booking, slot) = result?;
        tracing::info!(booking_id = %booking.id, "booking created");
        self.notifier
            .enqueue(Notification::created(booking.clone(), slot));
        Ok(booking)
    }

    /// Cancels a booking and frees its place on the slot.
    ///
    /// Returns the removed booking. Schedules a cancellation notice.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, booking_id: BookingId) -> Result<Booking, ReservationError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Booking))?;

        let (booking, slot) = self
            .with_retries(|| self.cancel_once(booking.slot_id, booking_id))
            .await?;

        metrics::counter!("cancellations_total").increment(1);
        tracing::info!(%booking_id, "booking cancelled");
        self.notifier
            .enqueue(Notification::cancelled(booking.clone(), slot));
        Ok(booking)
    }

    /// Lists every booking held by a requester, across all events.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_requester(&self, email: &Email) -> Result<Vec<Booking>, ReservationError> {
        Ok(self.store.bookings_for_requester(email).await?)
    }

    /// Retrieves a booking.
    #[tracing::instrument(skip(self))]
    pub async fn booking(&self, booking_id: BookingId) -> Result<Booking, ReservationError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Booking))
    }

    async fn admit(
        &self,
        event_id: EventId,
        slot_id: SlotId,
        requester: &Requester,
    ) -> Result<(Booking, SlotInfo), ReservationError> {
        let capacity = self
            .store
            .get_capacity(event_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Event))?;
        if !self.store.slot_exists(slot_id, event_id).await? {
            return Err(ReservationError::NotFound(Missing::Slot));
        }

        let snapshot = self.store.snapshot(slot_id, &requester.email).await?;
        admission::check(&snapshot, capacity)?;

        self.with_retries(|| self.admit_once(event_id, slot_id, requester))
            .await
    }

    /// One attempt at the check-and-insert, inside a single slot unit.
    async fn admit_once(
        &self,
        event_id: EventId,
        slot_id: SlotId,
        requester: &Requester,
    ) -> Result<(Booking, SlotInfo), ReservationError> {
        let mut unit = self
            .store
            .begin_slot_unit(slot_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Slot))?;
        let info = unit.info().clone();
        if info.slot.event_id != event_id {
            return Err(ReservationError::NotFound(Missing::Slot));
        }

        let ledger = unit.ledger(&requester.email).await?;
        admission::check(&ledger, info.capacity)?;

        let booking = unit.insert_booking(requester).await?;
        unit.commit().await?;
        Ok((booking, info))
    }

    async fn cancel_once(
        &self,
        slot_id: SlotId,
        booking_id: BookingId,
    ) -> Result<(Booking, SlotInfo), ReservationError> {
        // The slot may have been deleted along with the booking
        let mut unit = self
            .store
            .begin_slot_unit(slot_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Booking))?;

        let booking = unit
            .remove_booking(booking_id)
            .await?
            .ok_or(ReservationError::NotFound(Missing::Booking))?;
        let info = unit.info().clone();
        unit.commit().await?;
        Ok((booking, info))
    }

    /// Runs `attempt` until it ends in something other than contention.
    ///
    /// Each attempt opens a fresh unit and re-runs every check.
    async fn with_retries<T, F, Fut>(&self, mut attempt: F) -> Result<T, ReservationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReservationError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Err(ReservationError::Storage(e)) if e.is_transient() => {
                    if attempts >= self.retry.max_attempts {
                        tracing::warn!(attempts, error = %e, "giving up after repeated contention");
                        return Err(StoreError::RetriesExhausted { attempts }.into());
                    }
                    let delay = self.retry.backoff(attempts);
                    tracing::debug!(attempts, ?delay, error = %e, "contention, retrying");
                    metrics::counter!("reservation_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn outcome<T>(result: &Result<T, ReservationError>) -> &'static str {
    use crate::error::Conflict;

    match result {
        Ok(_) => "created",
        Err(ReservationError::NotFound(_)) => "not_found",
        Err(ReservationError::Conflict(Conflict::Duplicate)) => "duplicate",
        Err(ReservationError::Conflict(Conflict::Full { .. })) => "full",
        Err(ReservationError::Storage(_)) => "error",
    }
}
