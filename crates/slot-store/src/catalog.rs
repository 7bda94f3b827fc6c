use async_trait::async_trait;

use crate::{Event, EventDetail, EventId, NewEvent, Result, SlotId};

/// Read and write access to events and their slots.
///
/// Catalog reads carry no isolation guarantees of their own. Admission
/// decisions re-read the facts they depend on inside a
/// [`SlotUnit`](crate::SlotUnit).
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Creates an event together with all of its slots.
    ///
    /// The definition is validated first; nothing is stored if it is invalid.
    async fn create_event(&self, event: NewEvent) -> Result<EventDetail>;

    /// Lists all events, without their slots.
    async fn list_events(&self) -> Result<Vec<Event>>;

    /// Retrieves an event.
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>>;

    /// Retrieves an event with its slots and the bookings held on them.
    async fn get_event_detail(&self, event_id: EventId) -> Result<Option<EventDetail>>;

    /// Returns true if the slot exists and belongs to the event.
    async fn slot_exists(&self, slot_id: SlotId, event_id: EventId) -> Result<bool>;

    /// Returns the per-slot capacity of an event, or None if the event doesn't exist.
    async fn get_capacity(&self, event_id: EventId) -> Result<Option<u32>>;

    /// Deletes an event, its slots and every booking on those slots.
    ///
    /// Each affected slot is locked for the duration of the delete, so no
    /// booking can be admitted to a slot that is being removed.
    /// Returns false if the event didn't exist.
    async fn delete_event(&self, event_id: EventId) -> Result<bool>;

    /// Deletes one slot of an event and every booking on it.
    ///
    /// Returns false if the slot didn't exist or belongs to another event.
    async fn delete_slot(&self, event_id: EventId, slot_id: SlotId) -> Result<bool>;
}
