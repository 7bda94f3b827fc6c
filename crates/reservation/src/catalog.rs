//! Event and slot management.

use std::sync::Arc;

use slot_store::{Event, EventDetail, EventId, NewEvent, SlotId, SlotStore};

use crate::error::{CatalogError, Missing};

/// Creates, lists and deletes events and their slots.
///
/// Deletes cascade to every booking on the removed slots. No notification is
/// sent for bookings removed this way.
pub struct CatalogService<S: SlotStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SlotStore + ?Sized> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SlotStore + ?Sized> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an event with its slots.
    #[tracing::instrument(skip(self, event), fields(title = %event.title))]
    pub async fn create_event(&self, event: NewEvent) -> Result<EventDetail, CatalogError> {
        let detail = self.store.create_event(event).await?;
        metrics::counter!("events_created_total").increment(1);
        tracing::info!(event_id = %detail.event.id, slots = detail.slots.len(), "event created");
        Ok(detail)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_events(&self) -> Result<Vec<Event>, CatalogError> {
        Ok(self.store.list_events().await?)
    }

    /// Retrieves an event with its slots and their bookings.
    #[tracing::instrument(skip(self))]
    pub async fn get_event(&self, event_id: EventId) -> Result<EventDetail, CatalogError> {
        self.store
            .get_event_detail(event_id)
            .await?
            .ok_or(CatalogError::NotFound(Missing::Event))
    }

    /// Deletes an event, its slots and all their bookings.
    #[tracing::instrument(skip(self))]
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), CatalogError> {
        if !self.store.delete_event(event_id).await? {
            return Err(CatalogError::NotFound(Missing::Event));
        }
        tracing::info!(%event_id, "event deleted");
        Ok(())
    }

    /// Deletes one slot of an event and all its bookings.
    #[tracing::instrument(skip(self))]
    pub async fn delete_slot(&self, event_id: EventId, slot_id: SlotId) -> Result<(), CatalogError> {
        if !self.store.delete_slot(event_id, slot_id).await? {
            return Err(CatalogError::NotFound(Missing::Slot));
        }
        tracing::info!(%event_id, %slot_id, "slot deleted");
        Ok(())
    }
}
