//! Catalog and booking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookingId, EventId, Requester, SlotId, StoreError};

/// A bookable event. Owns its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,

    /// Maximum number of bookings each slot of this event admits.
    pub capacity: u32,

    pub created_at: DateTime<Utc>,
}

/// A single bookable time unit belonging to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub event_id: EventId,
    pub start_time: DateTime<Utc>,
}

/// A committed reservation binding one requester to one slot.
///
/// Immutable once created; it is only ever deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub slot_id: SlotId,
    pub requester: Requester,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub(crate) fn new(slot_id: SlotId, requester: Requester) -> Self {
        Self {
            id: BookingId::new(),
            slot_id,
            requester,
            created_at: Utc::now(),
        }
    }
}

/// Definition of an event to create, with the start times of its slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub slot_times: Vec<DateTime<Utc>>,
}

impl NewEvent {
    /// Creates an event definition with the default capacity of one booking per slot.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            capacity: 1,
            slot_times: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the per-slot capacity.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Adds a slot starting at the given time.
    pub fn slot_at(mut self, start_time: DateTime<Utc>) -> Self {
        self.slot_times.push(start_time);
        self
    }

    /// Checks the definition before anything is persisted.
    ///
    /// An event with no slots is valid; it just cannot be booked.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::InvalidEvent("title must not be empty".to_string()));
        }
        if self.capacity == 0 {
            return Err(StoreError::InvalidEvent(
                "capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_records(self) -> (Event, Vec<Slot>) {
        let event = Event {
            id: EventId::new(),
            title: self.title.trim().to_string(),
            description: self.description,
            capacity: self.capacity,
            created_at: Utc::now(),
        };
        let slots = self
            .slot_times
            .into_iter()
            .map(|start_time| Slot {
                id: SlotId::new(),
                event_id: event.id,
                start_time,
            })
            .collect();
        (event, slots)
    }
}

/// A slot together with the event facts needed to admit bookings to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: Slot,
    pub event_title: String,
    pub capacity: u32,
}

/// An event with all of its slots and their current bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    pub event: Event,

    /// Ordered by start time.
    pub slots: Vec<SlotDetail>,
}

/// A slot and the bookings currently held on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDetail {
    pub slot: Slot,
    pub bookings: Vec<Booking>,
}

impl SlotDetail {
    /// Number of bookings currently held on the slot.
    pub fn occupancy(&self) -> usize {
        self.bookings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_event_defaults_to_single_capacity() {
        let event = NewEvent::new("Office hours");
        assert_eq!(event.capacity, 1);
        assert!(event.slot_times.is_empty());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_capacity_and_blank_title() {
        assert!(matches!(
            NewEvent::new("Talk").capacity(0).validate(),
            Err(StoreError::InvalidEvent(_))
        ));
        assert!(matches!(
            NewEvent::new("   ").validate(),
            Err(StoreError::InvalidEvent(_))
        ));
    }

    #[test]
    fn into_records_links_slots_to_event() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let (event, slots) = NewEvent::new(" Workshop ")
            .capacity(3)
            .slot_at(start)
            .slot_at(start + chrono::Duration::hours(1))
            .into_records();

        assert_eq!(event.title, "Workshop");
        assert_eq!(event.capacity, 3);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.event_id == event.id));
        assert_ne!(slots[0].id, slots[1].id);
    }
}
