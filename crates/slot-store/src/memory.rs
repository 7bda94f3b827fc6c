use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Booking, BookingId, BookingLedger, Catalog, Email, Event, EventDetail, EventId,
    LedgerSnapshot, NewEvent, Requester, Result, Slot, SlotDetail, SlotId, SlotInfo, SlotUnit,
    StoreConfig, StoreError,
};

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, Event>,
    slots: HashMap<SlotId, Slot>,
    bookings: HashMap<BookingId, Booking>,
}

impl State {
    fn bookings_on(&self, slot_id: SlotId) -> Vec<Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .values()
            .filter(|b| b.slot_id == slot_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.created_at, b.id));
        bookings
    }

    fn detail(&self, event: &Event) -> EventDetail {
        let mut slots: Vec<_> = self
            .slots
            .values()
            .filter(|s| s.event_id == event.id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.start_time, s.id));

        EventDetail {
            event: event.clone(),
            slots: slots
                .into_iter()
                .map(|slot| SlotDetail {
                    bookings: self.bookings_on(slot.id),
                    slot,
                })
                .collect(),
        }
    }
}

/// Failures to inject on upcoming operations.
#[derive(Debug, Default)]
struct Faults {
    failing_commits: AtomicU32,
    contention: AtomicU32,
}

/// Consumes one pending fault, if any.
fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory slot store.
///
/// Each slot has its own async mutex. A [`SlotUnit`] holds that mutex from
/// the moment it is opened until it is committed or dropped, and deletes
/// take the mutexes of every slot they remove. Staged bookings are written
/// to the shared state in one step on commit.
#[derive(Clone, Default)]
pub struct InMemorySlotStore {
    state: Arc<RwLock<State>>,
    locks: Arc<Mutex<HashMap<SlotId, Arc<Mutex<()>>>>>,
    faults: Arc<Faults>,
    config: StoreConfig,
}

impl InMemorySlotStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Makes the next `n` unit commits fail without applying anything.
    pub fn fail_next_commits(&self, n: u32) {
        self.faults.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` attempts to open a unit fail with contention.
    pub fn inject_contention(&self, n: u32) {
        self.faults.contention.store(n, Ordering::SeqCst);
    }

    /// Returns the total number of bookings across all slots.
    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    /// Returns the total number of slots across all events.
    pub async fn slot_count(&self) -> usize {
        self.state.read().await.slots.len()
    }

    async fn lock_slot(&self, slot_id: SlotId) -> Result<OwnedMutexGuard<()>> {
        let lock = self.locks.lock().await.entry(slot_id).or_default().clone();

        tokio::time::timeout(self.config.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| StoreError::contended_slot(slot_id))
    }

    async fn forget_locks(&self, slot_ids: &[SlotId]) {
        let mut locks = self.locks.lock().await;
        for slot_id in slot_ids {
            locks.remove(slot_id);
        }
    }
}

#[async_trait]
impl Catalog for InMemorySlotStore {
    async fn create_event(&self, event: NewEvent) -> Result<EventDetail> {
        event.validate()?;
        let (event, slots) = event.into_records();

        let mut state = self.state.write().await;
        for slot in slots {
            state.slots.insert(slot.id, slot);
        }
        state.events.insert(event.id, event.clone());

        tracing::debug!(event_id = %event.id, "event created");
        Ok(state.detail(&event))
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state.events.values().cloned().collect();
        events.sort_by_key(|e| (e.created_at, e.id));
        Ok(events)
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn get_event_detail(&self, event_id: EventId) -> Result<Option<EventDetail>> {
        let state = self.state.read().await;
        Ok(state.events.get(&event_id).map(|event| state.detail(event)))
    }

    async fn slot_exists(&self, slot_id: SlotId, event_id: EventId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .slots
            .get(&slot_id)
            .is_some_and(|s| s.event_id == event_id))
    }

    async fn get_capacity(&self, event_id: EventId) -> Result<Option<u32>> {
        let state = self.state.read().await;
        Ok(state.events.get(&event_id).map(|e| e.capacity))
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool> {
        let mut slot_ids: Vec<SlotId> = {
            let state = self.state.read().await;
            if !state.events.contains_key(&event_id) {
                return Ok(false);
            }
            state
                .slots
                .values()
                .filter(|s| s.event_id == event_id)
                .map(|s| s.id)
                .collect()
        };
        slot_ids.sort();

        let mut guards = Vec::with_capacity(slot_ids.len());
        for slot_id in &slot_ids {
            guards.push(self.lock_slot(*slot_id).await?);
        }

        let removed = {
            let mut state = self.state.write().await;
            if state.events.remove(&event_id).is_none() {
                false
            } else {
                let doomed: HashSet<SlotId> = slot_ids.iter().copied().collect();
                state.slots.retain(|_, s| s.event_id != event_id);
                state.bookings.retain(|_, b| !doomed.contains(&b.slot_id));
                true
            }
        };
        drop(guards);

        if removed {
            self.forget_locks(&slot_ids).await;
            tracing::debug!(%event_id, slots = slot_ids.len(), "event deleted");
        }
        Ok(removed)
    }

    async fn delete_slot(&self, event_id: EventId, slot_id: SlotId) -> Result<bool> {
        if !self.slot_exists(slot_id, event_id).await? {
            return Ok(false);
        }

        let guard = self.lock_slot(slot_id).await?;
        let removed = {
            let mut state = self.state.write().await;
            let belongs = state
                .slots
                .get(&slot_id)
                .is_some_and(|s| s.event_id == event_id);
            if belongs {
                state.slots.remove(&slot_id);
                state.bookings.retain(|_, b| b.slot_id != slot_id);
            }
            belongs
        };
        drop(guard);

        if removed {
            self.forget_locks(&[slot_id]).await;
            tracing::debug!(%event_id, %slot_id, "slot deleted");
        }
        Ok(removed)
    }
}

#[async_trait]
impl BookingLedger for InMemorySlotStore {
    async fn snapshot(&self, slot_id: SlotId, email: &Email) -> Result<LedgerSnapshot> {
        let state = self.state.read().await;
        Ok(ledger_of(
            state.bookings.values().filter(|b| b.slot_id == slot_id),
            email,
        ))
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&booking_id).cloned())
    }

    async fn bookings_for_requester(&self, email: &Email) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<_> = state
            .bookings
            .values()
            .filter(|b| &b.requester.email == email)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.created_at, b.id));
        Ok(bookings)
    }

    async fn begin_slot_unit(&self, slot_id: SlotId) -> Result<Option<Box<dyn SlotUnit>>> {
        if take_fault(&self.faults.contention) {
            return Err(StoreError::contended_slot(slot_id));
        }

        let guard = self.lock_slot(slot_id).await?;

        let (info, bookings) = {
            let state = self.state.read().await;
            let Some(slot) = state.slots.get(&slot_id).cloned() else {
                return Ok(None);
            };
            let event = state.events.get(&slot.event_id).ok_or_else(|| {
                StoreError::Corrupt(format!("slot {slot_id} has no event {}", slot.event_id))
            })?;
            let info = SlotInfo {
                event_title: event.title.clone(),
                capacity: event.capacity,
                slot,
            };
            (info, state.bookings_on(slot_id))
        };

        Ok(Some(Box::new(MemorySlotUnit {
            store: self.clone(),
            _guard: guard,
            info,
            bookings,
            staged: Vec::new(),
        })))
    }
}

fn ledger_of<'a>(bookings: impl Iterator<Item = &'a Booking>, email: &Email) -> LedgerSnapshot {
    bookings.fold(LedgerSnapshot::default(), |mut ledger, booking| {
        ledger.occupancy += 1;
        if &booking.requester.email == email {
            ledger.held_by_requester = Some(booking.id);
        }
        ledger
    })
}

enum Staged {
    Insert(Booking),
    Remove(BookingId),
}

struct MemorySlotUnit {
    store: InMemorySlotStore,
    _guard: OwnedMutexGuard<()>,
    info: SlotInfo,

    /// The slot's bookings as this unit sees them, staged writes included.
    bookings: Vec<Booking>,
    staged: Vec<Staged>,
}

#[async_trait]
impl SlotUnit for MemorySlotUnit {
    fn info(&self) -> &SlotInfo {
        &self.info
    }

    async fn ledger(&mut self, email: &Email) -> Result<LedgerSnapshot> {
        Ok(ledger_of(self.bookings.iter(), email))
    }

    async fn insert_booking(&mut self, requester: &Requester) -> Result<Booking> {
        let booking = Booking::new(self.info.slot.id, requester.clone());
        self.bookings.push(booking.clone());
        self.staged.push(Staged::Insert(booking.clone()));
        Ok(booking)
    }

    async fn remove_booking(&mut self, booking_id: BookingId) -> Result<Option<Booking>> {
        let Some(pos) = self.bookings.iter().position(|b| b.id == booking_id) else {
            return Ok(None);
        };
        let booking = self.bookings.remove(pos);
        self.staged.push(Staged::Remove(booking_id));
        Ok(Some(booking))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let unit = *self;
        if take_fault(&unit.store.faults.failing_commits) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let mut state = unit.store.state.write().await;
        for change in unit.staged {
            match change {
                Staged::Insert(booking) => {
                    state.bookings.insert(booking.id, booking);
                }
                Staged::Remove(booking_id) => {
                    state.bookings.remove(&booking_id);
                }
            }
        }
        Ok(())
    }
}
