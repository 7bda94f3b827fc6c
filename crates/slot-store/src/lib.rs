//! Storage for the slot booking system.
//!
//! - [`Catalog`]: events and their slots
//! - [`BookingLedger`]: committed bookings, read and changed only through
//!   per-slot atomic units ([`SlotUnit`])
//! - [`InMemorySlotStore`] and [`PostgresSlotStore`] backends

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use catalog::Catalog;
pub use common::{BookingId, Email, EventId, Requester, SlotId};
pub use error::{Result, StoreError};
pub use ledger::{BookingLedger, LedgerSnapshot, SlotUnit};
pub use memory::InMemorySlotStore;
pub use model::{Booking, Event, EventDetail, NewEvent, Slot, SlotDetail, SlotInfo};
pub use postgres::PostgresSlotStore;
pub use store::{DEFAULT_LOCK_TIMEOUT, SlotStore, StoreConfig};
