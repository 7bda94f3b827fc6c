//! Shared types for the slot booking system.
//!
//! - Identifier newtypes for events, slots and bookings
//! - [`Email`] and [`Requester`], the identity a booking is held under

pub mod requester;
pub mod types;

pub use requester::{Email, InvalidRequester, Requester};
pub use types::{BookingId, EventId, SlotId};
