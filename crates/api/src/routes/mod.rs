//! HTTP route handlers.

pub mod bookings;
pub mod events;
pub mod health;
pub mod metrics;

use reservation::{CatalogService, ReservationEngine};
use slot_store::SlotStore;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub engine: ReservationEngine<dyn SlotStore>,
    pub catalog: CatalogService<dyn SlotStore>,
}

/// Parses a path segment into one of the UUID-backed IDs.
fn parse_id<T: From<Uuid>>(id: &str) -> Result<T, ApiError> {
    let uuid =
        Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(T::from(uuid))
}
