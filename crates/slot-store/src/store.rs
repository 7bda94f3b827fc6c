use std::time::Duration;

use crate::{BookingLedger, Catalog};

/// Default time to wait for a slot lock before reporting contention.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Options shared by all store implementations.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long opening a [`SlotUnit`](crate::SlotUnit) waits for the slot's lock.
    pub lock_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration with the given lock timeout.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self { lock_timeout }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// A complete backend: catalog plus capacity ledger.
pub trait SlotStore: Catalog + BookingLedger {}

// Blanket implementation for every backend providing both halves
impl<T: Catalog + BookingLedger + ?Sized> SlotStore for T {}
