//! The admission rule, independent of how the ledger was read.

use slot_store::LedgerSnapshot;

use crate::error::Conflict;

/// Decides whether one more booking may be added to a slot.
///
/// A requester who already holds the slot is refused as a duplicate even if
/// the slot is also full.
pub fn check(snapshot: &LedgerSnapshot, capacity: u32) -> Result<(), Conflict> {
    if snapshot.is_held() {
        return Err(Conflict::Duplicate);
    }
    if snapshot.occupancy >= capacity {
        return Err(Conflict::Full { capacity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use slot_store::BookingId;

    use super::*;

    fn snapshot(occupancy: u32, held: bool) -> LedgerSnapshot {
        LedgerSnapshot {
            occupancy,
            held_by_requester: held.then(BookingId::new),
        }
    }

    #[test]
    fn admits_below_capacity() {
        assert_eq!(check(&snapshot(0, false), 1), Ok(()));
        assert_eq!(check(&snapshot(2, false), 3), Ok(()));
    }

    #[test]
    fn refuses_at_capacity() {
        assert_eq!(
            check(&snapshot(1, false), 1),
            Err(Conflict::Full { capacity: 1 })
        );
    }

    #[test]
    fn duplicate_wins_over_full() {
        assert_eq!(check(&snapshot(1, true), 1), Err(Conflict::Duplicate));
        assert_eq!(check(&snapshot(1, true), 5), Err(Conflict::Duplicate));
    }
}
