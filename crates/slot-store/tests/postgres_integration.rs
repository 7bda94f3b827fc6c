//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container.
//! Run with:
//!
//! ```bash
//! cargo test -p slot-store --test postgres_integration -- --test-threads=1
//! ```

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use serial_test::serial;
use slot_store::{
    BookingLedger, Catalog, Email, NewEvent, PostgresSlotStore, Requester, SlotId, StoreConfig,
    StoreError,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_booking_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store_with(config: StoreConfig) -> PostgresSlotStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE bookings, time_slots, events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSlotStore::with_config(pool, config)
}

async fn get_test_store() -> PostgresSlotStore {
    get_test_store_with(StoreConfig::default()).await
}

fn requester(name: &str) -> Requester {
    Requester::new(name, &format!("{}@example.com", name.to_lowercase())).unwrap()
}

fn workshop(capacity: u32) -> NewEvent {
    NewEvent::new("Workshop")
        .description("Hands-on")
        .capacity(capacity)
        .slot_at(Utc.with_ymd_and_hms(2030, 1, 1, 14, 0, 0).unwrap())
        .slot_at(Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap())
}

async fn book(store: &PostgresSlotStore, slot_id: SlotId, who: &Requester) -> slot_store::Booking {
    let mut unit = store.begin_slot_unit(slot_id).await.unwrap().unwrap();
    let booking = unit.insert_booking(who).await.unwrap();
    unit.commit().await.unwrap();
    booking
}

#[tokio::test]
#[serial]
async fn test_create_and_load_event() {
    let store = get_test_store().await;

    let created = store.create_event(workshop(3)).await.unwrap();
    assert_eq!(created.event.capacity, 3);
    assert_eq!(created.slots.len(), 2);
    assert!(created.slots[0].slot.start_time < created.slots[1].slot.start_time);

    let loaded = store
        .get_event_detail(created.event.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.event.title, "Workshop");
    assert_eq!(loaded.event.description.as_deref(), Some("Hands-on"));
    assert_eq!(loaded.slots.len(), 2);
    assert_eq!(loaded.slots[0].slot.id, created.slots[0].slot.id);

    assert_eq!(store.get_capacity(created.event.id).await.unwrap(), Some(3));
    assert_eq!(store.list_events().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_invalid_event_not_stored() {
    let store = get_test_store().await;

    let result = store.create_event(workshop(0)).await;
    assert!(matches!(result, Err(StoreError::InvalidEvent(_))));
    assert!(store.list_events().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_slot_exists_checks_ownership() {
    let store = get_test_store().await;
    let a = store.create_event(workshop(1)).await.unwrap();
    let b = store.create_event(workshop(1)).await.unwrap();
    let slot_id = a.slots[0].slot.id;

    assert!(store.slot_exists(slot_id, a.event.id).await.unwrap());
    assert!(!store.slot_exists(slot_id, b.event.id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_unit_commit_and_snapshot() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(2)).await.unwrap();
    let slot_id = event.slots[0].slot.id;
    let alice = requester("Alice");

    let mut unit = store.begin_slot_unit(slot_id).await.unwrap().unwrap();
    assert_eq!(unit.info().capacity, 2);
    assert_eq!(unit.info().event_title, "Workshop");
    let booking = unit.insert_booking(&alice).await.unwrap();

    let inside = unit.ledger(&alice.email).await.unwrap();
    assert_eq!(inside.occupancy, 1);
    assert_eq!(inside.held_by_requester, Some(booking.id));

    unit.commit().await.unwrap();

    let snapshot = store.snapshot(slot_id, &alice.email).await.unwrap();
    assert_eq!(snapshot.occupancy, 1);
    assert!(snapshot.is_held());

    let fetched = store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(fetched.requester, alice);
}

#[tokio::test]
#[serial]
async fn test_dropped_unit_rolls_back() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(2)).await.unwrap();
    let slot_id = event.slots[0].slot.id;
    let alice = requester("Alice");

    {
        let mut unit = store.begin_slot_unit(slot_id).await.unwrap().unwrap();
        unit.insert_booking(&alice).await.unwrap();
    }

    let snapshot = store.snapshot(slot_id, &alice.email).await.unwrap();
    assert_eq!(snapshot.occupancy, 0);
}

#[tokio::test]
#[serial]
async fn test_missing_slot_yields_no_unit() {
    let store = get_test_store().await;
    let unit = store.begin_slot_unit(SlotId::new()).await.unwrap();
    assert!(unit.is_none());
}

#[tokio::test]
#[serial]
async fn test_duplicate_insert_is_contention() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(5)).await.unwrap();
    let slot_id = event.slots[0].slot.id;
    let alice = requester("Alice");

    book(&store, slot_id, &alice).await;

    let mut unit = store.begin_slot_unit(slot_id).await.unwrap().unwrap();
    let result = unit.insert_booking(&alice).await;
    assert!(matches!(result, Err(StoreError::Contention(_))));
}

#[tokio::test]
#[serial]
async fn test_lock_timeout_is_contention() {
    let store =
        get_test_store_with(StoreConfig::with_lock_timeout(Duration::from_millis(100))).await;
    let event = store.create_event(workshop(1)).await.unwrap();
    let slot_id = event.slots[0].slot.id;

    let _held = store.begin_slot_unit(slot_id).await.unwrap().unwrap();

    match store.begin_slot_unit(slot_id).await {
        Err(StoreError::Contention(_)) => {}
        Err(other) => panic!("expected contention, got {other}"),
        Ok(_) => panic!("expected contention, got a unit"),
    }
}

#[tokio::test]
#[serial]
async fn test_remove_booking() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(1)).await.unwrap();
    let slot_id = event.slots[0].slot.id;
    let other_slot = event.slots[1].slot.id;
    let booking = book(&store, slot_id, &requester("Alice")).await;

    // Wrong slot: nothing removed
    let mut unit = store.begin_slot_unit(other_slot).await.unwrap().unwrap();
    assert!(unit.remove_booking(booking.id).await.unwrap().is_none());
    drop(unit);

    let mut unit = store.begin_slot_unit(slot_id).await.unwrap().unwrap();
    let removed = unit.remove_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(removed.id, booking.id);
    unit.commit().await.unwrap();

    assert!(store.get_booking(booking.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_delete_event_cascades() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(2)).await.unwrap();
    let keep = store.create_event(workshop(2)).await.unwrap();

    let gone = book(&store, event.slots[0].slot.id, &requester("Alice")).await;
    let kept = book(&store, keep.slots[0].slot.id, &requester("Alice")).await;

    assert!(store.delete_event(event.event.id).await.unwrap());
    assert!(!store.delete_event(event.event.id).await.unwrap());

    assert!(store.get_event(event.event.id).await.unwrap().is_none());
    assert!(store.get_booking(gone.id).await.unwrap().is_none());
    assert!(store.get_booking(kept.id).await.unwrap().is_some());
    assert!(
        store
            .begin_slot_unit(event.slots[0].slot.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[serial]
async fn test_delete_slot() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(2)).await.unwrap();
    let other = store.create_event(workshop(2)).await.unwrap();
    let slot_id = event.slots[0].slot.id;
    let booking = book(&store, slot_id, &requester("Alice")).await;

    assert!(!store.delete_slot(other.event.id, slot_id).await.unwrap());
    assert!(store.delete_slot(event.event.id, slot_id).await.unwrap());

    assert!(store.get_booking(booking.id).await.unwrap().is_none());
    let detail = store.get_event_detail(event.event.id).await.unwrap().unwrap();
    assert_eq!(detail.slots.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_bookings_for_requester() {
    let store = get_test_store().await;
    let a = store.create_event(workshop(2)).await.unwrap();
    let b = store.create_event(workshop(2)).await.unwrap();
    let alice = requester("Alice");

    book(&store, a.slots[0].slot.id, &alice).await;
    book(&store, b.slots[1].slot.id, &alice).await;
    book(&store, b.slots[1].slot.id, &requester("Bob")).await;

    let email = Email::parse("ALICE@example.com").unwrap();
    let bookings = store.bookings_for_requester(&email).await.unwrap();
    assert_eq!(bookings.len(), 2);
    assert!(bookings.iter().all(|b| b.requester.email == alice.email));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_units_never_overbook() {
    let store = get_test_store().await;
    let event = store.create_event(workshop(3)).await.unwrap();
    let slot_id = event.slots[0].slot.id;

    let tasks = (0..10).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            let who = requester(&format!("user{i}"));
            let mut unit = store.begin_slot_unit(slot_id).await?.unwrap();
            let ledger = unit.ledger(&who.email).await?;
            if ledger.occupancy >= unit.info().capacity {
                return Ok::<bool, StoreError>(false);
            }
            unit.insert_booking(&who).await?;
            unit.commit().await?;
            Ok(true)
        })
    });

    let admitted = futures_util::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(true))))
        .count();

    assert_eq!(admitted, 3);
    let detail = store.get_event_detail(event.event.id).await.unwrap().unwrap();
    assert_eq!(detail.slots[0].occupancy(), 3);
}
