//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p booking-store --test postgres_integration -- --test-threads=1
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use booking_store::{BookingStore, PostgresBookingStore, RecordOutcome, StoreError};
use chrono::{Duration, Utc};
use common::{BookingId, HoldId, ScheduleId};
use domain::{
    Actor, Booking, BookingStatus, CallbackStatus, CustomerId, HoldToken, Money, NewBooking,
    PaymentMethod, PaymentTransaction, ReconciliationCase, ReconciliationReason, Schedule,
    SeatLayout, SeatNumber,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
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

            sqlx::raw_sql(include_str!("../../../migrations/001_create_bookings.sql"))
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresBookingStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE reconciliation_cases, payment_transactions, booking_history, bookings",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresBookingStore::new(pool)
}

fn make_booking() -> Booking {
    let now = Utc::now();
    let schedule = Schedule::new(
        ScheduleId::new(),
        SeatLayout::TwentyFive,
        Money::new(500),
        now + Duration::hours(4),
    );
    let booking_id = BookingId::new();
    let seats: BTreeSet<_> = [4, 5].into_iter().map(SeatNumber::new).collect();
    let hold = HoldToken {
        hold_id: HoldId::new(),
        schedule_id: schedule.schedule_id,
        holder: booking_id,
        seats: seats.clone(),
        expires_at: now + Duration::seconds(300),
    };
    Booking::create(
        NewBooking {
            booking_id,
            customer_id: CustomerId::new("cust-42"),
            seats,
            payment_method: PaymentMethod::Mpesa,
            notes: Some("window seats".to_string()),
        },
        &schedule,
        hold,
        now,
    )
    .unwrap()
}

#[tokio::test]
#[serial]
async fn insert_and_load_booking() {
    let store = get_test_store().await;
    let booking = make_booking();

    store.insert_booking(&booking).await.unwrap();

    let loaded = store.get_booking(booking.booking_id()).await.unwrap();
    assert_eq!(loaded.as_ref(), Some(&booking));

    let by_ref = store.find_by_reference(booking.reference()).await.unwrap();
    assert_eq!(by_ref.map(|b| b.booking_id()), Some(booking.booking_id()));
}

#[tokio::test]
#[serial]
async fn insert_duplicate_booking_fails() {
    let store = get_test_store().await;
    let booking = make_booking();

    store.insert_booking(&booking).await.unwrap();
    let result = store.insert_booking(&booking).await;
    assert!(matches!(result, Err(StoreError::DuplicateBooking(_))));
}

#[tokio::test]
#[serial]
async fn transition_persists_booking_and_history() {
    let store = get_test_store().await;
    let mut booking = make_booking();
    store.insert_booking(&booking).await.unwrap();

    let expected = booking.version();
    let event = booking.request_payment("ws_CO_77", Utc::now()).unwrap();
    let entry = booking.apply(event);
    store
        .save_transition(&booking, expected, &entry)
        .await
        .unwrap();

    let expected = booking.version();
    let event = booking
        .cancel("plans changed", &Actor::customer("cust-42"), Utc::now())
        .unwrap();
    let entry = booking.apply(event);
    store
        .save_transition(&booking, expected, &entry)
        .await
        .unwrap();

    let loaded = store
        .get_booking(booking.booking_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status(), BookingStatus::Cancelled);
    assert_eq!(loaded.version(), booking.version());

    let found = store.find_by_payment_ref("ws_CO_77").await.unwrap();
    assert!(found.is_some());

    let history = store.history(booking.booking_id()).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event.event_type(), "PaymentRequested");
    assert_eq!(history[1].from, BookingStatus::PendingPayment);
    assert_eq!(history[1].to, BookingStatus::Cancelled);
}

#[tokio::test]
#[serial]
async fn stale_version_is_a_concurrency_conflict() {
    let store = get_test_store().await;
    let mut booking = make_booking();
    store.insert_booking(&booking).await.unwrap();

    let stale = booking.version();
    let event = booking.fail_payment("declined", Utc::now()).unwrap();
    let entry = booking.apply(event);
    store.save_transition(&booking, stale, &entry).await.unwrap();

    let result = store.save_transition(&booking, stale, &entry).await;
    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn pending_created_before_cutoff() {
    let store = get_test_store().await;
    let booking = make_booking();
    store.insert_booking(&booking).await.unwrap();

    let none = store
        .pending_created_before(booking.created_at())
        .await
        .unwrap();
    assert!(none.is_empty());

    let some = store
        .pending_created_before(booking.created_at() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(some.len(), 1);

    let pending = store
        .list_by_status(BookingStatus::PendingPayment)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
#[serial]
async fn duplicate_external_ref_is_recorded_once() {
    let store = get_test_store().await;
    let booking = make_booking();
    store.insert_booking(&booking).await.unwrap();

    let first = PaymentTransaction::new(
        booking.booking_id(),
        "XYZ123",
        Money::new(1000),
        CallbackStatus::Success,
        Utc::now(),
    );
    let redelivery = PaymentTransaction::new(
        booking.booking_id(),
        "XYZ123",
        Money::new(1000),
        CallbackStatus::Success,
        Utc::now(),
    );

    let outcome = store.record_transaction(&first).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Inserted);

    let outcome = store.record_transaction(&redelivery).await.unwrap();
    match outcome {
        RecordOutcome::Duplicate(existing) => {
            assert_eq!(existing.transaction_id, first.transaction_id);
        }
        RecordOutcome::Inserted => panic!("redelivery must not insert"),
    }

    let all = store
        .transactions_for_booking(booking.booking_id())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
#[serial]
async fn discarded_transaction_can_be_recorded_again() {
    let store = get_test_store().await;
    let booking = make_booking();
    store.insert_booking(&booking).await.unwrap();

    let tx = PaymentTransaction::new(
        booking.booking_id(),
        "XYZ123",
        Money::new(1000),
        CallbackStatus::Success,
        Utc::now(),
    );

    assert!(store.record_transaction(&tx).await.unwrap().is_inserted());
    store.discard_transaction("XYZ123").await.unwrap();
    assert!(store.find_transaction("XYZ123").await.unwrap().is_none());
    assert!(store.record_transaction(&tx).await.unwrap().is_inserted());
}

#[tokio::test]
#[serial]
async fn reconciliation_cases_roundtrip() {
    let store = get_test_store().await;
    let case = ReconciliationCase::open(
        BookingId::new(),
        Some("ABC".to_string()),
        Money::new(900),
        ReconciliationReason::PaymentMismatch {
            expected: Money::new(1000),
            received: Money::new(900),
        },
        Utc::now(),
    );

    store.open_case(&case).await.unwrap();

    let cases = store.reconciliation_cases().await.unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].case_id, case.case_id);
    assert_eq!(cases[0].reason, case.reason);
}
