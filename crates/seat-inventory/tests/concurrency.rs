//! Concurrent hold behaviour across many tasks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{BookingId, ScheduleId};
use domain::{Money, Schedule, SeatLayout, SeatNumber};
use seat_inventory::{InventoryError, SeatInventory};

fn schedule(layout: SeatLayout) -> Schedule {
    Schedule::new(
        ScheduleId::new(),
        layout,
        Money::new(500),
        Utc::now() + Duration::hours(2),
    )
}

fn seats(numbers: &[u16]) -> BTreeSet<SeatNumber> {
    numbers.iter().copied().map(SeatNumber::new).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_holds_only_one_wins() {
    let inventory = Arc::new(SeatInventory::default());
    let schedule = schedule(SeatLayout::Fourteen);

    let requests = [seats(&[3, 4]), seats(&[4, 5])];
    let mut handles = Vec::new();
    for request in requests {
        let inventory = inventory.clone();
        let schedule = schedule.clone();
        handles.push(tokio::spawn(async move {
            inventory
                .hold_seats(&schedule, &request, BookingId::new(), Duration::seconds(300))
                .await
        }));
    }

    let mut granted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(InventoryError::SeatUnavailable { seats, .. }) => {
                assert_eq!(seats, vec![SeatNumber::new(4)]);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(rejected, 1);

    let free = inventory.availability(&schedule).await;
    assert!(!free.contains(&SeatNumber::new(4)));
    assert_eq!(free.len(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_contention_never_oversells_capacity() {
    let inventory = Arc::new(SeatInventory::default());
    let schedule = schedule(SeatLayout::TwentyFive);

    // 100 tasks fight over pairs of seats on a 25-seat layout
    let mut handles = Vec::new();
    for i in 0..100u16 {
        let inventory = inventory.clone();
        let schedule = schedule.clone();
        let first = i % 25 + 1;
        let second = (i + 7) % 25 + 1;
        handles.push(tokio::spawn(async move {
            let booking_id = BookingId::new();
            let result = inventory
                .hold_seats(
                    &schedule,
                    &seats(&[first, second]),
                    booking_id,
                    Duration::seconds(300),
                )
                .await;
            if let Ok(token) = &result
                && i % 2 == 0
            {
                inventory.finalize(token).await.unwrap();
            }
            result.map(|token| token.seats)
        }));
    }

    let mut sold: Vec<SeatNumber> = Vec::new();
    for handle in handles {
        if let Ok(granted) = handle.await.unwrap() {
            sold.extend(granted);
        }
    }

    let unique: BTreeSet<_> = sold.iter().copied().collect();
    assert_eq!(unique.len(), sold.len(), "a seat was sold twice");

    let stats = inventory.stats(&schedule).await;
    assert!(stats.held + stats.allocated <= usize::from(stats.capacity));
    assert_eq!(stats.held + stats.allocated, sold.len());
    assert_eq!(
        inventory.availability(&schedule).await.len(),
        25 - sold.len()
    );
}

#[tokio::test]
async fn test_different_schedules_do_not_interfere() {
    let inventory = SeatInventory::default();
    let morning = schedule(SeatLayout::Fourteen);
    let evening = schedule(SeatLayout::Fourteen);

    inventory
        .hold_seats(&morning, &seats(&[1]), BookingId::new(), Duration::seconds(60))
        .await
        .unwrap();
    inventory
        .hold_seats(&evening, &seats(&[1]), BookingId::new(), Duration::seconds(60))
        .await
        .unwrap();

    assert_eq!(inventory.availability(&morning).await.len(), 13);
    assert_eq!(inventory.availability(&evening).await.len(), 13);
}
