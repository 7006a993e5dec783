//! Turf booking under contention

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use campus_swap_server::{
    config::AppConfig,
    error::AppError,
    models::{
        turf::{CreateBooking, SlotKey},
        user::{Actor, CreateProfile, Role},
    },
    repository::Repository,
    services::Services,
};
use tokio_stream::StreamExt;
use tokio_test::assert_ok;
use uuid::Uuid;

const SLOT: &str = "3:00 PM – 4:00 PM";

fn next_week() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(7)
}

fn booking(purpose: &str) -> CreateBooking {
    CreateBooking {
        turf_name: "Turf A".to_string(),
        date: next_week(),
        slot: SLOT.to_string(),
        purpose: purpose.to_string(),
    }
}

async fn member(services: &Services, n: usize) -> Actor {
    let actor = Actor::student(Uuid::new_v4());
    let profile = CreateProfile {
        name: format!("Player {}", n),
        age: 18,
        email: format!("player{}@campus.edu", n),
    };
    assert_ok!(services.users.register_profile(&actor, profile).await);
    actor
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_winner_among_concurrent_bookers() {
    let services = Arc::new(Services::new(Repository::in_memory(), &AppConfig::default()));

    let mut bookers = Vec::new();
    for n in 0..8 {
        bookers.push(member(&services, n).await);
    }

    let handles: Vec<_> = bookers
        .into_iter()
        .map(|actor| {
            let services = services.clone();
            tokio::spawn(async move { services.turf.book(&actor, booking("Five-a-side")).await })
        })
        .collect();

    let mut won = 0;
    let mut lost = 0;
    for handle in handles {
        match handle.await.expect("booking task panicked") {
            Ok(_) => won += 1,
            Err(AppError::SlotAlreadyBooked { turf, date, slot }) => {
                assert_eq!(turf, "Turf A");
                assert_eq!(date, next_week());
                assert_eq!(slot, SLOT);
                lost += 1;
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(lost, 7);

    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let all = assert_ok!(services.turf.all_bookings(&admin).await);
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn cancellation_frees_slot_for_others() {
    let services = Services::new(Repository::in_memory(), &AppConfig::default());
    let first = member(&services, 1).await;
    let second = member(&services, 2).await;
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let key = SlotKey::new("Turf A", next_week(), SLOT);

    let held = assert_ok!(services.turf.book(&first, booking("Practice")).await);
    let holder = assert_ok!(services.turf.booking_for(&key).await).expect("slot is held");
    assert_eq!(holder.id, held.id);

    assert!(matches!(
        services.turf.book(&second, booking("Match")).await,
        Err(AppError::SlotAlreadyBooked { .. })
    ));

    assert_ok!(services.turf.cancel(&admin, held.id).await);
    let rebooked = assert_ok!(services.turf.book(&second, booking("Match")).await);

    let mine: Vec<_> = assert_ok!(services.turf.my_bookings(&second).await).collect().await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, rebooked.id);
    let theirs: Vec<_> = assert_ok!(services.turf.my_bookings(&first).await).collect().await;
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn day_watch_reflects_cancellation() {
    let services = Services::new(Repository::in_memory(), &AppConfig::default());
    let player = member(&services, 1).await;
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);

    let mut watch = services.turf.watch_day(next_week());
    assert_eq!(watch.next().await.map(|s| s.len()), Some(0));

    let held = assert_ok!(services.turf.book(&player, booking("Practice")).await);
    assert_eq!(watch.next().await.map(|s| s.len()), Some(1));

    assert_ok!(services.turf.cancel(&admin, held.id).await);
    assert_eq!(watch.next().await.map(|s| s.len()), Some(0));
}
