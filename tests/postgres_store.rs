//! Postgres store tests
//!
//! These need a reachable database:
//! DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored

use std::sync::Arc;

use campus_swap_server::{
    config::{AppConfig, DatabaseConfig},
    error::AppError,
    models::{
        item::{Category, Condition, Item, ItemPatch, ItemStatus, ListingType},
        turf::{BookingStatus, CreateBooking, SlotKey},
        user::{Actor, Role},
    },
    repository::{postgres, Batch, PgStore, Precondition, Repository},
    services::Services,
};
use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use sqlx::{Pool, Postgres};
use tokio_test::assert_ok;
use uuid::Uuid;

const SLOT: &str = "4:00 PM – 5:00 PM";

async fn database() -> Option<Pool<Postgres>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let config = DatabaseConfig {
        url,
        ..DatabaseConfig::default()
    };
    Some(postgres::connect(&config).await.expect("Failed to connect"))
}

fn repository(pool: &Pool<Postgres>) -> Repository {
    Repository::new(Arc::new(PgStore::new(pool.clone())))
}

/// A future day no earlier run has touched
fn fresh_date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(rand::thread_rng().gen_range(1_000..100_000))
}

fn booking(date: NaiveDate) -> CreateBooking {
    CreateBooking {
        turf_name: "Turf B".to_string(),
        date,
        slot: SLOT.to_string(),
        purpose: "League match".to_string(),
    }
}

fn item(owner_id: Uuid) -> Item {
    Item {
        id: Uuid::new_v4(),
        name: "Drawing board".to_string(),
        category: Category::Books,
        condition: Condition::Fair,
        listing_type: ListingType::Rent,
        image_url: None,
        owner_id,
        status: ItemStatus::Available,
        created_at: Utc::now(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_bookers_leave_one_confirmed_booking() {
    let Some(pool) = database().await else { return };
    let services = Arc::new(Services::new(repository(&pool), &AppConfig::default()));
    let date = fresh_date();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let services = services.clone();
            let actor = Actor::student(Uuid::new_v4());
            tokio::spawn(async move { services.turf.book(&actor, booking(date)).await })
        })
        .collect();

    let mut won = Vec::new();
    let mut lost = 0;
    for handle in handles {
        match handle.await.expect("booking task panicked") {
            Ok(booking) => won.push(booking),
            Err(AppError::SlotAlreadyBooked { .. }) => lost += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(won.len(), 1);
    assert_eq!(lost, 7);

    let key = SlotKey::new("Turf B", date, SLOT);
    let holder = assert_ok!(services.turf.booking_for(&key).await).expect("slot is held");
    assert_eq!(holder.id, won[0].id);
    assert_eq!(holder.status, BookingStatus::Confirmed);

    let claimed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents WHERE collection = 'turf_bookings' AND claim = $1",
    )
    .bind(key.claim())
    .fetch_one(&pool)
    .await
    .expect("Failed to count claims");
    assert_eq!(claimed, 1);
}

#[tokio::test]
#[ignore]
async fn failed_precondition_rolls_back_whole_batch() {
    let Some(pool) = database().await else { return };
    let repository = repository(&pool);
    let owner = Uuid::new_v4();
    let first = assert_ok!(repository.items.create(item(owner)).await);
    let second = assert_ok!(repository.items.create(item(owner)).await);

    let never: Precondition<Item> = Box::new(|item| item.status == ItemStatus::Completed);
    let mut batch = Batch::new();
    batch
        .update::<Item>(first, ItemPatch::SetStatus(ItemStatus::Pending), None)
        .update::<Item>(second, ItemPatch::SetStatus(ItemStatus::Pending), Some(never));

    let err = repository.commit(batch).await.unwrap_err();
    assert!(err.is_conflict());

    // The first write ran inside the transaction but never became visible
    let first = assert_ok!(repository.items.get(first).await);
    let second = assert_ok!(repository.items.get(second).await);
    assert_eq!(first.status, ItemStatus::Available);
    assert_eq!(second.status, ItemStatus::Available);
}

#[tokio::test]
#[ignore]
async fn cancelled_booking_releases_claim() {
    let Some(pool) = database().await else { return };
    let services = Services::new(repository(&pool), &AppConfig::default());
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let date = fresh_date();

    let held = assert_ok!(services.turf.book(&Actor::student(Uuid::new_v4()), booking(date)).await);
    assert_ok!(services.turf.cancel(&admin, held.id).await);

    let claim: Option<String> = sqlx::query_scalar("SELECT claim FROM documents WHERE id = $1")
        .bind(held.id)
        .fetch_one(&pool)
        .await
        .expect("Failed to read claim");
    assert!(claim.is_none());

    let rebooked = assert_ok!(services.turf.book(&Actor::student(Uuid::new_v4()), booking(date)).await);
    assert_eq!(rebooked.status, BookingStatus::Confirmed);
}

#[tokio::test]
#[ignore]
async fn connections_carry_statement_timeout() {
    let Some(pool) = database().await else { return };

    let timeout: String = sqlx::query_scalar("SHOW statement_timeout")
        .fetch_one(&pool)
        .await
        .expect("Failed to read setting");
    assert_eq!(timeout, "10s");

    let err = sqlx::query("SELECT pg_sleep(30)").execute(&pool).await.unwrap_err();
    assert!(err.to_string().contains("statement timeout"));
}
