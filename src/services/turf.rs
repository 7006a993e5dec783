//! Turf slot scheduler

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::users;
use crate::{
    config::TurfConfig,
    error::{AppError, AppResult},
    models::{
        turf::{
            BookingStatus, CreateBooking, SlotAvailability, SlotKey, TurfBooking,
            TurfBookingPatch, TurfCatalog,
        },
        user::Actor,
    },
    repository::{Repository, Subscription},
};

#[derive(Clone)]
pub struct TurfService {
    repository: Repository,
    turfs: Arc<Vec<String>>,
    slots: Arc<Vec<String>>,
}

impl TurfService {
    pub fn new(repository: Repository, config: &TurfConfig) -> Self {
        Self {
            repository,
            turfs: Arc::new(config.turfs.clone()),
            slots: Arc::new(config.slots.clone()),
        }
    }

    pub fn catalog(&self) -> TurfCatalog {
        TurfCatalog {
            turfs: self.turfs.to_vec(),
            slots: self.slots.to_vec(),
        }
    }

    fn slot_taken(key: &SlotKey) -> AppError {
        AppError::SlotAlreadyBooked {
            turf: key.turf_name.clone(),
            date: key.date,
            slot: key.slot.clone(),
        }
    }

    fn require_turf(&self, turf_name: &str) -> AppResult<()> {
        if self.turfs.iter().any(|t| t == turf_name) {
            Ok(())
        } else {
            Err(AppError::Validation(format!("Unknown turf: {}", turf_name)))
        }
    }

    /// Confirmed bookings on a day
    async fn confirmed_on(&self, date: NaiveDate) -> AppResult<Vec<TurfBooking>> {
        self.repository
            .bookings
            .list(Arc::new(move |b: &TurfBooking| b.is_confirmed() && b.date == date))
            .await
    }

    /// The confirmed booking holding a slot, if any
    pub async fn booking_for(&self, key: &SlotKey) -> AppResult<Option<TurfBooking>> {
        let wanted = key.clone();
        let mut holders = self
            .repository
            .bookings
            .list(Arc::new(move |b: &TurfBooking| b.holds(&wanted)))
            .await?;
        Ok(holders.pop())
    }

    pub async fn is_booked(&self, key: &SlotKey) -> AppResult<bool> {
        Ok(self.booking_for(key).await?.is_some())
    }

    /// Book a slot for the actor.
    ///
    /// The availability check here is only a fast path: the store's slot
    /// claim decides between racing bookers, and the loser gets
    /// `SlotAlreadyBooked`.
    pub async fn book(&self, actor: &Actor, booking: CreateBooking) -> AppResult<TurfBooking> {
        self.require_turf(&booking.turf_name)?;
        if !self.slots.iter().any(|s| *s == booking.slot) {
            return Err(AppError::Validation(format!("Unknown slot: {}", booking.slot)));
        }
        let purpose = booking.purpose.trim();
        if purpose.is_empty() {
            return Err(AppError::Validation("Purpose is required".to_string()));
        }
        if booking.date < Utc::now().date_naive() {
            return Err(AppError::Validation("Cannot book a date in the past".to_string()));
        }

        let key = booking.key();
        if self.is_booked(&key).await? {
            return Err(Self::slot_taken(&key));
        }

        let user_name = users::display_name(&self.repository, actor.user_id).await?;
        let record = TurfBooking {
            id: Uuid::new_v4(),
            turf_name: key.turf_name.clone(),
            date: key.date,
            slot: key.slot.clone(),
            purpose: purpose.to_string(),
            user_id: actor.user_id,
            user_name,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };

        match self.repository.bookings.create(record.clone()).await {
            Ok(_) => {
                tracing::info!(
                    "{} booked {} on {} at {}",
                    actor.user_id,
                    key.turf_name,
                    key.date,
                    key.slot
                );
                Ok(record)
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!("Lost booking race for {}", key.claim());
                Err(Self::slot_taken(&key))
            }
            Err(e) => Err(e),
        }
    }

    /// Admin cancellation; the slot is free again immediately
    pub async fn cancel(&self, actor: &Actor, booking_id: Uuid) -> AppResult<TurfBooking> {
        actor.require_admin()?;
        let booking = self.repository.bookings.get(booking_id).await?;
        if !booking.is_confirmed() {
            return Ok(booking);
        }
        let cancelled = self
            .repository
            .bookings
            .update(booking_id, TurfBookingPatch::Cancel, None)
            .await?;
        tracing::info!("Booking {} cancelled by {}", booking_id, actor.user_id);
        Ok(cancelled)
    }

    /// The actor's active bookings. Each call reads afresh.
    pub async fn my_bookings(
        &self,
        actor: &Actor,
    ) -> AppResult<tokio_stream::Iter<std::vec::IntoIter<TurfBooking>>> {
        let user_id = actor.user_id;
        let bookings = self
            .repository
            .bookings
            .list(Arc::new(move |b: &TurfBooking| b.user_id == user_id && b.is_confirmed()))
            .await?;
        Ok(tokio_stream::iter(bookings))
    }

    /// Every active booking, newest first
    pub async fn all_bookings(&self, actor: &Actor) -> AppResult<Vec<TurfBooking>> {
        actor.require_admin()?;
        let mut bookings = self
            .repository
            .bookings
            .list(Arc::new(|b: &TurfBooking| b.is_confirmed()))
            .await?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    /// Occupancy of every turf and slot on a day, in catalog order
    pub async fn day_availability(&self, date: NaiveDate) -> AppResult<Vec<SlotAvailability>> {
        let booked = self.confirmed_on(date).await?;
        let mut grid = Vec::with_capacity(self.turfs.len() * self.slots.len());
        for turf in self.turfs.iter() {
            for slot in self.slots.iter() {
                let holder = booked
                    .iter()
                    .find(|b| &b.turf_name == turf && &b.slot == slot);
                grid.push(SlotAvailability {
                    turf_name: turf.clone(),
                    slot: slot.clone(),
                    booked: holder.is_some(),
                    booked_by: holder.map(|b| b.user_name.clone()),
                });
            }
        }
        Ok(grid)
    }

    pub async fn turf_availability(
        &self,
        turf_name: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<SlotAvailability>> {
        self.require_turf(turf_name)?;
        let mut grid = self.day_availability(date).await?;
        grid.retain(|entry| entry.turf_name == turf_name);
        Ok(grid)
    }

    /// Live snapshots of the confirmed bookings on a day
    pub fn watch_day(&self, date: NaiveDate) -> Subscription<TurfBooking> {
        self.repository
            .bookings
            .subscribe(Arc::new(move |b: &TurfBooking| b.is_confirmed() && b.date == date))
    }
}
