//! Turf booking models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::repository::{CollectionName, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// A bookable unit: one slot of one turf on one day
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    pub turf_name: String,
    pub date: NaiveDate,
    pub slot: String,
}

impl SlotKey {
    pub fn new(turf_name: impl Into<String>, date: NaiveDate, slot: impl Into<String>) -> Self {
        Self {
            turf_name: turf_name.into(),
            date,
            slot: slot.into(),
        }
    }

    /// Store-level uniqueness claim for the key
    pub fn claim(&self) -> String {
        format!("{}|{}|{}", self.turf_name, self.date, self.slot)
    }
}

/// Turf booking record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurfBooking {
    pub id: Uuid,
    pub turf_name: String,
    pub date: NaiveDate,
    pub slot: String,
    pub purpose: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl TurfBooking {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.turf_name.clone(), self.date, self.slot.clone())
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn holds(&self, key: &SlotKey) -> bool {
        self.is_confirmed()
            && self.turf_name == key.turf_name
            && self.date == key.date
            && self.slot == key.slot
    }
}

#[derive(Debug, Clone)]
pub enum TurfBookingPatch {
    Cancel,
}

impl Record for TurfBooking {
    const COLLECTION: CollectionName = CollectionName::TurfBookings;
    type Patch = TurfBookingPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, patch: TurfBookingPatch) {
        match patch {
            TurfBookingPatch::Cancel => self.status = BookingStatus::Cancelled,
        }
    }

    // Only confirmed bookings occupy their slot
    fn claim(&self) -> Option<String> {
        self.is_confirmed().then(|| self.key().claim())
    }
}

/// Booking request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    pub turf_name: String,
    /// Date (YYYY-MM-DD)
    pub date: NaiveDate,
    pub slot: String,
    pub purpose: String,
}

impl CreateBooking {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.turf_name.clone(), self.date, self.slot.clone())
    }
}

/// Occupancy of one slot
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub turf_name: String,
    pub slot: String,
    pub booked: bool,
    /// Name of the booker when booked
    pub booked_by: Option<String>,
}

/// Fixed turfs and slots offered for booking
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurfCatalog {
    pub turfs: Vec<String>,
    pub slots: Vec<String>,
}

/// Query parameters for availability views
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Day to inspect (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Restrict to one turf
    pub turf_name: Option<String>,
}
