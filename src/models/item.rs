//! Catalog item model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::repository::{CollectionName, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Books,
    Games,
    Sports,
    #[serde(rename = "Turf Slots")]
    TurfSlots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Condition {
    New,
    #[serde(rename = "Like New")]
    LikeNew,
    Good,
    Fair,
    Poor,
}

/// How the owner offers the item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ListingType {
    Sell,
    Rent,
    Exchange,
    Free,
}

/// Availability of an item, mirrored from its active request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ItemStatus {
    Available,
    Pending,
    Completed,
}

/// Catalog item record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub condition: Condition,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ItemPatch {
    SetStatus(ItemStatus),
}

impl Record for Item {
    const COLLECTION: CollectionName = CollectionName::Items;
    type Patch = ItemPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, patch: ItemPatch) {
        match patch {
            ItemPatch::SetStatus(status) => self.status = status,
        }
    }
}

/// Create item request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    pub category: Category,
    pub condition: Condition,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[validate(length(max = 2048, message = "Image URL is too long"))]
    pub image_url: Option<String>,
}

/// Item listing filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ItemQuery {
    /// Restrict to one category
    pub category: Option<Category>,
}
