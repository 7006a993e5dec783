//! Item catalog service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item, ItemQuery, ItemStatus},
        user::Actor,
    },
    repository::{Filter, Repository, Subscription},
};

fn matching(query: &ItemQuery) -> Filter<Item> {
    let category = query.category;
    Arc::new(move |item: &Item| category.map_or(true, |c| item.category == c))
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List an item for exchange; it starts out Available
    pub async fn create_item(&self, actor: &Actor, item: CreateItem) -> AppResult<Item> {
        item.validate()?;
        let name = item.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Item name is required".to_string()));
        }

        let record = Item {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: item.category,
            condition: item.condition,
            listing_type: item.listing_type,
            image_url: item.image_url.filter(|url| !url.trim().is_empty()),
            owner_id: actor.user_id,
            status: ItemStatus::Available,
            created_at: Utc::now(),
        };
        self.repository.items.create(record.clone()).await?;

        tracing::info!("Item {} listed by {}", record.id, actor.user_id);
        Ok(record)
    }

    /// Items matching the query, newest first
    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<Item>> {
        let mut items = self.repository.items.list(matching(query)).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<Item> {
        self.repository.items.get(id).await
    }

    /// Items listed by one owner, newest first
    pub async fn items_of(&self, owner_id: Uuid) -> AppResult<Vec<Item>> {
        let mut items = self
            .repository
            .items
            .list(Arc::new(move |item: &Item| item.owner_id == owner_id))
            .await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Remove an item. Owner or admin only.
    pub async fn delete_item(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let item = self.repository.items.get(id).await?;
        if item.owner_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::Unauthorized("Only the owner can remove this item".to_string()));
        }
        // Active requests on the item are left as they are
        self.repository.items.delete(id).await?;
        tracing::info!("Item {} removed by {}", id, actor.user_id);
        Ok(())
    }

    /// Live snapshots of the items matching `query`
    pub fn watch_items(&self, query: &ItemQuery) -> Subscription<Item> {
        self.repository.items.subscribe(matching(query))
    }
}
