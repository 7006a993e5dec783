//! Item availability controller
//!
//! Keeps an item's status in lockstep with its active exchange request.
//! Transitions are staged into the caller's batch so the item and request
//! writes commit together; the standalone forms re-apply a status on their
//! own and are safe to retry.

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::item::{Item, ItemPatch, ItemStatus},
    repository::{Batch, Precondition, Repository},
};

#[derive(Clone)]
pub struct AvailabilityController {
    repository: Repository,
}

impl AvailabilityController {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Stage Available -> Pending.
    ///
    /// Commits only if the item is still Available, which keeps a single
    /// accepted request per item.
    pub fn stage_request_accepted(&self, batch: &mut Batch, item_id: Uuid) {
        let still_available: Precondition<Item> =
            Box::new(|item| item.status == ItemStatus::Available);
        batch.update::<Item>(
            item_id,
            ItemPatch::SetStatus(ItemStatus::Pending),
            Some(still_available),
        );
    }

    /// Stage -> Completed. A deleted item does not block completion.
    pub fn stage_exchange_completed(&self, batch: &mut Batch, item_id: Uuid) {
        batch.update_if_exists::<Item>(item_id, ItemPatch::SetStatus(ItemStatus::Completed), None);
    }

    /// Set the item Pending on its own; never reverts a Completed item
    pub async fn on_request_accepted(&self, item_id: Uuid) -> AppResult<()> {
        let not_completed: Precondition<Item> =
            Box::new(|item| item.status != ItemStatus::Completed);
        self.repository
            .items
            .update(item_id, ItemPatch::SetStatus(ItemStatus::Pending), Some(not_completed))
            .await?;
        tracing::debug!("Item {} marked pending", item_id);
        Ok(())
    }

    /// Set the item Completed on its own
    pub async fn on_exchange_completed(&self, item_id: Uuid) -> AppResult<()> {
        self.repository
            .items
            .update(item_id, ItemPatch::SetStatus(ItemStatus::Completed), None)
            .await?;
        tracing::debug!("Item {} marked completed", item_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{Category, Condition, ListingType};
    use chrono::Utc;

    async fn seed_item(repository: &Repository, status: ItemStatus) -> Uuid {
        repository
            .items
            .create(Item {
                id: Uuid::new_v4(),
                name: "Chess set".to_string(),
                category: Category::Games,
                condition: Condition::Good,
                listing_type: ListingType::Exchange,
                image_url: None,
                owner_id: Uuid::new_v4(),
                status,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn setting_same_status_twice_is_safe() {
        let repository = Repository::in_memory();
        let controller = AvailabilityController::new(repository.clone());
        let item_id = seed_item(&repository, ItemStatus::Available).await;

        controller.on_request_accepted(item_id).await.unwrap();
        controller.on_request_accepted(item_id).await.unwrap();
        assert_eq!(repository.items.get(item_id).await.unwrap().status, ItemStatus::Pending);

        controller.on_exchange_completed(item_id).await.unwrap();
        controller.on_exchange_completed(item_id).await.unwrap();
        assert_eq!(repository.items.get(item_id).await.unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn completed_item_is_never_reverted() {
        let repository = Repository::in_memory();
        let controller = AvailabilityController::new(repository.clone());
        let item_id = seed_item(&repository, ItemStatus::Completed).await;

        let err = controller.on_request_accepted(item_id).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repository.items.get(item_id).await.unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn staged_accept_requires_available_item() {
        let repository = Repository::in_memory();
        let controller = AvailabilityController::new(repository.clone());
        let item_id = seed_item(&repository, ItemStatus::Pending).await;

        let mut batch = Batch::new();
        controller.stage_request_accepted(&mut batch, item_id);
        assert!(repository.commit(batch).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn staged_completion_tolerates_deleted_item() {
        let repository = Repository::in_memory();
        let controller = AvailabilityController::new(repository.clone());

        let mut batch = Batch::new();
        controller.stage_exchange_completed(&mut batch, Uuid::new_v4());
        repository.commit(batch).await.unwrap();
    }
}
