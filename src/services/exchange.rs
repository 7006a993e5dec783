//! Exchange request state machine
//!
//! `Pending -> Accepted -> Completed`, with `Pending -> Rejected` as the
//! alternate terminal edge. Every transition is a conditional write against
//! the state the decision was made on; when another actor changes the request
//! first, the transition is re-evaluated from a fresh read.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use super::{availability::AvailabilityController, users};
use crate::{
    config::ExchangeConfig,
    error::{AppError, AppResult},
    models::{
        item::ItemStatus,
        request::{ExchangeRequest, RequestPatch, RequestStatus},
        user::{Actor, User, UserPatch},
    },
    repository::{Batch, Precondition, Record, Repository},
};

/// Six random decimal digits
fn generate_meeting_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Only commit if nothing the state machine tracks changed since `observed`
fn unchanged_since(observed: &ExchangeRequest) -> Precondition<ExchangeRequest> {
    let observed = observed.clone();
    Box::new(move |current| current.same_state(&observed))
}

fn require_status(request: &ExchangeRequest, expected: RequestStatus) -> AppResult<()> {
    if request.status == expected {
        Ok(())
    } else {
        Err(AppError::PreconditionFailed(format!(
            "Request {} is {:?}, expected {:?}",
            request.id, request.status, expected
        )))
    }
}

fn require_owner(request: &ExchangeRequest, actor: &Actor) -> AppResult<()> {
    if request.is_owner(actor.user_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Only the item owner can do this".to_string()))
    }
}

fn require_requester(request: &ExchangeRequest, actor: &Actor) -> AppResult<()> {
    if request.is_requester(actor.user_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Only the requester can do this".to_string()))
    }
}

fn newest_first(mut requests: Vec<ExchangeRequest>) -> Vec<ExchangeRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

#[derive(Clone)]
pub struct ExchangeService {
    repository: Repository,
    availability: AvailabilityController,
    safe_zones: Arc<Vec<String>>,
    max_conflict_retries: u32,
}

impl ExchangeService {
    pub fn new(repository: Repository, config: &ExchangeConfig) -> Self {
        Self {
            availability: AvailabilityController::new(repository.clone()),
            repository,
            safe_zones: Arc::new(config.safe_zones.clone()),
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Approved meetup locations
    pub fn safe_zones(&self) -> &[String] {
        &self.safe_zones
    }

    /// Run `attempt`, starting over from a fresh read when it loses a race
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_conflict() && retries < self.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!("{} lost a concurrent write, retry {}", operation, retries);
                }
                result => return result,
            }
        }
    }

    /// Request an item. Several pending requests may target the same item.
    pub async fn create(&self, actor: &Actor, item_id: Uuid) -> AppResult<ExchangeRequest> {
        let item = self.repository.items.get(item_id).await?;
        if item.owner_id == actor.user_id {
            return Err(AppError::Validation("You cannot request your own item".to_string()));
        }
        if item.status != ItemStatus::Available {
            return Err(AppError::PreconditionFailed(format!(
                "Item {} is not available",
                item_id
            )));
        }
        let requester_name = users::display_name(&self.repository, actor.user_id).await?;

        let request = ExchangeRequest {
            id: Uuid::new_v4(),
            item_id: item.id,
            item_name: item.name,
            requester_id: actor.user_id,
            requester_name,
            owner_id: item.owner_id,
            status: RequestStatus::Pending,
            safe_zone: None,
            meeting_code: None,
            owner_confirmed: false,
            requester_confirmed: false,
            rated: false,
            reported: false,
            report_reason: None,
            reported_by: None,
            created_at: Utc::now(),
        };
        self.repository.requests.create(request.clone()).await?;

        tracing::info!("Request {} created for item {} by {}", request.id, item_id, actor.user_id);
        Ok(request)
    }

    /// Owner accepts a pending request and picks a safe zone.
    ///
    /// The request and its item move together: the item goes Pending in the
    /// same commit, and only while it is still Available.
    pub async fn accept(
        &self,
        actor: &Actor,
        request_id: Uuid,
        safe_zone: &str,
    ) -> AppResult<ExchangeRequest> {
        let safe_zone = safe_zone.trim();
        if !self.safe_zones.iter().any(|zone| zone == safe_zone) {
            return Err(AppError::Validation(format!("Unknown safe zone: {}", safe_zone)));
        }

        let accepted = self
            .with_retries("accept", || self.try_accept(actor, request_id, safe_zone))
            .await?;
        tracing::info!("Request {} accepted at {}", request_id, safe_zone);
        Ok(accepted)
    }

    async fn try_accept(
        &self,
        actor: &Actor,
        request_id: Uuid,
        safe_zone: &str,
    ) -> AppResult<ExchangeRequest> {
        let mut request = self.repository.requests.get(request_id).await?;
        require_owner(&request, actor)?;
        require_status(&request, RequestStatus::Pending)?;

        let item = self.repository.items.get(request.item_id).await?;
        if item.status != ItemStatus::Available {
            return Err(AppError::PreconditionFailed(format!(
                "Item {} is no longer available",
                item.id
            )));
        }

        let patch = RequestPatch::Accept {
            safe_zone: safe_zone.to_string(),
            meeting_code: generate_meeting_code(),
        };
        let mut batch = Batch::new();
        batch.update::<ExchangeRequest>(request_id, patch.clone(), Some(unchanged_since(&request)));
        self.availability.stage_request_accepted(&mut batch, item.id);
        self.repository.commit(batch).await?;

        request.apply(patch);
        Ok(request)
    }

    /// Owner declines a pending request; the item stays Available
    pub async fn reject(&self, actor: &Actor, request_id: Uuid) -> AppResult<ExchangeRequest> {
        let rejected = self
            .with_retries("reject", move || async move {
                let request = self.repository.requests.get(request_id).await?;
                require_owner(&request, actor)?;
                require_status(&request, RequestStatus::Pending)?;
                self.repository
                    .requests
                    .update(request_id, RequestPatch::Reject, Some(unchanged_since(&request)))
                    .await
            })
            .await?;
        tracing::info!("Request {} rejected", request_id);
        Ok(rejected)
    }

    /// Requester confirms the hand-over
    pub async fn requester_confirm(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> AppResult<ExchangeRequest> {
        self.with_retries("requester confirm", move || async move {
            let request = self.repository.requests.get(request_id).await?;
            require_requester(&request, actor)?;
            require_status(&request, RequestStatus::Accepted)?;
            if request.requester_confirmed {
                return Ok(request);
            }
            self.confirm(request, RequestPatch::ConfirmRequester).await
        })
        .await
    }

    /// Owner enters the code shown by the requester.
    ///
    /// A wrong code changes nothing and may be retried freely.
    pub async fn verify_code(
        &self,
        actor: &Actor,
        request_id: Uuid,
        entered_code: &str,
    ) -> AppResult<ExchangeRequest> {
        self.with_retries("verify code", move || async move {
            let request = self.repository.requests.get(request_id).await?;
            require_owner(&request, actor)?;
            require_status(&request, RequestStatus::Accepted)?;
            if request.meeting_code.as_deref() != Some(entered_code) {
                tracing::debug!("Meeting code mismatch on request {}", request_id);
                return Err(AppError::CodeMismatch);
            }
            if request.owner_confirmed {
                return Ok(request);
            }
            self.confirm(request, RequestPatch::ConfirmOwner).await
        })
        .await
    }

    /// Record one side's confirmation; whichever side confirms second also
    /// completes the request and its item in the same commit.
    async fn confirm(
        &self,
        mut request: ExchangeRequest,
        patch: RequestPatch,
    ) -> AppResult<ExchangeRequest> {
        let mut batch = Batch::new();
        batch.update::<ExchangeRequest>(request.id, patch.clone(), Some(unchanged_since(&request)));
        request.apply(patch);
        if request.status == RequestStatus::Completed {
            self.availability.stage_exchange_completed(&mut batch, request.item_id);
        }
        self.repository.commit(batch).await?;

        if request.status == RequestStatus::Completed {
            tracing::info!("Exchange {} completed for item {}", request.id, request.item_id);
        }
        Ok(request)
    }

    /// Owner rates the requester once the exchange is complete
    pub async fn rate(&self, actor: &Actor, request_id: Uuid, stars: u8) -> AppResult<ExchangeRequest> {
        if !(1..=5).contains(&stars) {
            return Err(AppError::Validation("Rating must be between 1 and 5".to_string()));
        }

        let rated = self
            .with_retries("rate", move || async move {
                let mut request = self.repository.requests.get(request_id).await?;
                require_owner(&request, actor)?;
                require_status(&request, RequestStatus::Completed)?;
                if request.rated {
                    return Err(AppError::AlreadyRated);
                }

                let mut batch = Batch::new();
                batch
                    .update::<ExchangeRequest>(
                        request_id,
                        RequestPatch::MarkRated,
                        Some(unchanged_since(&request)),
                    )
                    .update::<User>(request.requester_id, UserPatch::AppendRating(stars), None);
                self.repository.commit(batch).await?;

                request.apply(RequestPatch::MarkRated);
                Ok(request)
            })
            .await?;
        tracing::info!("Request {} rated {} stars", request_id, stars);
        Ok(rated)
    }

    /// Flag an accepted exchange for admin review. Advisory only.
    pub async fn report(
        &self,
        actor: &Actor,
        request_id: Uuid,
        reason: &str,
    ) -> AppResult<ExchangeRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("A reason is required".to_string()));
        }

        let reported = self
            .with_retries("report", move || async move {
                let request = self.repository.requests.get(request_id).await?;
                if !request.is_party(actor.user_id) {
                    return Err(AppError::Unauthorized(
                        "Only parties to the exchange can report it".to_string(),
                    ));
                }
                require_status(&request, RequestStatus::Accepted)?;
                if request.reported {
                    return Err(AppError::PreconditionFailed(format!(
                        "Request {} was already reported",
                        request_id
                    )));
                }
                let patch = RequestPatch::Report {
                    reason: reason.to_string(),
                    reporter: actor.user_id,
                };
                self.repository
                    .requests
                    .update(request_id, patch, Some(unchanged_since(&request)))
                    .await
            })
            .await?;
        tracing::warn!("Request {} reported by {}", request_id, actor.user_id);
        Ok(reported)
    }

    /// Get a request visible to the actor
    pub async fn get(&self, actor: &Actor, request_id: Uuid) -> AppResult<ExchangeRequest> {
        let request = self.repository.requests.get(request_id).await?;
        if !request.is_party(actor.user_id) && !actor.is_admin() {
            return Err(AppError::Unauthorized("Not a party to this request".to_string()));
        }
        Ok(request)
    }

    /// Requests received on the actor's items
    pub async fn incoming(&self, actor: &Actor) -> AppResult<Vec<ExchangeRequest>> {
        let owner = actor.user_id;
        let requests = self
            .repository
            .requests
            .list(Arc::new(move |r: &ExchangeRequest| r.owner_id == owner))
            .await?;
        Ok(newest_first(requests))
    }

    /// Requests the actor has made
    pub async fn outgoing(&self, actor: &Actor) -> AppResult<Vec<ExchangeRequest>> {
        let requester = actor.user_id;
        let requests = self
            .repository
            .requests
            .list(Arc::new(move |r: &ExchangeRequest| r.requester_id == requester))
            .await?;
        Ok(newest_first(requests))
    }

    /// Admin review queue
    pub async fn reported_requests(&self, actor: &Actor) -> AppResult<Vec<ExchangeRequest>> {
        actor.require_admin()?;
        let requests = self
            .repository
            .requests
            .list(Arc::new(|r: &ExchangeRequest| r.reported))
            .await?;
        Ok(newest_first(requests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            item::{Category, Condition, Item, ListingType},
            user::Role,
        },
        repository::MockStore,
    };

    struct Fixture {
        repository: Repository,
        service: ExchangeService,
        owner: Actor,
        requester: Actor,
        item_id: Uuid,
    }

    async fn seed_user(repository: &Repository, name: &str) -> Actor {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age: 20,
            email: format!("{}@campus.edu", name.to_lowercase()),
            role: Role::Student,
            ratings: Vec::new(),
            created_at: Utc::now(),
        };
        repository.users.create(user.clone()).await.unwrap();
        Actor::student(user.id)
    }

    async fn fixture() -> Fixture {
        let repository = Repository::in_memory();
        let service = ExchangeService::new(repository.clone(), &ExchangeConfig::default());
        let owner = seed_user(&repository, "Asha").await;
        let requester = seed_user(&repository, "Ravi").await;
        let item_id = repository
            .items
            .create(Item {
                id: Uuid::new_v4(),
                name: "Calculus textbook".to_string(),
                category: Category::Books,
                condition: Condition::Good,
                listing_type: ListingType::Exchange,
                image_url: None,
                owner_id: owner.user_id,
                status: ItemStatus::Available,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        Fixture {
            repository,
            service,
            owner,
            requester,
            item_id,
        }
    }

    async fn item_status(f: &Fixture) -> ItemStatus {
        f.repository.items.get(f.item_id).await.unwrap().status
    }

    async fn accepted_request(f: &Fixture) -> ExchangeRequest {
        let request = f.service.create(&f.requester, f.item_id).await.unwrap();
        f.service
            .accept(&f.owner, request.id, "Library Entrance")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_exchange_completes_item() {
        let f = fixture().await;

        let request = f.service.create(&f.requester, f.item_id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(item_status(&f).await, ItemStatus::Available);

        let accepted = f
            .service
            .accept(&f.owner, request.id, "Library Entrance")
            .await
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(item_status(&f).await, ItemStatus::Pending);
        let code = accepted.meeting_code.clone().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        f.service.requester_confirm(&f.requester, request.id).await.unwrap();
        let done = f.service.verify_code(&f.owner, request.id, &code).await.unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert!(done.owner_confirmed && done.requester_confirmed);
        assert_eq!(item_status(&f).await, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn rejected_request_is_terminal() {
        let f = fixture().await;
        let request = f.service.create(&f.requester, f.item_id).await.unwrap();

        let rejected = f.service.reject(&f.owner, request.id).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(item_status(&f).await, ItemStatus::Available);

        let err = f
            .service
            .accept(&f.owner, request.id, "Main Gate")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        let err = f.service.reject(&f.owner, request.id).await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn wrong_code_changes_nothing() {
        let f = fixture().await;
        let accepted = accepted_request(&f).await;
        let wrong = if accepted.meeting_code.as_deref() == Some("000000") {
            "111111"
        } else {
            "000000"
        };

        for _ in 0..3 {
            let err = f
                .service
                .verify_code(&f.owner, accepted.id, wrong)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::CodeMismatch));
        }

        let stored = f.repository.requests.get(accepted.id).await.unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert!(!stored.owner_confirmed);
        assert_eq!(stored.meeting_code, accepted.meeting_code);
    }

    #[tokio::test]
    async fn second_rating_is_rejected() {
        let f = fixture().await;
        let accepted = accepted_request(&f).await;
        let code = accepted.meeting_code.clone().unwrap();
        f.service.verify_code(&f.owner, accepted.id, &code).await.unwrap();
        f.service.requester_confirm(&f.requester, accepted.id).await.unwrap();

        f.service.rate(&f.owner, accepted.id, 4).await.unwrap();
        let err = f.service.rate(&f.owner, accepted.id, 5).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyRated));

        let requester = f.repository.users.get(f.requester.user_id).await.unwrap();
        assert_eq!(requester.ratings, vec![4]);
    }

    #[tokio::test]
    async fn concurrent_confirmations_complete_once() {
        let f = fixture().await;
        let accepted = accepted_request(&f).await;
        let code = accepted.meeting_code.clone().unwrap();

        let (by_requester, by_owner) = tokio::join!(
            f.service.requester_confirm(&f.requester, accepted.id),
            f.service.verify_code(&f.owner, accepted.id, &code),
        );
        by_requester.unwrap();
        by_owner.unwrap();

        let stored = f.repository.requests.get(accepted.id).await.unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
        assert!(stored.owner_confirmed && stored.requester_confirmed);
        assert_eq!(item_status(&f).await, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn only_one_request_per_item_is_accepted() {
        let f = fixture().await;
        let first = f.service.create(&f.requester, f.item_id).await.unwrap();
        let second = f.service.create(&f.requester, f.item_id).await.unwrap();

        f.service.accept(&f.owner, first.id, "Main Canteen").await.unwrap();
        let err = f
            .service
            .accept(&f.owner, second.id, "Main Canteen")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        let stored = f.repository.requests.get(second.id).await.unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn non_owner_cannot_accept_or_verify() {
        let f = fixture().await;
        let request = f.service.create(&f.requester, f.item_id).await.unwrap();

        let err = f
            .service
            .accept(&f.requester, request.id, "Main Gate")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let accepted = f.service.accept(&f.owner, request.id, "Main Gate").await.unwrap();
        let code = accepted.meeting_code.unwrap();
        let err = f
            .service
            .verify_code(&f.requester, request.id, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn own_item_and_unknown_zone_are_invalid() {
        let f = fixture().await;
        let err = f.service.create(&f.owner, f.item_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let request = f.service.create(&f.requester, f.item_id).await.unwrap();
        let err = f
            .service
            .accept(&f.owner, request.id, "Rooftop")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(item_status(&f).await, ItemStatus::Available);
    }

    #[tokio::test]
    async fn report_flags_accepted_request_once() {
        let f = fixture().await;
        let accepted = accepted_request(&f).await;

        let err = f.service.report(&f.requester, accepted.id, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let reported = f
            .service
            .report(&f.requester, accepted.id, " No show ")
            .await
            .unwrap();
        assert!(reported.reported);
        assert_eq!(reported.report_reason.as_deref(), Some("No show"));
        assert_eq!(reported.reported_by, Some(f.requester.user_id));
        assert_eq!(reported.status, RequestStatus::Accepted);

        let err = f.service.report(&f.owner, accepted.id, "Again").await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));

        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let queue = f.service.reported_requests(&admin).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(f.service.reported_requests(&f.owner).await.is_err());
    }

    #[tokio::test]
    async fn completion_survives_deleted_item() {
        let f = fixture().await;
        let accepted = accepted_request(&f).await;
        f.repository.items.delete(f.item_id).await.unwrap();

        let code = accepted.meeting_code.clone().unwrap();
        f.service.requester_confirm(&f.requester, accepted.id).await.unwrap();
        let done = f.service.verify_code(&f.owner, accepted.id, &code).await.unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn listings_are_scoped_to_the_actor() {
        let f = fixture().await;
        let request = f.service.create(&f.requester, f.item_id).await.unwrap();

        assert_eq!(f.service.incoming(&f.owner).await.unwrap().len(), 1);
        assert!(f.service.incoming(&f.requester).await.unwrap().is_empty());
        assert_eq!(f.service.outgoing(&f.requester).await.unwrap().len(), 1);

        let stranger = Actor::student(Uuid::new_v4());
        let err = f.service.get(&stranger, request.id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let mut store = MockStore::new();
        store
            .expect_fetch()
            .returning(|_, _| Err(AppError::Repository("connection reset".to_string())));
        let repository = Repository::new(Arc::new(store));
        let service = ExchangeService::new(repository, &ExchangeConfig::default());

        let actor = Actor::student(Uuid::new_v4());
        let err = service.reject(&actor, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));
    }

    #[tokio::test]
    async fn requester_without_profile_gets_placeholder_name() {
        let f = fixture().await;
        let newcomer = Actor::student(Uuid::new_v4());

        let request = f.service.create(&newcomer, f.item_id).await.unwrap();
        assert_eq!(request.requester_id, newcomer.user_id);
        assert_eq!(request.requester_name, users::fallback_name(newcomer.user_id));
    }
}
