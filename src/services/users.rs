//! User profiles and reputation

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::trust;
use crate::{
    error::{AppError, AppResult},
    models::user::{Actor, CreateProfile, Role, User, UserProfile},
    repository::Repository,
};

/// Name stamped on records an account creates. Accounts that never
/// registered a profile get a placeholder derived from their id.
pub(crate) async fn display_name(repository: &Repository, user_id: Uuid) -> AppResult<String> {
    match repository.users.get(user_id).await {
        Ok(user) => Ok(user.name),
        Err(AppError::NotFound(_)) => Ok(fallback_name(user_id)),
        Err(e) => Err(e),
    }
}

pub fn fallback_name(user_id: Uuid) -> String {
    let id = user_id.simple().to_string();
    format!("Member {}", &id[..8])
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create the profile of a freshly signed-up user
    pub async fn register_profile(&self, actor: &Actor, profile: CreateProfile) -> AppResult<User> {
        profile.validate()?;
        let name = profile.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let user = User {
            id: actor.user_id,
            name: name.to_string(),
            age: profile.age,
            email: profile.email.trim().to_lowercase(),
            role: if actor.is_admin() { Role::Admin } else { Role::Student },
            ratings: Vec::new(),
            created_at: Utc::now(),
        };
        self.repository.users.create(user.clone()).await.map_err(|e| {
            if e.is_conflict() {
                AppError::Conflict(format!("Profile for {} already exists", actor.user_id))
            } else {
                e
            }
        })?;

        tracing::info!("Registered profile {} ({})", user.id, user.role);
        Ok(user)
    }

    /// Full user record
    pub async fn profile(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get(id).await
    }

    /// Profile with trust summary, as other members see it
    pub async fn public_profile(&self, id: Uuid) -> AppResult<UserProfile> {
        let user = self.profile(id).await?;
        Ok(UserProfile {
            id: user.id,
            trust: trust::summarize(&user.ratings),
            name: user.name,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrustTier;

    fn signup(name: &str, age: u8) -> CreateProfile {
        CreateProfile {
            name: name.to_string(),
            age,
            email: "Asha@Campus.edu".to_string(),
        }
    }

    #[tokio::test]
    async fn registers_once() {
        let service = UsersService::new(Repository::in_memory());
        let actor = Actor::student(Uuid::new_v4());

        let user = service.register_profile(&actor, signup("Asha", 19)).await.unwrap();
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.email, "asha@campus.edu");

        let err = service.register_profile(&actor, signup("Asha", 19)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejects_out_of_range_age() {
        let service = UsersService::new(Repository::in_memory());
        let actor = Actor::student(Uuid::new_v4());

        let err = service.register_profile(&actor, signup("Asha", 6)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(matches!(service.profile(actor.user_id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn new_member_has_no_trust_history() {
        let service = UsersService::new(Repository::in_memory());
        let actor = Actor::student(Uuid::new_v4());
        service.register_profile(&actor, signup("Asha", 19)).await.unwrap();

        let public = service.public_profile(actor.user_id).await.unwrap();
        assert_eq!(public.trust.tier, TrustTier::New);
        assert_eq!(public.trust.count, 0);
    }
}
