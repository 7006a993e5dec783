//! User model, identity claims and the acting principal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::trust::TrustSummary;
use crate::{
    error::AppError,
    repository::{CollectionName, Record},
};

/// Community role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Student,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "Student"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

/// User profile record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    pub email: String,
    pub role: Role,
    /// Star ratings received, append-only
    pub ratings: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum UserPatch {
    AppendRating(u8),
}

impl Record for User {
    const COLLECTION: CollectionName = CollectionName::Users;
    type Patch = UserPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, patch: UserPatch) {
        match patch {
            UserPatch::AppendRating(stars) => self.ratings.push(stars),
        }
    }
}

/// Profile creation at signup
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProfile {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 7, max = 25, message = "Age must be between 7 and 25"))]
    pub age: u8,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Profile as shown to other members
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub trust: TrustSummary,
}

/// The principal performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn student(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Student)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Administrator privileges required".to_string()))
        }
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: Uuid, role: Role, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            user_id,
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}
