//! User profile endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        item::Item,
        user::{CreateProfile, User, UserProfile},
    },
};

use super::AuthenticatedUser;

/// Get the signed-in user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own profile", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Profile not registered yet")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<User>> {
    let profile = state.services.users.profile(user.actor().user_id).await?;
    Ok(Json(profile))
}

/// Register the signed-in user's profile
#[utoipa::path(
    post,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateProfile,
    responses(
        (status = 201, description = "Profile created", body = User),
        (status = 400, description = "Invalid profile"),
        (status = 409, description = "Profile already exists")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(profile): Json<CreateProfile>,
) -> AppResult<(StatusCode, Json<User>)> {
    let created = state
        .services
        .users
        .register_profile(&user.actor(), profile)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a member's public profile with trust summary
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Public profile", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.services.users.public_profile(id).await?;
    Ok(Json(profile))
}

/// Items listed by a member
#[utoipa::path(
    get,
    path = "/users/{id}/items",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Member's items, newest first", body = Vec<Item>)
    )
)]
pub async fn get_user_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.catalog.items_of(id).await?;
    Ok(Json(items))
}
