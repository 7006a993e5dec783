//! Item (catalog) endpoints

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item, ItemQuery},
};

use super::AuthenticatedUser;

/// List items, newest first
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("category" = Option<String>, Query, description = "Books, Games, Sports or Turf Slots")
    ),
    responses(
        (status = 200, description = "List of items", body = Vec<Item>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.catalog.list_items(&query).await?;
    Ok(Json(items))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// List a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(item): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let created = state.services.catalog.create_item(&user.actor(), item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_item(&user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent snapshots of the catalog
#[utoipa::path(
    get,
    path = "/items/stream",
    tag = "items",
    security(("bearer_auth" = [])),
    params(
        ("category" = Option<String>, Query, description = "Books, Games, Sports or Turf Slots")
    ),
    responses(
        (status = 200, description = "Event stream; each `items` event carries the full list")
    )
)]
pub async fn stream_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let snapshots = state.services.catalog.watch_items(&query).map(|mut items| {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(match Event::default().event("items").json_data(&items) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to encode item snapshot: {}", e);
                Event::default().event("error").data("snapshot unavailable")
            }
        })
    });

    Sse::new(snapshots).keep_alive(KeepAlive::default())
}
