//! Turf booking endpoints

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::turf::{AvailabilityQuery, CreateBooking, SlotAvailability, TurfBooking, TurfCatalog},
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    /// Day to watch (YYYY-MM-DD)
    pub date: NaiveDate,
}

/// Turfs and slots offered for booking
#[utoipa::path(
    get,
    path = "/turf/catalog",
    tag = "turf",
    responses(
        (status = 200, description = "Turf catalog", body = TurfCatalog)
    )
)]
pub async fn catalog(State(state): State<crate::AppState>) -> Json<TurfCatalog> {
    Json(state.services.turf.catalog())
}

/// Slot occupancy for a day
#[utoipa::path(
    get,
    path = "/turf/availability",
    tag = "turf",
    security(("bearer_auth" = [])),
    params(
        ("date" = String, Query, description = "Day (YYYY-MM-DD)"),
        ("turfName" = Option<String>, Query, description = "Restrict to one turf")
    ),
    responses(
        (status = 200, description = "Availability grid", body = Vec<SlotAvailability>),
        (status = 400, description = "Unknown turf")
    )
)]
pub async fn availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<Vec<SlotAvailability>>> {
    let grid = match query.turf_name.as_deref() {
        Some(turf) => state.services.turf.turf_availability(turf, query.date).await?,
        None => state.services.turf.day_availability(query.date).await?,
    };
    Ok(Json(grid))
}

/// Book a slot
#[utoipa::path(
    post,
    path = "/turf/bookings",
    tag = "turf",
    security(("bearer_auth" = [])),
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Slot booked", body = TurfBooking),
        (status = 400, description = "Invalid booking"),
        (status = 409, description = "Slot already booked")
    )
)]
pub async fn book(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(booking): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<TurfBooking>)> {
    let booked = state.services.turf.book(&user.actor(), booking).await?;
    Ok((StatusCode::CREATED, Json(booked)))
}

/// Every active booking (admin)
#[utoipa::path(
    get,
    path = "/turf/bookings",
    tag = "turf",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active bookings, newest first", body = Vec<TurfBooking>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn all_bookings(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TurfBooking>>> {
    let bookings = state.services.turf.all_bookings(&user.actor()).await?;
    Ok(Json(bookings))
}

/// The caller's active bookings
#[utoipa::path(
    get,
    path = "/turf/bookings/mine",
    tag = "turf",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own bookings", body = Vec<TurfBooking>)
    )
)]
pub async fn my_bookings(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TurfBooking>>> {
    let bookings = state.services.turf.my_bookings(&user.actor()).await?;
    Ok(Json(bookings.collect().await))
}

/// Cancel a booking (admin)
#[utoipa::path(
    post,
    path = "/turf/bookings/{id}/cancel",
    tag = "turf",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking cancelled", body = TurfBooking),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn cancel(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TurfBooking>> {
    let cancelled = state.services.turf.cancel(&user.actor(), id).await?;
    Ok(Json(cancelled))
}

/// Server-sent snapshots of a day's bookings
#[utoipa::path(
    get,
    path = "/turf/bookings/stream",
    tag = "turf",
    security(("bearer_auth" = [])),
    params(
        ("date" = String, Query, description = "Day (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Event stream; each `bookings` event carries the full list")
    )
)]
pub async fn stream_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<DayQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let snapshots = state.services.turf.watch_day(query.date).map(|bookings| {
        let event = Event::default().event("bookings");
        Ok(match event.json_data(&bookings) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to encode booking snapshot: {}", e);
                Event::default().event("error").data("snapshot unavailable")
            }
        })
    });

    Sse::new(snapshots).keep_alive(KeepAlive::default())
}
