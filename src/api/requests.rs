//! Exchange request endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::request::{
        AcceptRequest, CreateRequest, RateRequest, ReportRequest, RequestView, VerifyCode,
    },
};

use super::AuthenticatedUser;

/// Request an item
#[utoipa::path(
    post,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = CreateRequest,
    responses(
        (status = 201, description = "Request created", body = RequestView),
        (status = 400, description = "Own item"),
        (status = 409, description = "Item not available")
    )
)]
pub async fn create_request(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRequest>,
) -> AppResult<(StatusCode, Json<RequestView>)> {
    let actor = user.actor();
    let request = state.services.exchange.create(&actor, body.item_id).await?;
    Ok((StatusCode::CREATED, Json(RequestView::for_viewer(request, &actor))))
}

/// Requests received on the caller's items
#[utoipa::path(
    get,
    path = "/requests/incoming",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Incoming requests, newest first", body = Vec<RequestView>)
    )
)]
pub async fn incoming(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestView>>> {
    let actor = user.actor();
    let requests = state.services.exchange.incoming(&actor).await?;
    Ok(Json(
        requests
            .into_iter()
            .map(|r| RequestView::for_viewer(r, &actor))
            .collect(),
    ))
}

/// Requests the caller has made
#[utoipa::path(
    get,
    path = "/requests/outgoing",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Outgoing requests, newest first", body = Vec<RequestView>)
    )
)]
pub async fn outgoing(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestView>>> {
    let actor = user.actor();
    let requests = state.services.exchange.outgoing(&actor).await?;
    Ok(Json(
        requests
            .into_iter()
            .map(|r| RequestView::for_viewer(r, &actor))
            .collect(),
    ))
}

/// Reported exchanges awaiting admin review
#[utoipa::path(
    get,
    path = "/requests/reported",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reported requests", body = Vec<RequestView>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn reported(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestView>>> {
    let actor = user.actor();
    let requests = state.services.exchange.reported_requests(&actor).await?;
    Ok(Json(
        requests
            .into_iter()
            .map(|r| RequestView::for_viewer(r, &actor))
            .collect(),
    ))
}

/// Get a request
#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request details", body = RequestView),
        (status = 403, description = "Not a party to the request"),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_request(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state.services.exchange.get(&actor, id).await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Accept a pending request at a safe zone
#[utoipa::path(
    post,
    path = "/requests/{id}/accept",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = AcceptRequest,
    responses(
        (status = 200, description = "Request accepted", body = RequestView),
        (status = 400, description = "Unknown safe zone"),
        (status = 409, description = "Request or item in the wrong state")
    )
)]
pub async fn accept(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AcceptRequest>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state.services.exchange.accept(&actor, id, &body.safe_zone).await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Reject a pending request
#[utoipa::path(
    post,
    path = "/requests/{id}/reject",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request rejected", body = RequestView),
        (status = 409, description = "Request is not pending")
    )
)]
pub async fn reject(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state.services.exchange.reject(&actor, id).await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Requester confirms the hand-over
#[utoipa::path(
    post,
    path = "/requests/{id}/confirm",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Confirmation recorded", body = RequestView),
        (status = 409, description = "Request is not accepted")
    )
)]
pub async fn confirm(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state.services.exchange.requester_confirm(&actor, id).await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Owner verifies the meeting code
#[utoipa::path(
    post,
    path = "/requests/{id}/verify",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = VerifyCode,
    responses(
        (status = 200, description = "Code accepted", body = RequestView),
        (status = 422, description = "Code does not match")
    )
)]
pub async fn verify(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyCode>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state
        .services
        .exchange
        .verify_code(&actor, id, body.code.trim())
        .await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Owner rates the requester
#[utoipa::path(
    post,
    path = "/requests/{id}/rate",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = RateRequest,
    responses(
        (status = 200, description = "Rating recorded; a repeat rating returns the stored request unchanged", body = RequestView),
        (status = 400, description = "Rating out of range"),
        (status = 409, description = "Exchange not completed")
    )
)]
pub async fn rate(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = match state.services.exchange.rate(&actor, id, body.stars).await {
        Ok(request) => request,
        // Repeat ratings are a no-op
        Err(AppError::AlreadyRated) => state.services.exchange.get(&actor, id).await?,
        Err(e) => return Err(e),
    };
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Report an accepted exchange for admin review
#[utoipa::path(
    post,
    path = "/requests/{id}/report",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body = ReportRequest,
    responses(
        (status = 200, description = "Report recorded", body = RequestView),
        (status = 409, description = "Not reportable")
    )
)]
pub async fn report(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReportRequest>,
) -> AppResult<Json<RequestView>> {
    let actor = user.actor();
    let request = state.services.exchange.report(&actor, id, &body.reason).await?;
    Ok(Json(RequestView::for_viewer(request, &actor)))
}

/// Approved meetup locations
#[utoipa::path(
    get,
    path = "/safe-zones",
    tag = "requests",
    responses(
        (status = 200, description = "Safe zones", body = Vec<String>)
    )
)]
pub async fn safe_zones(State(state): State<crate::AppState>) -> Json<Vec<String>> {
    Json(state.services.exchange.safe_zones().to_vec())
}
