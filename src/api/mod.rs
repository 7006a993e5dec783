//! API handlers for Campus Swap REST endpoints

pub mod health;
pub mod items;
pub mod openapi;
pub mod requests;
pub mod turf;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::{Actor, UserClaims}, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

impl AuthenticatedUser {
    /// The principal handed to core operations
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Users
        .route("/users/me", get(users::me).post(users::register))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/items", get(users::get_user_items))
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/stream", get(items::stream_items))
        .route("/items/:id", get(items::get_item).delete(items::delete_item))
        // Exchange requests
        .route("/safe-zones", get(requests::safe_zones))
        .route("/requests", post(requests::create_request))
        .route("/requests/incoming", get(requests::incoming))
        .route("/requests/outgoing", get(requests::outgoing))
        .route("/requests/reported", get(requests::reported))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/accept", post(requests::accept))
        .route("/requests/:id/reject", post(requests::reject))
        .route("/requests/:id/confirm", post(requests::confirm))
        .route("/requests/:id/verify", post(requests::verify))
        .route("/requests/:id/rate", post(requests::rate))
        .route("/requests/:id/report", post(requests::report))
        // Turf
        .route("/turf/catalog", get(turf::catalog))
        .route("/turf/availability", get(turf::availability))
        .route("/turf/bookings", get(turf::all_bookings).post(turf::book))
        .route("/turf/bookings/mine", get(turf::my_bookings))
        .route("/turf/bookings/stream", get(turf::stream_bookings))
        .route("/turf/bookings/:id/cancel", post(turf::cancel))
        .with_state(state);

    // OpenAPI documentation
    let docs = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(docs)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
