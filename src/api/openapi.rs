//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, requests, turf, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Swap API",
        version = "1.0.0",
        description = "Campus item exchange and turf booking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::me,
        users::register,
        users::get_user,
        users::get_user_items,
        // Items
        items::list_items,
        items::get_item,
        items::create_item,
        items::delete_item,
        items::stream_items,
        // Requests
        requests::create_request,
        requests::incoming,
        requests::outgoing,
        requests::reported,
        requests::get_request,
        requests::accept,
        requests::reject,
        requests::confirm,
        requests::verify,
        requests::rate,
        requests::report,
        requests::safe_zones,
        // Turf
        turf::catalog,
        turf::availability,
        turf::book,
        turf::all_bookings,
        turf::my_bookings,
        turf::cancel,
        turf::stream_bookings,
    ),
    components(
        schemas(
            // Users
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::CreateProfile,
            crate::models::user::UserProfile,
            crate::models::trust::TrustSummary,
            crate::models::trust::TrustTier,
            // Items
            crate::models::item::Item,
            crate::models::item::CreateItem,
            crate::models::item::Category,
            crate::models::item::Condition,
            crate::models::item::ListingType,
            crate::models::item::ItemStatus,
            // Requests
            crate::models::request::RequestView,
            crate::models::request::RequestStatus,
            crate::models::request::CreateRequest,
            crate::models::request::AcceptRequest,
            crate::models::request::VerifyCode,
            crate::models::request::RateRequest,
            crate::models::request::ReportRequest,
            // Turf
            crate::models::turf::TurfBooking,
            crate::models::turf::BookingStatus,
            crate::models::turf::CreateBooking,
            crate::models::turf::SlotAvailability,
            crate::models::turf::TurfCatalog,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Member profiles"),
        (name = "items", description = "Item catalog"),
        (name = "requests", description = "Exchange requests"),
        (name = "turf", description = "Turf slot booking")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
