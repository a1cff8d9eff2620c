// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::BookingService;

pub fn booking_routes(config: Arc<AppConfig>, service: Arc<BookingService>) -> Router {
    // Every booking operation acts on behalf of the authenticated patient
    let protected_routes = Router::new()
        .route("/", post(handlers::submit_booking))
        .route("/doctors/{doctor_id}/days/{date}", get(handlers::get_bookable_day))
        .route("/specialties/{specialty_code}/services", get(handlers::get_specialty_services))
        .route("/timeline", post(handlers::plan_timeline))
        .route("/price", post(handlers::quote_price))
        .route("/draft", get(handlers::get_pending_draft).delete(handlers::clear_pending_draft))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(service)
}
