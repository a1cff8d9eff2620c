use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use availability_cell::router::availability_routes;
use booking_cell::{booking_routes, BookingService};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, booking: Arc<BookingService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/doctors", availability_routes(config.clone()))
        .nest("/bookings", booking_routes(config, booking))
}
