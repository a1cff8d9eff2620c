use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // The raw grid is public; conflict-filtered days live behind auth in booking-cell.
    Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability_public))
        .with_state(state)
}
