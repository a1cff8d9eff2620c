use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::clock::{ClinicClock, Clock};
use crate::models::AvailabilityError;
use crate::services::{AvailabilityService, SupabaseScheduleSource};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Preview the window from a later day. Earlier values are clamped to today.
    pub from: Option<NaiveDate>,
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::DataUnavailable(msg) => AppError::Unavailable(msg),
            AvailabilityError::Backend(msg) => AppError::ExternalService(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn get_doctor_availability_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let clock = ClinicClock::from_offset_minutes(state.clinic_utc_offset_minutes);
    let today = query.from
        .map(|from| from.max(clock.today()))
        .unwrap_or_else(|| clock.today());

    let service = AvailabilityService::new(Arc::new(SupabaseScheduleSource::new(&state)));
    let days = service.get_two_week_availability(doctor_id, today, None).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "today": today,
        "days": days,
    })))
}
