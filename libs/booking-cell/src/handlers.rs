// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{BookingContext, BookingError, BookingRequest, PriceRequest, TimelineRequest};
use crate::services::booking::BookingService;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::DataUnavailable(msg) => AppError::Unavailable(msg),
            BookingError::Configuration(msg) => AppError::Configuration(msg),
            BookingError::MissingField(_) | BookingError::InvalidField { .. } => {
                AppError::ValidationError(err.to_string())
            }
            BookingError::SlotRejected { .. } => AppError::Conflict(err.to_string()),
            BookingError::Storage(msg) => AppError::Internal(msg),
            BookingError::Payment(msg) => AppError::ExternalService(msg),
        }
    }
}

fn booking_context(user: &User, auth: &Authorization<Bearer>) -> Result<BookingContext, AppError> {
    if !user.is_patient() {
        return Err(AppError::Auth("Only patients can book appointments".to_string()));
    }
    let patient_id = user
        .patient_id()
        .ok_or_else(|| AppError::Auth("Token subject is not a patient id".to_string()))?;

    Ok(BookingContext::new(patient_id, Some(auth.token().to_string())))
}

// ==============================================================================
// DAY AND CATALOG
// ==============================================================================

#[axum::debug_handler]
pub async fn get_bookable_day(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let ready = service.load_day(&context, doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "selectable": ready.day.available_slots().count(),
        "day": ready.day,
    })))
}

#[axum::debug_handler]
pub async fn get_specialty_services(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(specialty_code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let catalog = service.load_catalog(&context, &specialty_code).await?;
    let consultation = catalog.consultation()?;

    Ok(Json(json!({
        "specialty_code": specialty_code,
        "consultation_service_id": consultation.id,
        "services": catalog.services(),
    })))
}

// ==============================================================================
// TIMELINE AND PRICE
// ==============================================================================

#[axum::debug_handler]
pub async fn plan_timeline(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<TimelineRequest>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let planned = service.plan_timeline(&context, &request).await?;

    Ok(Json(json!(planned)))
}

#[axum::debug_handler]
pub async fn quote_price(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let price = service.quote(&context, &request).await?;

    Ok(Json(json!(price)))
}

// ==============================================================================
// SUBMISSION AND DRAFTS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_booking(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let submitted = service.submit(&context, &request).await?;

    Ok(Json(json!({
        "redirect_url": submitted.redirect_url,
        "draft": submitted.draft,
    })))
}

#[axum::debug_handler]
pub async fn get_pending_draft(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    let draft = service
        .resume_draft(&context)
        .await?
        .ok_or_else(|| AppError::NotFound("No pending booking".to_string()))?;

    Ok(Json(json!(draft)))
}

#[axum::debug_handler]
pub async fn clear_pending_draft(
    State(service): State<Arc<BookingService>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let context = booking_context(&user, &auth)?;
    service.clear_draft(&context).await?;

    Ok(Json(json!({ "cleared": true })))
}
