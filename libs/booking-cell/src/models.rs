// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use availability_cell::{AvailabilityError, SlotBlockReason};

// ==============================================================================
// APPOINTMENTS (read-only, owned by the backend)
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Cancelled appointments never take part in conflict checks.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::InProgress => write!(f, "IN_PROGRESS"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A child window bound to one ancillary examination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAppointment {
    pub id: Uuid,
    #[serde(alias = "medical_examination_id")]
    pub medical_examination_id: Uuid,
    #[serde(alias = "start_time")]
    pub start_time: NaiveTime,
    #[serde(alias = "end_time")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    #[serde(alias = "patient_id")]
    pub patient_id: Uuid,
    #[serde(default, alias = "doctor_id")]
    pub doctor_id: Option<Uuid>,
    #[serde(alias = "work_date")]
    pub work_date: NaiveDate,
    #[serde(alias = "start_time")]
    pub start_time: NaiveTime,
    #[serde(alias = "end_time")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default, alias = "parent_appointment_id")]
    pub parent_appointment_id: Option<Uuid>,
    #[serde(default, alias = "service_appointments")]
    pub service_appointments: Vec<ServiceAppointment>,
}

impl Appointment {
    pub fn is_parent(&self) -> bool {
        self.parent_appointment_id.is_none()
    }

    /// Parent-level, non-cancelled: the only appointments that reserve time.
    pub fn reserves_time(&self) -> bool {
        self.is_parent() && self.status.is_active()
    }
}

// ==============================================================================
// SERVICES
// ==============================================================================

/// WAIT: the patient may leave while results are pending. STAY: must remain on site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Wait,
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceRole {
    Consultation,
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalExamination {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    #[serde(default, alias = "min_duration")]
    pub min_duration: Option<i64>,
    #[serde(default, rename = "type")]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub role: Option<ServiceRole>,
}

impl MedicalExamination {
    pub fn duration_or(&self, default_minutes: i64) -> i64 {
        self.min_duration.filter(|minutes| *minutes > 0).unwrap_or(default_minutes)
    }

    /// Explicit role first; the case-insensitive name keyword is the fallback
    /// for rows that predate the `role` column.
    pub fn is_consultation(&self, keyword: &str) -> bool {
        match self.role {
            Some(ServiceRole::Consultation) => true,
            Some(ServiceRole::Diagnostic) => false,
            None => {
                !keyword.is_empty() && self.name.to_lowercase().contains(&keyword.to_lowercase())
            }
        }
    }
}

// ==============================================================================
// BOOKING COMPOSITION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    ConsultationOnly,
    ServiceAndConsultation,
    PreventiveService,
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingType::ConsultationOnly => write!(f, "CONSULTATION_ONLY"),
            BookingType::ServiceAndConsultation => write!(f, "SERVICE_AND_CONSULTATION"),
            BookingType::PreventiveService => write!(f, "PREVENTIVE_SERVICE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSlot {
    pub service_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Ordered service windows followed by the consultation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiStepTimeline {
    pub work_date: NaiveDate,
    pub service_slots: Vec<ServiceSlot>,
    pub consultation_slot: ConsultationSlot,
}

impl MultiStepTimeline {
    pub fn starts_at(&self) -> NaiveTime {
        self.service_slots
            .first()
            .map(|slot| slot.start_time)
            .unwrap_or(self.consultation_slot.start_time)
    }

    pub fn ends_at(&self) -> NaiveTime {
        self.consultation_slot.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub total: i64,
    pub discounted: i64,
    pub deposit: i64,
    pub discount_percent: u32,
    pub deposit_percent: u32,
}

/// What the booking UI submits. Every field a booking type needs is checked by
/// the composer; discount and deposit are always recomputed server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub booking_type: BookingType,
    pub specialty_code: Option<String>,
    pub work_date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub service_slots: Vec<ServiceSlot>,
    pub consultation_slot: Option<ConsultationSlot>,
    #[serde(default)]
    pub medical_examination_ids: Vec<Uuid>,
}

/// Typed payload handed to the payment-initiation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "bookingType", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum BookingPayload {
    ConsultationOnly {
        doctor_id: Uuid,
        work_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        medical_examination_ids: Vec<Uuid>,
        discount: u32,
        deposit: i64,
        deposit_status: DepositStatus,
    },
    ServiceAndConsultation {
        doctor_id: Uuid,
        work_date: NaiveDate,
        service_slots: Vec<ServiceSlot>,
        consultation_slot: ConsultationSlot,
        medical_examination_ids: Vec<Uuid>,
        discount: u32,
        deposit: i64,
        deposit_status: DepositStatus,
    },
    PreventiveService {
        doctor_id: Option<Uuid>,
        work_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        medical_examination_ids: Vec<Uuid>,
        discount: u32,
        deposit: i64,
        deposit_status: DepositStatus,
    },
}

impl BookingPayload {
    pub fn booking_type(&self) -> BookingType {
        match self {
            BookingPayload::ConsultationOnly { .. } => BookingType::ConsultationOnly,
            BookingPayload::ServiceAndConsultation { .. } => BookingType::ServiceAndConsultation,
            BookingPayload::PreventiveService { .. } => BookingType::PreventiveService,
        }
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self {
            BookingPayload::ConsultationOnly { doctor_id, .. }
            | BookingPayload::ServiceAndConsultation { doctor_id, .. } => Some(*doctor_id),
            BookingPayload::PreventiveService { doctor_id, .. } => *doctor_id,
        }
    }

    pub fn work_date(&self) -> NaiveDate {
        match self {
            BookingPayload::ConsultationOnly { work_date, .. }
            | BookingPayload::ServiceAndConsultation { work_date, .. }
            | BookingPayload::PreventiveService { work_date, .. } => *work_date,
        }
    }

    pub fn deposit(&self) -> i64 {
        match self {
            BookingPayload::ConsultationOnly { deposit, .. }
            | BookingPayload::ServiceAndConsultation { deposit, .. }
            | BookingPayload::PreventiveService { deposit, .. } => *deposit,
        }
    }

    pub fn medical_examination_ids(&self) -> &[Uuid] {
        match self {
            BookingPayload::ConsultationOnly { medical_examination_ids, .. }
            | BookingPayload::ServiceAndConsultation { medical_examination_ids, .. }
            | BookingPayload::PreventiveService { medical_examination_ids, .. } => medical_examination_ids,
        }
    }

    /// The window the doctor is reserved for, if any.
    pub fn doctor_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match self {
            BookingPayload::ConsultationOnly { start_time, end_time, .. } => Some((*start_time, *end_time)),
            BookingPayload::ServiceAndConsultation { consultation_slot, .. } => {
                Some((consultation_slot.start_time, consultation_slot.end_time))
            }
            BookingPayload::PreventiveService { .. } => None,
        }
    }

    /// First start to last end: the span the patient is committed for.
    pub fn patient_window(&self) -> (NaiveTime, NaiveTime) {
        match self {
            BookingPayload::ConsultationOnly { start_time, end_time, .. }
            | BookingPayload::PreventiveService { start_time, end_time, .. } => (*start_time, *end_time),
            BookingPayload::ServiceAndConsultation { service_slots, consultation_slot, .. } => {
                let start = service_slots
                    .iter()
                    .map(|slot| slot.start_time)
                    .min()
                    .unwrap_or(consultation_slot.start_time)
                    .min(consultation_slot.start_time);
                (start, consultation_slot.end_time)
            }
        }
    }
}

/// The short-lived snapshot kept across the payment redirect. Flat JSON under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub patient_id: Uuid,
    #[serde(flatten)]
    pub payload: BookingPayload,
    pub total_price: i64,
    pub discounted_price: i64,
    pub created_at: DateTime<Utc>,
}

/// Caller identity passed explicitly into every entry point.
#[derive(Debug, Clone)]
pub struct BookingContext {
    pub patient_id: Uuid,
    pub auth_token: Option<String>,
}

impl BookingContext {
    pub fn new(patient_id: Uuid, auth_token: Option<String>) -> Self {
        Self { patient_id, auth_token }
    }

    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRequest {
    pub booking_type: BookingType,
    pub specialty_code: String,
    pub doctor_id: Uuid,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(default)]
    pub medical_examination_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub specialty_code: String,
    #[serde(default)]
    pub medical_examination_ids: Vec<Uuid>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Selected window {start}-{end} is not bookable ({reason})")]
    SlotRejected {
        start: NaiveTime,
        end: NaiveTime,
        reason: SlotBlockReason,
    },

    #[error("Draft storage error: {0}")]
    Storage(String),

    #[error("Payment initiation failed: {0}")]
    Payment(String),
}

impl From<AvailabilityError> for BookingError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::DataUnavailable(msg) | AvailabilityError::Backend(msg) => {
                BookingError::DataUnavailable(msg)
            }
        }
    }
}

impl BookingError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        BookingError::InvalidField { field, reason: reason.into() }
    }

    /// The request field a validation error points at.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            BookingError::MissingField(field) | BookingError::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}
