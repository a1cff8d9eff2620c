use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, BookingError, MedicalExamination};

/// Read access to appointments and the service catalog.
#[async_trait]
pub trait BookingDataSource: Send + Sync {
    async fn fetch_appointments_for_doctor_on_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError>;

    async fn fetch_appointments_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError>;

    async fn fetch_services_by_specialty(
        &self,
        specialty_code: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<MedicalExamination>, BookingError>;
}

pub struct SupabaseBookingSource {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseBookingSource {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn active_appointments(
        &self,
        path: &str,
        what: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError> {
        let appointments: Vec<Appointment> = self.supabase
            .get_rows(path, auth_token)
            .await
            .map_err(|e| BookingError::DataUnavailable(format!("{}: {}", what, e)))?;

        Ok(appointments
            .into_iter()
            .filter(|appointment| appointment.reserves_time())
            .collect())
    }
}

#[async_trait]
impl BookingDataSource for SupabaseBookingSource {
    async fn fetch_appointments_for_doctor_on_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError> {
        debug!("Fetching appointments for doctor {} on {}", doctor_id, date);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&work_date=eq.{}&status=neq.CANCELLED&parent_appointment_id=is.null&order=start_time.asc",
            doctor_id, date
        );
        self.active_appointments(&path, "doctor appointments", auth_token).await
    }

    async fn fetch_appointments_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError> {
        debug!("Fetching appointments for patient {}", patient_id);

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&status=neq.CANCELLED&parent_appointment_id=is.null&order=work_date.asc,start_time.asc",
            patient_id
        );
        self.active_appointments(&path, "patient appointments", auth_token).await
    }

    async fn fetch_services_by_specialty(
        &self,
        specialty_code: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<MedicalExamination>, BookingError> {
        debug!("Fetching services for specialty {}", specialty_code);

        let path = format!(
            "/rest/v1/medical_examinations?specialty_code=eq.{}&order=name.asc",
            specialty_code
        );
        self.supabase
            .get_rows(&path, auth_token)
            .await
            .map_err(|e| BookingError::DataUnavailable(format!("services for {}: {}", specialty_code, e)))
    }
}
