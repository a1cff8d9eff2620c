use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilityError, WeeklyScheduleEntry};

/// Staff-scheduling collaborator: the doctor's published working intervals.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_weekly_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<WeeklyScheduleEntry>, AvailabilityError>;
}

pub struct SupabaseScheduleSource {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleSource {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ScheduleSource for SupabaseScheduleSource {
    async fn fetch_weekly_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<WeeklyScheduleEntry>, AvailabilityError> {
        debug!("Fetching weekly schedule for doctor {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&select=work_date,start_time,end_time&order=work_date.asc,start_time.asc",
            doctor_id
        );

        let entries: Vec<WeeklyScheduleEntry> = self.supabase
            .get_rows(&path, auth_token)
            .await
            .map_err(|e| AvailabilityError::DataUnavailable(format!("weekly schedule: {}", e)))?;

        let (valid, invalid): (Vec<_>, Vec<_>) = entries.into_iter().partition(|entry| entry.is_valid());
        if !invalid.is_empty() {
            warn!("Dropped {} invalid schedule entries for doctor {}", invalid.len(), doctor_id);
        }

        Ok(valid)
    }
}
