use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Authenticated caller, placed into request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Subject id as a patient id. Tokens issued by the clinic backend use UUID subjects.
    pub fn patient_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }

    pub fn is_patient(&self) -> bool {
        matches!(self.role.as_deref(), None | Some("patient") | Some("authenticated"))
    }
}
