use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{BookingDraft, BookingError};

/// Starts the deposit payment for a stored draft and returns where to send the patient.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_deposit(
        &self,
        draft: &BookingDraft,
        auth_token: Option<&str>,
    ) -> Result<String, BookingError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInitiationResponse {
    #[serde(alias = "redirect_url")]
    redirect_url: String,
}

pub struct HttpPaymentGateway {
    client: Client,
    endpoint: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.payment_initiation_url.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate_deposit(
        &self,
        draft: &BookingDraft,
        auth_token: Option<&str>,
    ) -> Result<String, BookingError> {
        if self.endpoint.is_empty() {
            return Err(BookingError::Configuration(
                "payment initiation URL is not configured".to_string(),
            ));
        }

        debug!("Initiating deposit of {} for patient {}", draft.payload.deposit(), draft.patient_id);

        let mut request = self.client.post(&self.endpoint).json(&json!({
            "patientId": draft.patient_id,
            "amount": draft.payload.deposit(),
            "booking": draft.payload,
        }));
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BookingError::Payment(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Payment initiation failed ({}): {}", status, body);
            return Err(BookingError::Payment(format!("status {}", status)));
        }

        let body: PaymentInitiationResponse = response
            .json()
            .await
            .map_err(|e| BookingError::Payment(format!("unreadable response: {}", e)))?;

        if body.redirect_url.is_empty() {
            return Err(BookingError::Payment("empty redirect URL".to_string()));
        }
        Ok(body.redirect_url)
    }
}
