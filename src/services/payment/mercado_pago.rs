use super::{PaymentGateway, PaymentStatus, PixCharge, PixChargeRequest};
use crate::services::collaborators::CollaboratorError;
use crate::services::collaborators::http_client::error_body;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

const SERVICE: &str = "payment provider";

/// Mercado Pago payments API, PIX only.
pub struct MercadoPagoGateway {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl MercadoPagoGateway {
    pub fn new(client: Client, base_url: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn connection_error(e: reqwest::Error) -> CollaboratorError {
        tracing::error!("Mercado Pago request failed: {}", e);
        CollaboratorError::Connection {
            service: SERVICE,
            message: e.to_string(),
        }
    }

    async fn decode(response: reqwest::Response) -> Result<PaymentResponse, CollaboratorError> {
        response.json().await.map_err(|e| CollaboratorError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct PaymentResponse {
    /// Numeric in practice, kept loose
    id: Value,
    status: String,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Deserialize)]
struct PointOfInteraction {
    #[serde(default)]
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
    ticket_url: Option<String>,
}

fn payment_id(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn into_charge(response: PaymentResponse) -> Result<PixCharge, CollaboratorError> {
    let payment_id = payment_id(&response.id).ok_or_else(|| CollaboratorError::Decode {
        service: SERVICE,
        message: format!("payment without id: {}", response.id),
    })?;
    let data = response
        .point_of_interaction
        .and_then(|poi| poi.transaction_data);

    Ok(PixCharge {
        payment_id,
        status: PaymentStatus::from_provider(&response.status),
        qr_code: data.as_ref().and_then(|d| d.qr_code.clone()),
        qr_code_base64: data.as_ref().and_then(|d| d.qr_code_base64.clone()),
        ticket_url: data.and_then(|d| d.ticket_url),
    })
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_pix_charge(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PixCharge, CollaboratorError> {
        let url = format!("{}/v1/payments", self.base_url);

        let body = json!({
            "transaction_amount": amount(request.amount_cents),
            "description": request.description,
            "payment_method_id": "pix",
            "payer": { "email": request.payer_email },
            "external_reference": request.external_reference,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .header("X-Idempotency-Key", &request.external_reference)
            .json(&body)
            .send()
            .await
            .map_err(Self::connection_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body(response).await;
            tracing::error!("Mercado Pago API error ({}): {}", status, message);
            return Err(CollaboratorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        into_charge(Self::decode(response).await?)
    }

    async fn payment_status(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentStatus>, CollaboratorError> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(Self::connection_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = error_body(response).await;
            return Err(CollaboratorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let payment = Self::decode(response).await?;
        Ok(Some(PaymentStatus::from_provider(&payment.status)))
    }
}
