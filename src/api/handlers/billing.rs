use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::ApiJson;
use crate::entities::billings::BillingStatus;
use crate::services::billing::{WebhookEvent, WebhookOutcome};
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct BillingResponse {
    pub billing_id: String,
    pub payment_id: String,
    pub status: BillingStatus,
    pub amount_cents: i64,
    /// PIX copy-and-paste code
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

#[utoipa::path(
    post,
    path = "/billing",
    responses(
        (status = 201, description = "PIX charge created", body = BillingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Payment provider failed"),
        (status = 503, description = "Payments not configured")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "billing"
)]
pub async fn create_billing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<(StatusCode, Json<BillingResponse>), AppError> {
    let billing = state.billing.create_charge(&claims.sub).await?;

    Ok((
        StatusCode::CREATED,
        Json(BillingResponse {
            billing_id: billing.id,
            payment_id: billing.payment_id,
            status: billing.status,
            amount_cents: billing.amount_cents,
            qr_code: billing.qr_code,
            qr_code_base64: billing.qr_code_base64,
            ticket_url: billing.ticket_url,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/billing/webhook",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Notification accepted", body = WebhookAck),
        (status = 400, description = "Body is not a notification"),
        (status = 500, description = "Could not apply the notification, provider should retry")
    ),
    tag = "billing"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    ApiJson(event): ApiJson<WebhookEvent>,
) -> Result<Json<WebhookAck>, AppError> {
    let outcome = state.billing.handle_webhook(&event).await?;

    match outcome {
        WebhookOutcome::Ignored(reason) => tracing::debug!("Webhook ignored: {}", reason),
        other => tracing::info!("Webhook processed: {:?}", other),
    }

    Ok(Json(WebhookAck { received: true }))
}
