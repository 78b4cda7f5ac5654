use crate::entities::billings::BillingStatus;
use crate::entities::{billings, prelude::*};
use crate::services::collaborators::CollaboratorError;
use crate::services::payment::{PaymentGateway, PaymentStatus, PixChargeRequest};
use crate::services::plans::{PlanError, PlanService, grant_premium_on};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("payment provider error: {0}")]
    Payment(#[from] CollaboratorError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<PlanError> for BillingError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::UserNotFound => BillingError::UserNotFound,
            PlanError::Database(e) => BillingError::Database(e),
        }
    }
}

/// Payment notification: `{ "type": "payment", "action": "payment.updated", "data": { "id": "123" } }`
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookData {
    /// Payment id, number or string
    #[schema(value_type = Object)]
    pub id: Value,
}

impl WebhookEvent {
    fn is_payment(&self) -> bool {
        self.kind.as_deref() == Some("payment")
            || self
                .action
                .as_deref()
                .is_some_and(|a| a.starts_with("payment."))
    }

    fn payment_id(&self) -> Option<String> {
        match &self.data.as_ref()?.id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Billing marked paid and premium granted
    Activated,
    /// Approved before; nothing changed
    AlreadyProcessed,
    Recorded(BillingStatus),
    Unchanged,
    Ignored(&'static str),
}

pub struct BillingService {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    plans: Arc<PlanService>,
}

impl BillingService {
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn PaymentGateway>,
        plans: Arc<PlanService>,
    ) -> Self {
        Self { db, gateway, plans }
    }

    /// Open a PIX charge for the premium plan.
    pub async fn create_charge(&self, uid: &str) -> Result<billings::Model, BillingError> {
        let user = Users::find_by_id(uid.to_string())
            .one(&self.db)
            .await?
            .ok_or(BillingError::UserNotFound)?;

        let billing_id = Uuid::new_v4().to_string();
        let amount_cents = self.plans.premium_price_cents();

        let charge = self
            .gateway
            .create_pix_charge(&PixChargeRequest {
                amount_cents,
                description: format!(
                    "AcessiVision Premium - {} dias",
                    self.plans.duration_days()
                ),
                payer_email: user.email,
                external_reference: billing_id.clone(),
            })
            .await?;

        // Approved charges are stored pending and go through the same activation
        // as a webhook, so the premium grant happens exactly once
        let opening_status = match charge.status {
            PaymentStatus::Rejected => BillingStatus::Rejected,
            PaymentStatus::Cancelled => BillingStatus::Cancelled,
            PaymentStatus::Pending | PaymentStatus::Approved => BillingStatus::Pending,
        };

        let billing = billings::ActiveModel {
            id: Set(billing_id),
            user_id: Set(uid.to_string()),
            payment_id: Set(charge.payment_id),
            amount_cents: Set(amount_cents),
            status: Set(opening_status),
            qr_code: Set(charge.qr_code),
            qr_code_base64: Set(charge.qr_code_base64),
            ticket_url: Set(charge.ticket_url),
            created_at: Set(Utc::now()),
            paid_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "💳 PIX charge {} opened for {} ({} cents)",
            billing.payment_id,
            uid,
            amount_cents
        );

        if charge.status == PaymentStatus::Approved {
            self.activate(&billing).await?;
            let paid = Billings::find_by_id(billing.id.clone())
                .one(&self.db)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("billing {}", billing.id)))?;
            return Ok(paid);
        }

        Ok(billing)
    }

    /// Apply a payment notification. Safe to call any number of times for the
    /// same payment.
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        if !event.is_payment() {
            return Ok(WebhookOutcome::Ignored("not a payment event"));
        }
        let Some(payment_id) = event.payment_id() else {
            return Ok(WebhookOutcome::Ignored("missing payment id"));
        };

        let Some(billing) = Billings::find()
            .filter(billings::Column::PaymentId.eq(payment_id.as_str()))
            .one(&self.db)
            .await?
        else {
            tracing::warn!("Webhook for unknown payment {}", payment_id);
            return Ok(WebhookOutcome::Ignored("unknown payment"));
        };

        if billing.status == BillingStatus::Paid {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let Some(status) = self.gateway.payment_status(&payment_id).await? else {
            tracing::warn!("Payment provider does not know payment {}", payment_id);
            return Ok(WebhookOutcome::Ignored("unknown payment"));
        };

        match status {
            PaymentStatus::Approved => self.activate(&billing).await,
            PaymentStatus::Rejected => self.record(&billing, BillingStatus::Rejected).await,
            PaymentStatus::Cancelled => self.record(&billing, BillingStatus::Cancelled).await,
            PaymentStatus::Pending => Ok(WebhookOutcome::Unchanged),
        }
    }

    async fn activate(&self, billing: &billings::Model) -> Result<WebhookOutcome, BillingError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        // Only the delivery that flips the row grants the plan
        let flipped = Billings::update_many()
            .set(billings::ActiveModel {
                status: Set(BillingStatus::Paid),
                paid_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(billings::Column::Id.eq(billing.id.as_str()))
            .filter(billings::Column::Status.ne(BillingStatus::Paid))
            .exec(&txn)
            .await?
            .rows_affected;

        if flipped == 0 {
            txn.rollback().await?;
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        grant_premium_on(&txn, &billing.user_id, self.plans.duration_days(), now).await?;
        txn.commit().await?;

        tracing::info!("✅ Payment {} approved for {}", billing.payment_id, billing.user_id);
        Ok(WebhookOutcome::Activated)
    }

    async fn record(
        &self,
        billing: &billings::Model,
        status: BillingStatus,
    ) -> Result<WebhookOutcome, BillingError> {
        Billings::update_many()
            .set(billings::ActiveModel {
                status: Set(status),
                ..Default::default()
            })
            .filter(billings::Column::Id.eq(billing.id.as_str()))
            .filter(billings::Column::Status.eq(BillingStatus::Pending))
            .exec(&self.db)
            .await?;

        tracing::info!("Payment {} is now {:?}", billing.payment_id, status);
        Ok(WebhookOutcome::Recorded(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(value: Value) -> WebhookEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_payment_id_accepts_number_or_string() {
        let numeric = event(serde_json::json!({ "type": "payment", "data": { "id": 42 } }));
        assert!(numeric.is_payment());
        assert_eq!(numeric.payment_id().as_deref(), Some("42"));

        let text = event(serde_json::json!({ "action": "payment.updated", "data": { "id": " 7 " } }));
        assert!(text.is_payment());
        assert_eq!(text.payment_id().as_deref(), Some("7"));
    }

    #[test]
    fn test_non_payment_events_are_recognized() {
        let other = event(serde_json::json!({ "type": "merchant_order", "data": { "id": 1 } }));
        assert!(!other.is_payment());

        let empty = WebhookEvent::default();
        assert!(!empty.is_payment());
        assert_eq!(empty.payment_id(), None);
    }
}
