//! Payment provider seam used by billing.

pub mod mercado_pago;

use crate::services::collaborators::CollaboratorError;
use async_trait::async_trait;

pub use mercado_pago::MercadoPagoGateway;

#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    pub amount_cents: i64,
    pub description: String,
    pub payer_email: String,
    /// Our billing id, echoed back by the provider
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PaymentStatus {
    /// Map a provider status string. Anything still in flight counts as pending.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" | "refunded" | "charged_back" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PixCharge {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_pix_charge(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PixCharge, CollaboratorError>;

    /// `Ok(None)` when the provider does not know the payment.
    async fn payment_status(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentStatus>, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(PaymentStatus::from_provider("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from_provider("rejected"), PaymentStatus::Rejected);
        assert_eq!(PaymentStatus::from_provider("refunded"), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::from_provider("in_process"), PaymentStatus::Pending);
    }
}
