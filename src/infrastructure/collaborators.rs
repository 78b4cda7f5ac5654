use crate::config::AppConfig;
use crate::services::collaborators::http_client::build_http_client;
use crate::services::collaborators::{
    CaptionAnswer, Captioner, CollaboratorError, GoogleSpeech, GoogleTranslator,
    MoondreamCaptioner,
};
use crate::services::payment::{
    MercadoPagoGateway, PaymentGateway, PaymentStatus, PixCharge, PixChargeRequest,
};
use crate::services::pipeline::Collaborators;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::info;

/// Stands in for the captioner when no API key is configured, so the server
/// still boots and every describe request fails with a clear message.
pub struct UnconfiguredCaptioner;

#[async_trait]
impl Captioner for UnconfiguredCaptioner {
    async fn query(&self, _image: &[u8], _question: &str) -> Result<CaptionAnswer, CollaboratorError> {
        Err(CollaboratorError::NotConfigured {
            service: "captioner",
            reason: "API Key não encontrada!".to_string(),
        })
    }
}

pub struct UnconfiguredPaymentGateway;

fn payments_disabled() -> CollaboratorError {
    CollaboratorError::NotConfigured {
        service: "payment provider",
        reason: "MERCADOPAGO_ACCESS_TOKEN is not set".to_string(),
    }
}

#[async_trait]
impl PaymentGateway for UnconfiguredPaymentGateway {
    async fn create_pix_charge(
        &self,
        _request: &PixChargeRequest,
    ) -> Result<PixCharge, CollaboratorError> {
        Err(payments_disabled())
    }

    async fn payment_status(
        &self,
        _payment_id: &str,
    ) -> Result<Option<PaymentStatus>, CollaboratorError> {
        Err(payments_disabled())
    }
}

/// Build the production collaborators from configuration.
pub fn setup_collaborators(
    config: &AppConfig,
) -> anyhow::Result<(Collaborators, Arc<dyn PaymentGateway>)> {
    let client = build_http_client()?;

    let captioner: Arc<dyn Captioner> = match &config.moondream_api_key {
        Some(key) => {
            info!(
                "🔭 Captioner: Moondream at {} (stream={})",
                config.moondream_api_url, config.moondream_stream
            );
            Arc::new(MoondreamCaptioner::new(
                client.clone(),
                &config.moondream_api_url,
                SecretString::from(key.expose_secret().to_owned()),
                config.moondream_stream,
            ))
        }
        None => {
            tracing::warn!("⚠️  MOONDREAM_API_KEY not set, image descriptions will fail");
            Arc::new(UnconfiguredCaptioner)
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.mercadopago_access_token {
        Some(token) => {
            info!("💳 Payments: Mercado Pago at {}", config.mercadopago_api_url);
            Arc::new(MercadoPagoGateway::new(
                client.clone(),
                &config.mercadopago_api_url,
                SecretString::from(token.expose_secret().to_owned()),
            ))
        }
        None => {
            tracing::warn!("⚠️  MERCADOPAGO_ACCESS_TOKEN not set, billing is disabled");
            Arc::new(UnconfiguredPaymentGateway)
        }
    };

    let collaborators = Collaborators {
        translator: Arc::new(GoogleTranslator::new(client.clone(), &config.translate_api_url)),
        captioner,
        synthesizer: Arc::new(GoogleSpeech::new(client, &config.tts_api_url)),
    };

    Ok((collaborators, gateway))
}
