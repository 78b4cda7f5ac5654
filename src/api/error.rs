use crate::services::accounts::AccountError;
use crate::services::billing::BillingError;
use crate::services::collaborators::CollaboratorError;
use crate::services::pipeline::PipelineError;
use crate::services::plans::PlanError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const NO_IMAGE_MESSAGE: &str = "Nenhuma imagem foi enviada.";
pub const PROCESSING_FAILED_PREFIX: &str = "Erro ao processar a imagem";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// 500 whose message is meant for the client
    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Map a pipeline failure to its HTTP form. With `expose_details` off,
    /// 500 responses carry only the generic prefix.
    pub fn from_pipeline(err: PipelineError, expose_details: bool) -> Self {
        if err.is_client_error() {
            tracing::info!("Rejected upload: {}", err);
        } else {
            tracing::error!("Erro ao processar a requisição: {}", err);
        }

        match err {
            PipelineError::MissingImage => AppError::BadRequest(NO_IMAGE_MESSAGE.to_string()),
            PipelineError::MalformedRequest(reason) => AppError::BadRequest(if expose_details {
                format!("Erro ao processar os dados enviados: {}", reason)
            } else {
                "Erro ao processar os dados enviados.".to_string()
            }),
            PipelineError::ImageTooLarge { limit, .. } => AppError::PayloadTooLarge(format!(
                "A imagem excede o tamanho máximo de {} bytes.",
                limit
            )),
            PipelineError::BodyTooLarge => AppError::PayloadTooLarge(
                "A requisição excede o tamanho máximo permitido.".to_string(),
            ),
            other => AppError::Processing(if expose_details {
                format!("{}: {}", PROCESSING_FAILED_PREFIX, other)
            } else {
                format!("{}.", PROCESSING_FAILED_PREFIX)
            }),
        }
    }
}

/// Fallback for handlers that let `UploadSource` reject on its own. The upload
/// routes extract `Result<UploadSource, _>` and apply the configured exposure.
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        AppError::from_pipeline(self, true).into_response()
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => AppError::BadRequest(msg),
            AccountError::EmailTaken => AppError::Conflict(err.to_string()),
            AccountError::InvalidCredentials | AccountError::Unauthenticated => {
                AppError::Unauthorized(err.to_string())
            }
            AccountError::Forbidden => AppError::Forbidden(err.to_string()),
            AccountError::NotFound => AppError::NotFound(err.to_string()),
            AccountError::Identity(e) => AppError::Internal(e.to_string()),
            AccountError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::UserNotFound => AppError::NotFound(err.to_string()),
            PlanError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::UserNotFound => AppError::NotFound(err.to_string()),
            BillingError::Payment(CollaboratorError::NotConfigured { .. }) => {
                AppError::ServiceUnavailable("Pagamentos indisponíveis no momento".to_string())
            }
            BillingError::Payment(e) => {
                tracing::error!("Payment provider error: {}", e);
                AppError::BadGateway("Falha ao comunicar com o provedor de pagamento".to_string())
            }
            BillingError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Processing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
