use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::bearer_token;
use crate::services::pipeline::{IntakeLimits, PipelineError, UploadRequest, UploadSource};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DescriptionResponse {
    pub description: String,
}

/// Multipart form accepted by the upload routes
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub prompt: Option<String>,
}

/// Extraction failures go through here too so `EXPOSE_ERROR_DETAILS` applies to them.
fn normalize(
    state: &AppState,
    source: Result<UploadSource, PipelineError>,
) -> Result<UploadRequest, AppError> {
    let limits = IntakeLimits {
        default_prompt: &state.config.default_prompt,
        max_image_size: state.config.max_upload_size,
    };
    source
        .and_then(|source| source.normalize(&limits, Utc::now().timestamp_millis()))
        .map_err(|e| AppError::from_pipeline(e, state.config.expose_error_details))
}

/// Signed-in users get the description saved to their history. Anonymous
/// uploads and history failures never affect the response.
async fn remember(state: &AppState, headers: &HeaderMap, prompt: &str, description: &str) {
    let Some(token) = bearer_token(headers) else {
        return;
    };
    let claims = match state.accounts.authenticate(token).await {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Not recording conversation: {}", e);
            return;
        }
    };
    if let Err(e) = state
        .accounts
        .record_conversation(&claims.sub, prompt, description)
        .await
    {
        tracing::warn!("Failed to record conversation for {}: {}", claims.sub, e);
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "Also accepts `application/json` with a base64 `image` field"
    ),
    responses(
        (status = 200, description = "Portuguese description of the image", body = DescriptionResponse),
        (status = 400, description = "No image was sent"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "A collaborator failed")
    ),
    tag = "describe"
)]
pub async fn describe_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    source: Result<UploadSource, PipelineError>,
) -> Result<Json<DescriptionResponse>, AppError> {
    let request = normalize(&state, source)?;
    let prompt = request.prompt.clone();

    tracing::info!(
        "🖼️  Describing {} bytes ({})",
        request.image_bytes.len(),
        request.filename_hint
    );

    let result = state
        .pipeline
        .describe(request)
        .await
        .map_err(|e| AppError::from_pipeline(e, state.config.expose_error_details))?;

    remember(&state, &headers, &prompt, &result.text).await;

    Ok(Json(DescriptionResponse {
        description: result.text,
    }))
}

#[utoipa::path(
    post,
    path = "/upload/audio",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "Also accepts `application/json` with a base64 `image` field"
    ),
    responses(
        (status = 200, description = "Spoken description", content_type = "audio/mpeg"),
        (status = 400, description = "No image was sent"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "A collaborator failed")
    ),
    tag = "describe"
)]
pub async fn describe_image_aloud(
    State(state): State<AppState>,
    source: Result<UploadSource, PipelineError>,
) -> Result<Response, AppError> {
    let request = normalize(&state, source)?;

    let audio = state
        .pipeline
        .describe_aloud(request)
        .await
        .map_err(|e| AppError::from_pipeline(e, state.config.expose_error_details))?;

    tracing::info!("🔊 Sending {} bytes of audio", audio.bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, audio.mime_type),
            (header::CONTENT_DISPOSITION, "inline; filename=\"audio.mp3\""),
        ],
        audio.bytes,
    )
        .into_response())
}
