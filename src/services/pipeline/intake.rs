use super::PipelineError;
use crate::utils::validation::sanitize_filename;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use utoipa::ToSchema;

/// Standard alphabet, padding optional. Mobile clients are inconsistent about it.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// JSON upload body: `{ "image": "<base64>", "prompt": "..." }`
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JsonUpload {
    /// Base64 image, optionally as a `data:<mime>;base64,` URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug)]
pub struct FilePart {
    pub bytes: Bytes,
    pub file_name: Option<String>,
}

/// How an image arrived, decoded eagerly from the request.
#[derive(Debug)]
pub enum UploadSource {
    Multipart {
        file: Option<FilePart>,
        prompt: Option<String>,
    },
    Json(JsonUpload),
}

/// Normalized upload, independent of the intake shape.
#[derive(Debug)]
pub struct UploadRequest {
    pub image_bytes: Bytes,
    pub prompt: String,
    pub filename_hint: String,
}

pub struct IntakeLimits<'a> {
    pub default_prompt: &'a str,
    pub max_image_size: usize,
}

impl UploadSource {
    /// Collapse either intake shape into an [`UploadRequest`].
    pub fn normalize(
        self,
        limits: &IntakeLimits<'_>,
        now_millis: i64,
    ) -> Result<UploadRequest, PipelineError> {
        let (image_bytes, prompt, file_name) = match self {
            UploadSource::Multipart { file, prompt } => {
                let file = file.ok_or(PipelineError::MissingImage)?;
                (file.bytes, prompt, file.file_name)
            }
            UploadSource::Json(body) => {
                let encoded = body.image.ok_or(PipelineError::MissingImage)?;
                (decode_base64_image(&encoded)?, body.prompt, None)
            }
        };

        if image_bytes.is_empty() {
            return Err(PipelineError::MissingImage);
        }

        if image_bytes.len() > limits.max_image_size {
            return Err(PipelineError::ImageTooLarge {
                size: image_bytes.len(),
                limit: limits.max_image_size,
            });
        }

        let prompt = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| limits.default_prompt.to_string());

        Ok(UploadRequest {
            image_bytes,
            prompt,
            filename_hint: filename_hint(file_name.as_deref(), now_millis),
        })
    }
}

/// `{millis}-{original}` when the client sent a usable name, otherwise
/// `upload-{millis}.jpg`.
pub fn filename_hint(original: Option<&str>, now_millis: i64) -> String {
    match original.map(sanitize_filename) {
        Some(Ok(name)) => format!("{}-{}", now_millis, name),
        Some(Err(e)) => {
            tracing::debug!("Ignoring unusable upload filename: {}", e);
            format!("upload-{}.jpg", now_millis)
        }
        None => format!("upload-{}.jpg", now_millis),
    }
}

/// Decode a base64 payload, accepting a `data:` URL prefix and embedded
/// whitespace.
pub fn decode_base64_image(encoded: &str) -> Result<Bytes, PipelineError> {
    let payload = match encoded.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::MalformedRequest("data URL without payload".to_string()))?,
        None => encoded,
    };

    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(PipelineError::MissingImage);
    }

    LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map(Bytes::from)
        .map_err(|e| PipelineError::MalformedRequest(format!("invalid base64 image: {}", e)))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
}

fn multipart_error(err: MultipartError) -> PipelineError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::BodyTooLarge
    } else {
        PipelineError::MalformedRequest(err.body_text())
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadSource, PipelineError> {
    let mut file: Option<FilePart> = None;
    let mut prompt = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if let Some(name) = field.file_name() {
            // Only the first non-empty file counts; later ones are drained by next_field.
            // Untouched file inputs arrive as `filename=""` with no bytes.
            if file.is_some() || name.is_empty() {
                continue;
            }
            let file_name = Some(name.to_string());
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.is_empty() {
                continue;
            }
            file = Some(FilePart { bytes, file_name });
        } else if field.name() == Some("prompt") {
            prompt = Some(field.text().await.map_err(multipart_error)?);
        }
    }

    Ok(UploadSource::Multipart { file, prompt })
}

#[async_trait]
impl<S> FromRequest<S> for UploadSource
where
    S: Send + Sync,
{
    type Rejection = PipelineError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(req.headers()) {
            let body = Bytes::from_request(req, state).await.map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    PipelineError::BodyTooLarge
                } else {
                    PipelineError::MalformedRequest(rejection.body_text())
                }
            })?;
            let upload: JsonUpload = serde_json::from_slice(&body)
                .map_err(|e| PipelineError::MalformedRequest(format!("invalid JSON body: {}", e)))?;
            return Ok(UploadSource::Json(upload));
        }

        match Multipart::from_request(req, state).await {
            Ok(multipart) => read_multipart(multipart).await,
            Err(rejection) => {
                // Not multipart at all: there is no image to find
                tracing::debug!("Upload is neither JSON nor multipart: {}", rejection.body_text());
                Err(PipelineError::MissingImage)
            }
        }
    }
}
