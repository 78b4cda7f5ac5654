use super::http_client::error_body;
use super::{CaptionAnswer, Captioner, CollaboratorError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "captioner";

/// Moondream vision-language model (`POST /query`).
pub struct MoondreamCaptioner {
    client: Client,
    base_url: String,
    api_key: SecretString,
    stream: bool,
}

impl MoondreamCaptioner {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString, stream: bool) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            stream,
        }
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    image_url: String,
    question: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    completed: bool,
}

/// Encode image bytes as a data URL, sniffing the image type from its magic
/// bytes. Unknown content is labelled as JPEG.
fn image_data_url(image: &[u8]) -> String {
    let mime = infer::get(image)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or("image/jpeg");
    format!("data:{};base64,{}", mime, STANDARD.encode(image))
}

/// Turn one SSE `data:` payload into at most one text fragment.
fn parse_stream_data(data: &str) -> Option<Result<String, CollaboratorError>> {
    match serde_json::from_str::<StreamChunk>(data.trim()) {
        Ok(StreamChunk {
            chunk: Some(chunk), ..
        }) if !chunk.is_empty() => Some(Ok(chunk)),
        Ok(StreamChunk { completed, .. }) => {
            if completed {
                tracing::debug!("Moondream stream completed");
            }
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
            None
        }
    }
}

#[async_trait]
impl Captioner for MoondreamCaptioner {
    async fn query(
        &self,
        image: &[u8],
        question: &str,
    ) -> Result<CaptionAnswer, CollaboratorError> {
        let url = format!("{}/query", self.base_url);

        tracing::debug!(
            "Moondream query: image_bytes={}, question_len={}, stream={}",
            image.len(),
            question.len(),
            self.stream
        );

        let body = QueryRequest {
            image_url: image_data_url(image),
            question,
            stream: self.stream,
        };

        let response = self
            .client
            .post(&url)
            .header("X-Moondream-Auth", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Moondream request failed: {}", e);
                CollaboratorError::Connection {
                    service: SERVICE,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body(response).await;
            tracing::error!("Moondream API error ({}): {}", status, message);
            return Err(CollaboratorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        if !self.stream {
            let parsed: QueryResponse =
                response.json().await.map_err(|e| CollaboratorError::Decode {
                    service: SERVICE,
                    message: e.to_string(),
                })?;
            return Ok(CaptionAnswer::Complete(parsed.answer));
        }

        let fragments = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => parse_stream_data(&event.data),
                    Err(e) => Some(Err(CollaboratorError::Decode {
                        service: SERVICE,
                        message: e.to_string(),
                    })),
                }
            });

        Ok(CaptionAnswer::Fragmented(fragments.boxed()))
    }
}
