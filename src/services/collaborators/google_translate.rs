use super::http_client::error_body;
use super::{CollaboratorError, Translator};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const SERVICE: &str = "translator";

/// Translator backed by Google's public `translate_a/single` endpoint.
pub struct GoogleTranslator {
    client: Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<String, CollaboratorError> {
        // The endpoint rejects empty queries; nothing to translate anyway.
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let url = format!("{}/translate_a/single", self.base_url);
        let source = from.unwrap_or("auto");

        tracing::debug!(
            "Translate request: {} -> {}, input_len={}",
            source,
            to,
            text.len()
        );

        let response = self
            .client
            .post(&url)
            .query(&[("client", "gtx"), ("sl", source), ("tl", to), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await
            .map_err(|e| CollaboratorError::Connection {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body(response).await;
            tracing::error!("Translate API error ({}): {}", status, message);
            return Err(CollaboratorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.map_err(|e| CollaboratorError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;

        parse_translation(&body).ok_or_else(|| CollaboratorError::Decode {
            service: SERVICE,
            message: "missing translated sentences".to_string(),
        })
    }
}

/// The endpoint answers with `[[["translated", "original", ...], ...], ...]`,
/// one inner array per sentence.
fn parse_translation(body: &Value) -> Option<String> {
    let sentences = body.get(0)?.as_array()?;
    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();
    Some(translated)
}
