use super::http_client::error_body;
use super::{CollaboratorError, SpeechSynthesizer};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;

const SERVICE: &str = "speech synthesizer";

/// The `translate_tts` endpoint refuses inputs longer than this.
pub const MAX_SEGMENT_CHARS: usize = 100;

/// Text-to-speech through Google's `translate_tts` endpoint.
///
/// Long texts are cut into segments the endpoint accepts; the MP3 frames of
/// each segment are concatenated, which players handle as one stream.
pub struct GoogleSpeech {
    client: Client,
    base_url: String,
}

impl GoogleSpeech {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_segment(
        &self,
        segment: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Bytes, CollaboratorError> {
        let url = format!("{}/translate_tts", self.base_url);
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = segment.chars().count().to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("q", segment),
                ("tl", lang),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
            ])
            .send()
            .await
            .map_err(|e| CollaboratorError::Connection {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_body(response).await;
            tracing::error!("TTS API error ({}): {}", status, message);
            return Err(CollaboratorError::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response.bytes().await.map_err(|e| CollaboratorError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeech {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, CollaboratorError> {
        let segments = split_for_speech(text, MAX_SEGMENT_CHARS);
        if segments.is_empty() {
            return Err(CollaboratorError::Other("no text to speak".to_string()));
        }

        tracing::debug!(
            "TTS request: lang={}, input_len={}, segments={}",
            lang,
            text.len(),
            segments.len()
        );

        let total = segments.len();
        let mut audio = BytesMut::new();
        for (idx, segment) in segments.iter().enumerate() {
            let part = self.fetch_segment(segment, lang, idx, total).await?;
            audio.extend_from_slice(&part);
        }

        tracing::debug!("TTS synthesis complete, {} bytes", audio.len());
        Ok(audio.freeze())
    }
}

/// Split text into segments of at most `max_chars` characters, breaking on
/// whitespace. Words longer than the limit are cut on char boundaries.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                segments.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed > max_chars {
            segments.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}
