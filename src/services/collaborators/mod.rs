//! External services the describe pipeline talks to.
//!
//! Every collaborator sits behind a trait so handlers and tests can swap the
//! production adapters for fakes.

pub mod google_speech;
pub mod google_translate;
pub mod http_client;
pub mod moondream;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

pub use google_speech::GoogleSpeech;
pub use google_translate::GoogleTranslator;
pub use moondream::MoondreamCaptioner;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} is not configured: {reason}")]
    NotConfigured {
        service: &'static str,
        reason: String,
    },

    #[error("failed to reach {service}: {message}")]
    Connection {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Answer of a captioning call.
///
/// Some models reply with the whole text at once, others stream it in
/// fragments. Consumers call [`CaptionAnswer::assemble`] instead of matching.
pub enum CaptionAnswer {
    Complete(String),
    Fragmented(BoxStream<'static, Result<String, CollaboratorError>>),
}

impl CaptionAnswer {
    /// Wait for the full answer. Fragments are concatenated in arrival order
    /// until the stream ends; the first failing fragment aborts assembly.
    pub async fn assemble(self) -> Result<String, CollaboratorError> {
        match self {
            CaptionAnswer::Complete(text) => Ok(text),
            CaptionAnswer::Fragmented(mut fragments) => {
                let mut assembled = String::new();
                while let Some(fragment) = fragments.next().await {
                    assembled.push_str(&fragment?);
                }
                Ok(assembled)
            }
        }
    }
}

impl std::fmt::Debug for CaptionAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionAnswer::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            CaptionAnswer::Fragmented(_) => f.write_str("Fragmented(..)"),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `to`. `from = None` lets the service detect the
    /// source language.
    async fn translate(
        &self,
        text: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait Captioner: Send + Sync {
    /// Ask a natural-language `question` about an image.
    async fn query(&self, image: &[u8], question: &str)
    -> Result<CaptionAnswer, CollaboratorError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `lang`, returning MPEG audio.
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, CollaboratorError>;
}
