//! Upload-and-describe pipeline.
//!
//! Intake -> Stage -> Describe -> (Synthesize) -> Cleanup, strictly in that
//! order for each request. Requests share nothing but the staging directory.

pub mod describer;
pub mod error;
pub mod intake;
pub mod staging;

pub use describer::{DescribeLanguages, DescriptionResult, Describer};
pub use error::PipelineError;
pub use intake::{IntakeLimits, JsonUpload, UploadRequest, UploadSource};
pub use staging::{StagedFile, Stager};

use crate::config::AppConfig;
use crate::services::collaborators::{Captioner, SpeechSynthesizer, Translator};
use bytes::Bytes;
use std::sync::Arc;

pub const AUDIO_MIME_TYPE: &str = "audio/mpeg";

/// Synthesized speech for a description.
#[derive(Debug, Clone)]
pub struct AudioResult {
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

/// The external services one pipeline needs.
#[derive(Clone)]
pub struct Collaborators {
    pub translator: Arc<dyn Translator>,
    pub captioner: Arc<dyn Captioner>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

pub struct UploadPipeline {
    stager: Stager,
    describer: Describer,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    speech_lang: String,
}

impl UploadPipeline {
    pub fn new(
        stager: Stager,
        describer: Describer,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        speech_lang: impl Into<String>,
    ) -> Self {
        Self {
            stager,
            describer,
            synthesizer,
            speech_lang: speech_lang.into(),
        }
    }

    pub fn from_config(config: &AppConfig, collaborators: Collaborators) -> Self {
        let languages = DescribeLanguages {
            prompt_from: config.prompt_source_lang.clone(),
            prompt_to: config.prompt_target_lang.clone(),
            answer_to: config.answer_target_lang.clone(),
        };
        Self::new(
            Stager::new(&config.staging_dir),
            Describer::new(collaborators.translator, collaborators.captioner, languages),
            collaborators.synthesizer,
            config.speech_lang.clone(),
        )
    }

    pub fn stager(&self) -> &Stager {
        &self.stager
    }

    /// Describe the uploaded image in Portuguese.
    pub async fn describe(&self, request: UploadRequest) -> Result<DescriptionResult, PipelineError> {
        let staged = self
            .stager
            .stage(&request.image_bytes, &request.filename_hint)
            .await?;

        let outcome = self.describer.describe(&staged, &request.prompt).await;

        staged.remove().await;
        outcome
    }

    /// Describe the uploaded image and speak the description.
    pub async fn describe_aloud(&self, request: UploadRequest) -> Result<AudioResult, PipelineError> {
        let staged = self
            .stager
            .stage(&request.image_bytes, &request.filename_hint)
            .await?;

        let outcome = async {
            let description = self.describer.describe(&staged, &request.prompt).await?;
            self.synthesize(&description.text).await
        }
        .await;

        staged.remove().await;
        outcome
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResult, PipelineError> {
        let bytes = self
            .synthesizer
            .synthesize(text, &self.speech_lang)
            .await
            .map_err(PipelineError::SynthesisFailure)?;

        tracing::info!("Synthesized {} bytes of audio", bytes.len());

        Ok(AudioResult {
            bytes,
            mime_type: AUDIO_MIME_TYPE,
        })
    }
}
