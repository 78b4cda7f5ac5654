use super::{PipelineError, StagedFile};
use crate::services::collaborators::{Captioner, Translator};
use std::sync::Arc;

/// Final Portuguese description of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionResult {
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DescribeLanguages {
    /// Language the prompt is written in
    pub prompt_from: String,
    /// Language the captioner is asked in
    pub prompt_to: String,
    /// Language of the returned description
    pub answer_to: String,
}

impl Default for DescribeLanguages {
    fn default() -> Self {
        Self {
            prompt_from: "pt".to_string(),
            prompt_to: "en".to_string(),
            answer_to: "pt".to_string(),
        }
    }
}

/// Translate the prompt, ask the captioner, translate the answer back.
pub struct Describer {
    translator: Arc<dyn Translator>,
    captioner: Arc<dyn Captioner>,
    languages: DescribeLanguages,
}

impl Describer {
    pub fn new(
        translator: Arc<dyn Translator>,
        captioner: Arc<dyn Captioner>,
        languages: DescribeLanguages,
    ) -> Self {
        Self {
            translator,
            captioner,
            languages,
        }
    }

    pub async fn describe(
        &self,
        staged: &StagedFile,
        prompt: &str,
    ) -> Result<DescriptionResult, PipelineError> {
        tracing::info!("Translating prompt: input_len={}", prompt.len());
        tracing::debug!("Prompt: {:?}", prompt);
        let question = self
            .translator
            .translate(
                prompt,
                Some(&self.languages.prompt_from),
                &self.languages.prompt_to,
            )
            .await
            .map_err(PipelineError::TranslationFailure)?;
        tracing::debug!("Translated prompt: {:?}", question);

        let image = staged.read().await?;

        let answer = self
            .captioner
            .query(&image, &question)
            .await
            .map_err(PipelineError::CaptioningFailure)?
            .assemble()
            .await
            .map_err(PipelineError::CaptioningFailure)?;
        tracing::info!("Captioner answered: answer_len={}", answer.len());
        tracing::debug!("Captioner answer: {:?}", answer);

        let text = self
            .translator
            .translate(&answer, None, &self.languages.answer_to)
            .await
            .map_err(PipelineError::TranslationFailure)?;

        Ok(DescriptionResult { text })
    }
}
