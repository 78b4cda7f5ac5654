use crate::services::collaborators::CollaboratorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no image was supplied")]
    MissingImage,

    #[error("malformed upload: {0}")]
    MalformedRequest(String),

    #[error("image of {size} bytes exceeds the {limit} byte limit")]
    ImageTooLarge { size: usize, limit: usize },

    #[error("upload body exceeds the configured limit")]
    BodyTooLarge,

    #[error("staging failed: {0}")]
    StorageFailure(String),

    #[error("translation failed: {0}")]
    TranslationFailure(#[source] CollaboratorError),

    #[error("captioning failed: {0}")]
    CaptioningFailure(#[source] CollaboratorError),

    #[error("speech synthesis failed: {0}")]
    SynthesisFailure(#[source] CollaboratorError),
}

impl PipelineError {
    /// Client mistakes, as opposed to failures of the server or a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingImage
                | PipelineError::MalformedRequest(_)
                | PipelineError::ImageTooLarge { .. }
                | PipelineError::BodyTooLarge
        )
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::StorageFailure(err.to_string())
    }
}
