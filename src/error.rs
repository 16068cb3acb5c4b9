use crate::config::human_size;
use std::path::PathBuf;

/// Reasons an upload is refused by the media intake.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("not an image: declared type {declared:?}")]
    NotAnImage { declared: Option<String> },

    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),
}

impl IntakeError {
    /// Inline validation message shown next to the upload area.
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::NotAnImage { .. } => "Please choose an image file.".to_string(),
            IntakeError::TooLarge { limit, .. } => {
                format!("Images must be {} or smaller.", human_size(*limit))
            }
            IntakeError::Unreadable { .. } => "The file could not be read.".to_string(),
            IntakeError::MalformedDataUri(_) => "The image data is corrupted.".to_string(),
        }
    }
}

/// Failures reported by the image and video generation services.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("generation timed out")]
    Timeout,

    #[error("invalid generation input: {0}")]
    InvalidInput(String),

    /// Returned by services that noticed their job was cancelled. Never surfaced to the UI.
    #[error("generation cancelled")]
    Cancelled,

    #[error("generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationError::ServiceUnavailable(_) => "service_unavailable",
            GenerationError::Timeout => "timeout",
            GenerationError::InvalidInput(_) => "invalid_input",
            GenerationError::Cancelled => "cancelled",
            GenerationError::Unknown(_) => "unknown",
        }
    }

    /// Whether pressing the same button again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::InvalidInput(_))
    }
}

/// Why a generation request was refused.
///
/// All but [`RequestRejected::WorkerUnavailable`] leave the workflow untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestRejected {
    #[error("no product photo uploaded")]
    MissingMedia,

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("an image is already being generated")]
    ImageInFlight,

    #[error("no generated image to animate")]
    MissingImage,

    #[error("a video is already being generated")]
    VideoInFlight,

    #[error("nothing to retry")]
    NothingToRetry,

    /// The worker could not take the job. Recorded as the stage's last failure.
    #[error("generation worker is not running")]
    WorkerUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
