use crate::artifact::GeneratedImage;
use crate::error::GenerationError;
use crate::intake::{MediaPayload, UploadedMedia};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Which half of the workflow a job belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Image,
    Video,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Image => "image",
            Stage::Video => "video",
        }
    }
}

/// Shared flag a service can check to abandon a superseded job early.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Snapshot of the inputs at the moment image generation was requested.
#[derive(Clone, Debug)]
pub struct ImageRequest {
    pub media: UploadedMedia,
    pub prompt: String,
}

/// Input of a video generation: the image it animates.
#[derive(Clone, Debug)]
pub struct VideoRequest {
    pub image: GeneratedImage,
}

/// An external generation backend.
///
/// Implementations run on a dedicated worker thread and may block. Every call must
/// return exactly once. Returning [`GenerationError::Cancelled`] after noticing
/// `cancel` is allowed but not required; returning it while `cancel` is unset is
/// reported as a failure. The timeout is counted from the start of `run`.
pub trait GenerationService {
    /// The request type the service accepts.
    type Request: Send + 'static;

    /// Produces the artifact bytes for `request`.
    fn run(
        &mut self,
        request: Self::Request,
        cancel: &CancelFlag,
    ) -> Result<MediaPayload, GenerationError>;
}
