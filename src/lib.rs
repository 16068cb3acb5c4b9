//! Client-side orchestration for turning a product photo into a lifestyle image and
//! then a short UGC video.
//!
//! A [`GenerationOrchestrator`] owns the uploaded media, the prompt and the generated
//! artifacts. Image and video generation run on background workers that call your
//! [`GenerationService`] implementations; results are applied when the owner calls
//! [`GenerationOrchestrator::poll`], so the calling thread never blocks on a backend.
//!
//! ```no_run
//! use std::time::Duration;
//! use ugc_workflow::{
//!     CancelFlag, GenerationError, GenerationOrchestrator, GenerationService, ImageRequest,
//!     MediaFile, MediaPayload, VideoRequest, WorkflowConfig,
//! };
//!
//! struct MyImages;
//! impl GenerationService for MyImages {
//!     type Request = ImageRequest;
//!     fn run(&mut self, req: ImageRequest, _: &CancelFlag) -> Result<MediaPayload, GenerationError> {
//!         Ok(MediaPayload::new(req.media.content_type(), req.media.bytes().to_vec()))
//!     }
//! }
//!
//! struct MyVideos;
//! impl GenerationService for MyVideos {
//!     type Request = VideoRequest;
//!     fn run(&mut self, _: VideoRequest, _: &CancelFlag) -> Result<MediaPayload, GenerationError> {
//!         Ok(MediaPayload::new("video/mp4", Vec::new()))
//!     }
//! }
//!
//! let mut workflow = GenerationOrchestrator::new(WorkflowConfig::default(), MyImages, MyVideos);
//! workflow.submit_path("product.jpg")?;
//! workflow.set_prompt("wireless headphones, cafe");
//! workflow.request_image()?;
//! workflow.wait(Duration::from_secs(60));
//! workflow.request_video()?;
//! workflow.wait(Duration::from_secs(120));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod artifact;
mod config;
mod engine;
mod error;
mod export;
mod intake;
mod model;
mod orchestrator;
pub mod presenter;
mod prompt;
mod registry;

pub use artifact::{Artifact, ArtifactId, GeneratedImage, GeneratedVideo};
pub use config::{
    DEFAULT_IMAGE_TIMEOUT, DEFAULT_IMAGE_TYPES, DEFAULT_MAX_PROMPT_CHARS, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_VIDEO_TIMEOUT, WorkflowConfig,
};
pub use engine::{Completion, GenerationWorker, Ticket, WorkerEvent, WorkerState};
pub use error::{ExportError, GenerationError, IntakeError, RequestRejected};
pub use export::{Exportable, Exporter, FileExporter};
pub use intake::{MediaFile, MediaIntake, MediaPayload, UploadedMedia};
pub use model::{CancelFlag, GenerationService, ImageRequest, Stage, VideoRequest};
pub use orchestrator::{Failure, GenerationOrchestrator, WorkflowEvent, WorkflowStatus};
pub use prompt::Prompt;
pub use registry::{ProjectId, WorkflowRegistry};
