//! The generation workflow: upload and prompt in, image then video out.
//!
//! The orchestrator is owned by a single thread (the UI loop). Service calls run on
//! background workers; their results are applied only from [`GenerationOrchestrator::poll`]
//! or [`GenerationOrchestrator::wait`], so every state change happens on the owner's thread.
//!
//! At most one generation is in flight. Every job carries a [`Ticket`]; a completion
//! whose ticket is not the current job's was superseded and is dropped.
//!
//! A job's timeout counts from the moment its worker starts the service call, so time
//! spent queued behind a superseded call that ignores its [`CancelFlag`] is not charged
//! to the newer job.

use crate::artifact::{ArtifactId, GeneratedImage, GeneratedVideo};
use crate::config::WorkflowConfig;
use crate::engine::{Completion, GenerationWorker, Job, Ticket, WorkerEvent, WorkerState};
use crate::error::{GenerationError, IntakeError, RequestRejected};
use crate::intake::{MediaFile, MediaIntake, UploadedMedia};
use crate::model::{CancelFlag, GenerationService, ImageRequest, Stage, VideoRequest};
use crate::prompt::Prompt;
use std::{
    path::Path,
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

/// Where the workflow is, derived from the in-flight job and the artifacts held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowStatus {
    Idle,
    GeneratingImage,
    ImageReady,
    GeneratingVideo,
    VideoReady,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::GeneratingImage => "generating_image",
            WorkflowStatus::ImageReady => "image_ready",
            WorkflowStatus::GeneratingVideo => "generating_video",
            WorkflowStatus::VideoReady => "video_ready",
        }
    }
}

/// The most recent generation failure, kept until the next accepted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub error: GenerationError,
}

/// State changes applied by `poll` or `wait`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    ImageReady(ArtifactId),
    VideoReady(ArtifactId),
    Failed(Failure),
}

struct InFlight {
    ticket: Ticket,
    cancel: CancelFlag,
    timeout: Duration,
    /// Set when the worker starts the call. Stays `None` while queued, or when the
    /// timeout is too large to represent.
    deadline: Option<Instant>,
}

enum Activity {
    Settled,
    Image { job: InFlight, prompt: String },
    Video { job: InFlight, source: ArtifactId },
}

impl Activity {
    fn job(&self) -> Option<&InFlight> {
        match self {
            Activity::Settled => None,
            Activity::Image { job, .. } | Activity::Video { job, .. } => Some(job),
        }
    }

    fn job_mut(&mut self) -> Option<&mut InFlight> {
        match self {
            Activity::Settled => None,
            Activity::Image { job, .. } | Activity::Video { job, .. } => Some(job),
        }
    }

    fn stage(&self) -> Option<Stage> {
        match self {
            Activity::Settled => None,
            Activity::Image { .. } => Some(Stage::Image),
            Activity::Video { .. } => Some(Stage::Video),
        }
    }
}

/// Sequences image generation then video generation for one project.
pub struct GenerationOrchestrator<I, V>
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    config: WorkflowConfig,
    intake: MediaIntake,
    media: Option<UploadedMedia>,
    intake_notice: Option<String>,
    prompt: Prompt,
    image: Option<GeneratedImage>,
    video: Option<GeneratedVideo>,
    activity: Activity,
    last_failure: Option<Failure>,
    pending: Vec<WorkflowEvent>,
    next_ticket: u64,
    image_worker: GenerationWorker<I>,
    video_worker: GenerationWorker<V>,
    events: mpsc::Receiver<WorkerEvent>,
}

impl<I, V> GenerationOrchestrator<I, V>
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    pub fn new(config: WorkflowConfig, image_service: I, video_service: V) -> Self {
        let (tx, events) = mpsc::channel();
        Self {
            intake: MediaIntake::new(&config),
            prompt: Prompt::new(config.max_prompt_chars),
            config,
            media: None,
            intake_notice: None,
            image: None,
            video: None,
            activity: Activity::Settled,
            last_failure: None,
            pending: Vec::new(),
            next_ticket: 1,
            image_worker: GenerationWorker::new(Stage::Image, image_service, tx.clone()),
            video_worker: GenerationWorker::new(Stage::Video, video_service, tx),
            events,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // -- inputs ------------------------------------------------------------

    /// Validates and stores an upload from either the picker or a drop.
    ///
    /// On failure the current media is kept and the error message is stored for
    /// display. A successful upload cancels an image generation still running on the
    /// previous media.
    pub fn submit_file(&mut self, file: MediaFile) -> Result<UploadedMedia, IntakeError> {
        let result = self.intake.submit(file);
        self.accept_upload(result)
    }

    pub fn submit_path(&mut self, path: impl AsRef<Path>) -> Result<UploadedMedia, IntakeError> {
        let result = self.intake.submit_path(path);
        self.accept_upload(result)
    }

    fn accept_upload(
        &mut self,
        result: Result<UploadedMedia, IntakeError>,
    ) -> Result<UploadedMedia, IntakeError> {
        match result {
            Ok(media) => {
                if matches!(self.activity, Activity::Image { .. }) {
                    log::info!("New upload supersedes the running image generation");
                    self.cancel();
                }
                self.intake_notice = None;
                self.media = Some(media.clone());
                Ok(media)
            }
            Err(e) => {
                log::warn!("Upload rejected: {e}");
                self.intake_notice = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Drops the uploaded media, cancelling an image generation that uses it.
    pub fn clear_media(&mut self) {
        if matches!(self.activity, Activity::Image { .. }) {
            self.cancel();
        }
        self.media = None;
        self.intake_notice = None;
    }

    /// Edits apply to the next request; a running job keeps the prompt it started with.
    pub fn set_prompt(&mut self, text: &str) -> &Prompt {
        self.prompt.set(text)
    }

    pub fn media(&self) -> Option<&UploadedMedia> {
        self.media.as_ref()
    }

    pub fn intake_notice(&self) -> Option<&str> {
        self.intake_notice.as_deref()
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    // -- derived state -----------------------------------------------------

    pub fn generated_image(&self) -> Option<&GeneratedImage> {
        self.image.as_ref()
    }

    pub fn generated_video(&self) -> Option<&GeneratedVideo> {
        self.video.as_ref()
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    pub fn status(&self) -> WorkflowStatus {
        match self.activity {
            Activity::Image { .. } => WorkflowStatus::GeneratingImage,
            Activity::Video { .. } => WorkflowStatus::GeneratingVideo,
            Activity::Settled if self.video.is_some() => WorkflowStatus::VideoReady,
            Activity::Settled if self.image.is_some() => WorkflowStatus::ImageReady,
            Activity::Settled => WorkflowStatus::Idle,
        }
    }

    pub fn is_generating_image(&self) -> bool {
        matches!(self.activity, Activity::Image { .. })
    }

    pub fn is_generating_video(&self) -> bool {
        matches!(self.activity, Activity::Video { .. })
    }

    pub fn can_generate_image(&self) -> bool {
        self.check_image_request().is_ok()
    }

    pub fn can_generate_video(&self) -> bool {
        self.check_video_request().is_ok()
    }

    pub fn worker_states(&self) -> (WorkerState, WorkerState) {
        (self.image_worker.state(), self.video_worker.state())
    }

    fn check_image_request(&self) -> Result<(), RequestRejected> {
        if self.media.is_none() {
            return Err(RequestRejected::MissingMedia);
        }
        if self.prompt.is_empty() {
            return Err(RequestRejected::EmptyPrompt);
        }
        if self.is_generating_image() {
            return Err(RequestRejected::ImageInFlight);
        }
        Ok(())
    }

    fn check_video_request(&self) -> Result<(), RequestRejected> {
        if self.image.is_none() {
            return Err(RequestRejected::MissingImage);
        }
        if self.is_generating_video() {
            return Err(RequestRejected::VideoInFlight);
        }
        if self.is_generating_image() {
            return Err(RequestRejected::ImageInFlight);
        }
        Ok(())
    }

    // -- transitions -------------------------------------------------------

    /// Starts (or restarts) image generation from the current media and prompt.
    ///
    /// Rejected without any state change when the media or prompt is missing or an
    /// image is already being generated. A running video generation is superseded.
    ///
    /// If the image worker is gone the request fails with
    /// [`RequestRejected::WorkerUnavailable`], after recording the failure like any
    /// other so the panel shows it and [`retry`](Self::retry) can re-issue it.
    pub fn request_image(&mut self) -> Result<Ticket, RequestRejected> {
        self.check_image_request()?;
        let Some(media) = self.media.clone() else {
            return Err(RequestRejected::MissingMedia);
        };

        if matches!(self.activity, Activity::Video { .. }) {
            log::info!("Image regeneration supersedes the running video generation");
            self.cancel();
        }

        let prompt = self.prompt.as_str().to_string();
        let job = self.start_job(self.config.image_timeout);
        let ticket = job.ticket;
        let scheduled = self.image_worker.schedule(Job {
            ticket,
            request: ImageRequest {
                media,
                prompt: prompt.clone(),
            },
            cancel: job.cancel.clone(),
        });

        log::debug!("Requested image generation {ticket:?}");
        self.activity = Activity::Image { job, prompt };
        if let Err(e) = scheduled {
            self.fail(Stage::Image, e);
            return Err(RequestRejected::WorkerUnavailable);
        }
        Ok(ticket)
    }

    /// Starts (or restarts) video generation from the current generated image.
    ///
    /// Fails the same way as [`request_image`](Self::request_image) when the video
    /// worker is gone.
    pub fn request_video(&mut self) -> Result<Ticket, RequestRejected> {
        self.check_video_request()?;
        let Some(image) = self.image.clone() else {
            return Err(RequestRejected::MissingImage);
        };

        let source = image.id;
        let job = self.start_job(self.config.video_timeout);
        let ticket = job.ticket;
        let scheduled = self.video_worker.schedule(Job {
            ticket,
            request: VideoRequest { image },
            cancel: job.cancel.clone(),
        });

        log::debug!("Requested video generation {ticket:?} from image {source}");
        self.activity = Activity::Video { job, source };
        if let Err(e) = scheduled {
            self.fail(Stage::Video, e);
            return Err(RequestRejected::WorkerUnavailable);
        }
        Ok(ticket)
    }

    /// Re-issues the stage that failed last.
    pub fn retry(&mut self) -> Result<Ticket, RequestRejected> {
        match self.last_failure.as_ref().map(|f| f.stage) {
            Some(Stage::Image) => self.request_image(),
            Some(Stage::Video) => self.request_video(),
            None => Err(RequestRejected::NothingToRetry),
        }
    }

    /// Abandons the in-flight generation, if any. Its result will be ignored.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.activity, Activity::Settled) {
            Activity::Settled => false,
            Activity::Image { job, .. } | Activity::Video { job, .. } => {
                log::debug!("Cancelled job {:?}", job.ticket);
                job.cancel.cancel();
                true
            }
        }
    }

    /// Cancels any generation and clears inputs, artifacts and errors.
    pub fn reset(&mut self) {
        self.cancel();
        self.media = None;
        self.intake_notice = None;
        self.prompt.set("");
        self.image = None;
        self.video = None;
        self.last_failure = None;
        self.pending.clear();
    }

    fn start_job(&mut self, timeout: Duration) -> InFlight {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.last_failure = None;
        InFlight {
            ticket,
            cancel: CancelFlag::new(),
            timeout,
            deadline: None,
        }
    }

    fn fail(&mut self, stage: Stage, error: GenerationError) {
        if let Some(job) = self.activity.job() {
            job.cancel.cancel();
        }
        log::warn!("{} generation failed: {error}", stage.as_str());
        self.activity = Activity::Settled;
        let failure = Failure { stage, error };
        self.last_failure = Some(failure.clone());
        self.pending.push(WorkflowEvent::Failed(failure));
    }

    // -- completions -------------------------------------------------------

    /// Applies finished generations and expired deadlines without blocking.
    pub fn poll(&mut self) -> Vec<WorkflowEvent> {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.handle(event),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    log::error!("Worker event channel disconnected");
                    break;
                }
            }
        }
        self.expire();
        std::mem::take(&mut self.pending)
    }

    /// Blocks until no generation is in flight or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Vec<WorkflowEvent> {
        // `None` when the timeout does not fit in an `Instant`: wait without bound.
        let until = Instant::now().checked_add(timeout);
        let mut events = self.poll();
        while let Some(job) = self.activity.job() {
            let now = Instant::now();
            if until.is_some_and(|until| now >= until) {
                break;
            }
            let wake = match (until, job.deadline) {
                (Some(until), Some(deadline)) => Some(until.min(deadline)),
                (until, deadline) => until.or(deadline),
            };
            let received = match wake {
                Some(wake) => self.events.recv_timeout(wake.saturating_duration_since(now)),
                None => self
                    .events
                    .recv()
                    .map_err(|_| mpsc::RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => self.handle(event),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    log::error!("Worker event channel disconnected");
                    break;
                }
            }
            events.extend(self.poll());
        }
        events
    }

    fn expire(&mut self) {
        let Some(stage) = self.activity.stage() else {
            return;
        };
        let now = Instant::now();
        if self
            .activity
            .job()
            .and_then(|job| job.deadline)
            .is_some_and(|deadline| now >= deadline)
        {
            self.fail(stage, GenerationError::Timeout);
        }
    }

    fn handle(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Started { stage, ticket, at } => self.start_clock(stage, ticket, at),
            WorkerEvent::Finished(completion) => self.apply(completion),
        }
    }

    fn start_clock(&mut self, stage: Stage, ticket: Ticket, at: Instant) {
        if self.activity.stage() != Some(stage) {
            return;
        }
        let Some(job) = self.activity.job_mut().filter(|job| job.ticket == ticket) else {
            return;
        };
        job.deadline = at.checked_add(job.timeout);
        if job.deadline.is_none() {
            log::debug!("{} job {ticket:?} runs without a deadline", stage.as_str());
        }
    }

    fn apply(&mut self, completion: Completion) {
        let current = self.activity.job().map(|job| job.ticket);
        if current != Some(completion.ticket) || self.activity.stage() != Some(completion.stage) {
            log::warn!(
                "Discarding stale {} completion {:?}",
                completion.stage.as_str(),
                completion.ticket
            );
            return;
        }

        log::info!(
            "{} generation {:?} finished in {:?}",
            completion.stage.as_str(),
            completion.ticket,
            completion.duration
        );

        let payload = match completion.result {
            Ok(payload) => payload,
            Err(GenerationError::Cancelled)
                if self.activity.job().is_some_and(|job| job.cancel.is_cancelled()) =>
            {
                self.activity = Activity::Settled;
                return;
            }
            Err(GenerationError::Cancelled) => {
                self.fail(
                    completion.stage,
                    GenerationError::Unknown("service cancelled a job that was still wanted".to_string()),
                );
                return;
            }
            Err(e) => {
                self.fail(completion.stage, e);
                return;
            }
        };

        let id = ArtifactId(completion.ticket.0);
        match std::mem::replace(&mut self.activity, Activity::Settled) {
            Activity::Image { prompt, .. } => {
                self.image = Some(GeneratedImage {
                    id,
                    payload: Arc::new(payload),
                    prompt,
                });
                // A video always belongs to the current image.
                self.video = None;
                self.pending.push(WorkflowEvent::ImageReady(id));
            }
            Activity::Video { source, .. } => {
                if self.image.as_ref().map(|image| image.id) != Some(source) {
                    log::warn!("Discarding video {id} made from outdated image {source}");
                    return;
                }
                self.video = Some(GeneratedVideo {
                    id,
                    payload: Arc::new(payload),
                    source_image: source,
                });
                self.pending.push(WorkflowEvent::VideoReady(id));
            }
            Activity::Settled => {}
        }
    }
}

impl<I, V> Drop for GenerationOrchestrator<I, V>
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    fn drop(&mut self) {
        // Let workers blocked in a cooperative service call return before they are joined.
        self.cancel();
    }
}
