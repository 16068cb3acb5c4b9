//! Test doubles for the generation services.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
    mpsc,
};
use std::time::{Duration, Instant};
use ugc_workflow::{
    CancelFlag, GenerationError, GenerationOrchestrator, GenerationService, ImageRequest,
    MediaFile, MediaPayload, VideoRequest, WorkflowConfig,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// A service whose every call blocks until the test scripts an outcome for it.
///
/// A call returns `Cancelled` as soon as its job is cancelled.
pub struct Scripted<R> {
    outcomes: mpsc::Receiver<Result<MediaPayload, GenerationError>>,
    seen: Arc<Mutex<Vec<R>>>,
    calls: Arc<AtomicUsize>,
}

/// Test-side handle of a [`Scripted`] service.
pub struct Script<R> {
    outcomes: mpsc::Sender<Result<MediaPayload, GenerationError>>,
    seen: Arc<Mutex<Vec<R>>>,
    calls: Arc<AtomicUsize>,
}

pub fn scripted<R>() -> (Scripted<R>, Script<R>) {
    let (tx, rx) = mpsc::channel();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Scripted {
            outcomes: rx,
            seen: seen.clone(),
            calls: calls.clone(),
        },
        Script {
            outcomes: tx,
            seen,
            calls,
        },
    )
}

impl<R: Clone + Send + 'static> GenerationService for Scripted<R> {
    type Request = R;

    fn run(&mut self, request: R, cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        self.seen.lock().unwrap().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);
        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            match self.outcomes.recv_timeout(Duration::from_millis(5)) {
                Ok(outcome) => return outcome,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(GenerationError::ServiceUnavailable("script dropped".to_string()));
                }
            }
        }
    }
}

impl<R: Clone> Script<R> {
    pub fn succeed(&self, payload: MediaPayload) {
        self.outcomes.send(Ok(payload)).unwrap();
    }

    pub fn fail(&self, error: GenerationError) {
        self.outcomes.send(Err(error)).unwrap();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<R> {
        self.seen.lock().unwrap().clone()
    }

    /// Blocks until the service has been called `n` times.
    pub fn wait_for_calls(&self, n: usize) {
        let until = Instant::now() + WAIT;
        while self.calls() < n {
            assert!(Instant::now() < until, "service was called {} times, expected {n}", self.calls());
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

pub type ScriptedWorkflow = GenerationOrchestrator<Scripted<ImageRequest>, Scripted<VideoRequest>>;

pub fn scripted_workflow(
    config: WorkflowConfig,
) -> (ScriptedWorkflow, Script<ImageRequest>, Script<VideoRequest>) {
    let (images, image_script) = scripted();
    let (videos, video_script) = scripted();
    (
        GenerationOrchestrator::new(config, images, videos),
        image_script,
        video_script,
    )
}

/// Answers immediately: the image is the uploaded photo, the video a fixed clip.
pub struct InstantImages;

impl GenerationService for InstantImages {
    type Request = ImageRequest;

    fn run(&mut self, request: ImageRequest, _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        Ok(MediaPayload::new(request.media.content_type(), request.media.bytes().to_vec()))
    }
}

pub struct InstantVideos;

impl GenerationService for InstantVideos {
    type Request = VideoRequest;

    fn run(&mut self, _request: VideoRequest, _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        Ok(clip())
    }
}

/// Image service whose first call runs for a fixed time and never checks its
/// cancel flag. Later calls answer at once with the upload's name as the image.
pub struct IgnoresCancel {
    first_call: Duration,
    calls: Arc<AtomicUsize>,
}

pub fn ignores_cancel(first_call: Duration) -> (IgnoresCancel, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        IgnoresCancel {
            first_call,
            calls: calls.clone(),
        },
        calls,
    )
}

impl GenerationService for IgnoresCancel {
    type Request = ImageRequest;

    fn run(&mut self, request: ImageRequest, _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(self.first_call);
        }
        Ok(png(request.media.name.as_bytes()))
    }
}

pub fn png(bytes: &[u8]) -> MediaPayload {
    MediaPayload::new("image/png", bytes.to_vec())
}

/// An MP4 header: `ftyp` box with the `mp42` brand.
pub fn clip() -> MediaPayload {
    MediaPayload::new(
        "video/mp4",
        vec![0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0, 0, 0, 0],
    )
}

/// Start of a JFIF file.
pub const JPEG_HEADER: [u8; 4] = [0xff, 0xd8, 0xff, 0xe0];

pub fn photo(name: &str, bytes: usize) -> MediaFile {
    MediaFile::dropped(name, Some("image/jpeg"), vec![0xab; bytes])
}
