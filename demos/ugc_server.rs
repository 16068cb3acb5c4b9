use argh::FromArgs;
use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use reqwest::StatusCode;
use serde_json::json;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use ugc_workflow::{
    CancelFlag, Exporter, FileExporter, GenerationError, GenerationOrchestrator, GenerationService,
    ImageRequest, MediaPayload, ProjectId, RequestRejected, Ticket, VideoRequest, WorkflowConfig,
    WorkflowRegistry,
    presenter::{PanelState, PanelView, present},
};

mod messages;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_IMAGE_DELAY_MS: u64 = 3000;
const DEFAULT_VIDEO_DELAY_MS: u64 = 4000;

#[derive(FromArgs)]
/// Serves the UGC generation workflow over HTTP, one workflow per project.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// how long the stand-in image backend takes, in milliseconds
    #[argh(option, default = "DEFAULT_IMAGE_DELAY_MS")]
    image_delay_ms: u64,

    /// how long the stand-in video backend takes, in milliseconds
    #[argh(option, default = "DEFAULT_VIDEO_DELAY_MS")]
    video_delay_ms: u64,

    /// image generation timeout, in seconds
    #[argh(option, default = "120")]
    image_timeout_secs: u64,

    /// video generation timeout, in seconds
    #[argh(option, default = "300")]
    video_timeout_secs: u64,

    /// directory downloads are written to
    #[argh(option, default = "PathBuf::from(\"downloads\")")]
    download_dir: PathBuf,
}

// stand-in backends: sleep, then echo the product photo / return a fixed clip
struct StandInImages {
    delay: Duration,
}

struct StandInVideos {
    delay: Duration,
}

fn sleep_unless_cancelled(delay: Duration, cancel: &CancelFlag) -> Result<(), GenerationError> {
    let until = Instant::now() + delay;
    while Instant::now() < until {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

impl GenerationService for StandInImages {
    type Request = ImageRequest;

    fn run(&mut self, request: ImageRequest, cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        log::info!("Generating image for prompt {:?}", request.prompt);
        sleep_unless_cancelled(self.delay, cancel)?;
        Ok(MediaPayload::new(request.media.content_type(), request.media.bytes().to_vec()))
    }
}

impl GenerationService for StandInVideos {
    type Request = VideoRequest;

    fn run(&mut self, request: VideoRequest, cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
        log::info!("Generating video from image {}", request.image.id);
        sleep_unless_cancelled(self.delay, cancel)?;
        Ok(MediaPayload::new("video/mp4", b"\0\0\0\x18ftypmp42".to_vec()))
    }
}

type Registry = WorkflowRegistry<StandInImages, StandInVideos>;

#[derive(Clone)]
struct AppState {
    registry: Arc<Mutex<Registry>>,
    download_dir: PathBuf,
}

impl AppState {
    fn with_workflow<T>(
        &self,
        project: &str,
        f: impl FnOnce(&mut GenerationOrchestrator<StandInImages, StandInVideos>) -> T,
    ) -> T {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let workflow = registry.get_or_create(&ProjectId::from(project));
        workflow.poll();
        f(workflow)
    }
}

fn bad_request(message: impl ToString) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.to_string() })),
    )
}

fn scheduled(result: Result<Ticket, RequestRejected>) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(ticket) => (StatusCode::OK, Json(json!({ "status": "scheduled", "ticket": ticket.0 }))),
        Err(e @ RequestRejected::WorkerUnavailable) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))),
    }
}

async fn post_media(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(payload): Json<messages::UploadRequest>,
) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| {
        match workflow.submit_path(&payload.image_path) {
            Ok(media) => {
                log::info!("Project {project}: uploaded {}", media.name);
                (
                    StatusCode::OK,
                    Json(json!({ "status": "uploaded", "name": media.name, "size": media.len() })),
                )
            }
            Err(e) => {
                log::debug!("Project {project}: upload rejected: {e}");
                bad_request(e.user_message())
            }
        }
    })
}

async fn put_prompt(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(payload): Json<messages::PromptRequest>,
) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| {
        let prompt = workflow.set_prompt(&payload.prompt);
        (
            StatusCode::OK,
            Json(json!({
                "prompt": prompt.as_str(),
                "counter": prompt.counter(),
                "truncated": prompt.was_truncated(),
            })),
        )
    })
}

async fn post_image(State(state): State<AppState>, Path(project): Path<String>) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| scheduled(workflow.request_image()))
}

async fn post_video(State(state): State<AppState>, Path(project): Path<String>) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| scheduled(workflow.request_video()))
}

async fn post_retry(State(state): State<AppState>, Path(project): Path<String>) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| scheduled(workflow.retry()))
}

async fn post_download(
    State(state): State<AppState>,
    Path((project, kind)): Path<(String, String)>,
) -> impl IntoResponse {
    let download_dir = state.download_dir.clone();
    state.with_workflow(&project, |workflow| {
        let mut exporter = FileExporter::new(download_dir.join(&project));
        let exported = match kind.as_str() {
            "image" => workflow.generated_image().map(|image| exporter.export(image)),
            "video" => workflow.generated_video().map(|video| exporter.export(video)),
            other => return bad_request(format!("unknown artifact kind: {other}")),
        };
        match exported {
            Some(Ok(path)) => (StatusCode::OK, Json(json!({ "path": path }))),
            Some(Err(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ),
            None => (StatusCode::NOT_FOUND, Json(json!({ "error": format!("no {kind} yet") }))),
        }
    })
}

async fn get_workflow(State(state): State<AppState>, Path(project): Path<String>) -> impl IntoResponse {
    state.with_workflow(&project, |workflow| {
        let view = present(workflow);
        let response = messages::WorkflowResponse {
            status: view.status.as_str().to_string(),
            upload: view.upload.preview.as_ref().map(|media| media.name.clone()),
            upload_error: view.upload.error.clone(),
            prompt: workflow.prompt().as_str().to_string(),
            prompt_counter: view.prompt_counter.clone(),
            can_generate_image: view.generate_image.enabled,
            can_generate_video: view.generate_video.as_ref().is_some_and(|b| b.enabled),
            image: panel_response(&view.image_panel),
            video: panel_response(&view.video_panel),
        };
        (StatusCode::OK, Json(json!(response)))
    })
}

async fn delete_workflow(State(state): State<AppState>, Path(project): Path<String>) -> impl IntoResponse {
    let removed = state
        .registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&ProjectId::from(project.as_str()));
    if removed {
        (StatusCode::OK, Json(json!({ "status": "removed" })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown project" })))
    }
}

fn panel_response(panel: &PanelView) -> messages::PanelResponse {
    let (message, artifact, actions) = match &panel.state {
        PanelState::Placeholder { message } | PanelState::InProgress { message } => {
            (Some(message.to_string()), None, Vec::new())
        }
        PanelState::Ready { artifact, actions } => (
            None,
            Some(artifact),
            actions
                .iter()
                .map(|a| messages::ActionResponse {
                    action: format!("{:?}", a.action).to_lowercase(),
                    label: a.label.to_string(),
                    enabled: a.enabled,
                })
                .collect(),
        ),
    };
    messages::PanelResponse {
        state: panel.state.as_str().to_string(),
        message,
        artifact_id: artifact.map(|a| a.id().0),
        content_type: artifact.map(|a| a.payload().content_type.clone()),
        size: artifact.map(|a| a.payload().len()),
        actions,
        notice: panel.notice.as_ref().map(|n| n.message.clone()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let config = WorkflowConfig::default()
        .with_image_timeout(Duration::from_secs(args.image_timeout_secs))
        .with_video_timeout(Duration::from_secs(args.video_timeout_secs));
    let (image_delay, video_delay) = (
        Duration::from_millis(args.image_delay_ms),
        Duration::from_millis(args.video_delay_ms),
    );
    let registry = WorkflowRegistry::new(config, move || {
        (
            StandInImages { delay: image_delay },
            StandInVideos { delay: video_delay },
        )
    });

    let state = AppState {
        registry: Arc::new(Mutex::new(registry)),
        download_dir: args.download_dir,
    };

    let app = Router::new()
        .route("/", get(|| async { "Welcome to the UGC generator!" }))
        .route("/projects/{project}", get(get_workflow).delete(delete_workflow))
        .route("/projects/{project}/media", post(post_media))
        .route("/projects/{project}/prompt", put(put_prompt))
        .route("/projects/{project}/image", post(post_image))
        .route("/projects/{project}/video", post(post_video))
        .route("/projects/{project}/retry", post(post_retry))
        .route("/projects/{project}/download/{kind}", post(post_download))
        .with_state(state);

    log::info!("Starting the server");
    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
