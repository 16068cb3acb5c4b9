//! Projection of a workflow into what the generator page shows.
//!
//! [`present`] holds no state of its own; calling it after every `poll` is enough
//! to keep a view in sync.

use crate::artifact::{Artifact, GeneratedVideo};
use crate::export::Exportable;
use crate::intake::UploadedMedia;
use crate::model::{GenerationService, ImageRequest, Stage, VideoRequest};
use crate::orchestrator::{Failure, GenerationOrchestrator, WorkflowStatus};

pub const IMAGE_PLACEHOLDER: &str = "Your AI-generated image will appear here";
pub const IMAGE_IN_PROGRESS: &str = "AI is creating your lifestyle image...";
pub const VIDEO_PLACEHOLDER: &str = "Your UGC video will appear here";
pub const VIDEO_IN_PROGRESS: &str = "Creating your UGC video...";
pub const UPLOAD_PROMPT: &str = "Drop your product photo here";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowView {
    pub status: WorkflowStatus,
    pub upload: UploadView,
    /// e.g. `"25/500 characters"`.
    pub prompt_counter: String,
    pub generate_image: ButtonView,
    /// Only offered once an image exists.
    pub generate_video: Option<ButtonView>,
    pub image_panel: PanelView,
    pub video_panel: PanelView,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadView {
    pub preview: Option<UploadedMedia>,
    /// Upload call to action, or `"Replace Image"` once something is uploaded.
    pub label: &'static str,
    /// e.g. `"JPG, PNG up to 10MB"`.
    pub hint: String,
    /// Inline validation message from the last rejected upload.
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonView {
    pub label: &'static str,
    pub enabled: bool,
    /// Show a spinner in the button.
    pub busy: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelView {
    pub state: PanelState,
    pub notice: Option<Notice>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelState {
    Placeholder { message: &'static str },
    InProgress { message: &'static str },
    Ready {
        artifact: Artifact,
        actions: Vec<ActionView>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelAction {
    Regenerate,
    Download,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionView {
    pub action: PanelAction,
    pub label: String,
    pub enabled: bool,
}

/// A failure shown on the panel of the stage that failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub retryable: bool,
}

impl PanelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelState::Placeholder { .. } => "placeholder",
            PanelState::InProgress { .. } => "in_progress",
            PanelState::Ready { .. } => "ready",
        }
    }
}

pub fn present<I, V>(workflow: &GenerationOrchestrator<I, V>) -> WorkflowView
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    let media = workflow.media().cloned();
    let upload = UploadView {
        label: if media.is_some() { "Replace Image" } else { UPLOAD_PROMPT },
        preview: media,
        hint: workflow.config().upload_hint(),
        error: workflow.intake_notice().map(str::to_string),
    };

    let generating_image = workflow.is_generating_image();
    let generating_video = workflow.is_generating_video();

    let generate_image = ButtonView {
        label: if generating_image { "Generating..." } else { "Generate AI Image" },
        enabled: workflow.can_generate_image(),
        busy: generating_image,
    };
    let generate_video = workflow.generated_image().map(|_| ButtonView {
        label: if generating_video { "Creating Video..." } else { "Generate UGC Video" },
        enabled: workflow.can_generate_video(),
        busy: generating_video,
    });

    let failure = workflow.last_failure();

    let image_panel = PanelView {
        state: if generating_image {
            PanelState::InProgress { message: IMAGE_IN_PROGRESS }
        } else if let Some(image) = workflow.generated_image() {
            PanelState::Ready {
                artifact: Artifact::Image(image.clone()),
                actions: vec![
                    action(PanelAction::Regenerate, "Regenerate", workflow.can_generate_image()),
                    action(PanelAction::Download, "Download", true),
                ],
            }
        } else {
            PanelState::Placeholder { message: IMAGE_PLACEHOLDER }
        },
        notice: notice_for(failure, Stage::Image),
    };

    let video_panel = PanelView {
        state: if generating_video {
            PanelState::InProgress { message: VIDEO_IN_PROGRESS }
        } else if let Some(video) = workflow.generated_video() {
            PanelState::Ready {
                artifact: Artifact::Video(video.clone()),
                actions: vec![
                    action(PanelAction::Regenerate, "Regenerate", workflow.can_generate_video()),
                    action(PanelAction::Download, download_label(video), true),
                ],
            }
        } else {
            PanelState::Placeholder { message: VIDEO_PLACEHOLDER }
        },
        notice: notice_for(failure, Stage::Video),
    };

    WorkflowView {
        status: workflow.status(),
        upload,
        prompt_counter: workflow.prompt().counter(),
        generate_image,
        generate_video,
        image_panel,
        video_panel,
    }
}

fn action(action: PanelAction, label: impl Into<String>, enabled: bool) -> ActionView {
    ActionView {
        action,
        label: label.into(),
        enabled,
    }
}

/// e.g. `"Download Video (MP4)"`, naming the container the bytes are actually in.
fn download_label(video: &GeneratedVideo) -> String {
    let format = video
        .extension()
        .map(str::to_string)
        .or_else(|| {
            video
                .content_type()
                .split_once('/')
                .map(|(_, subtype)| subtype.to_string())
        })
        .filter(|format| !format.is_empty());
    match format {
        Some(format) => format!("Download Video ({})", format.to_ascii_uppercase()),
        None => "Download Video".to_string(),
    }
}

fn notice_for(failure: Option<&Failure>, stage: Stage) -> Option<Notice> {
    let failure = failure.filter(|f| f.stage == stage)?;
    let what = match stage {
        Stage::Image => "Image generation",
        Stage::Video => "Video generation",
    };
    let retryable = failure.error.is_retryable();
    let message = if retryable {
        format!("{what} failed: {}. Please try again.", failure.error)
    } else {
        format!("{what} failed: {}.", failure.error)
    };
    Some(Notice { message, retryable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;

    #[test]
    fn notice_only_on_failed_stage() {
        let failure = Failure {
            stage: Stage::Video,
            error: GenerationError::Timeout,
        };
        assert!(notice_for(Some(&failure), Stage::Image).is_none());
        let notice = notice_for(Some(&failure), Stage::Video).unwrap();
        assert!(notice.retryable);
        assert_eq!(notice.message, "Video generation failed: generation timed out. Please try again.");
    }

    fn video(content_type: &str, bytes: Vec<u8>) -> GeneratedVideo {
        GeneratedVideo {
            id: crate::artifact::ArtifactId(2),
            payload: std::sync::Arc::new(crate::intake::MediaPayload::new(content_type, bytes)),
            source_image: crate::artifact::ArtifactId(1),
        }
    }

    #[test]
    fn download_label_names_the_container() {
        let webm = vec![
            0x1a, 0x45, 0xdf, 0xa3, 0x9f, 0x42, 0x86, 0x81, 0x01, 0x42, 0xf7, 0x81, 0x01,
            0x42, 0xf2, 0x81, 0x04, 0x42, 0xf3, 0x81, 0x08, 0x42, 0x82, 0x84, b'w', b'e',
            b'b', b'm', 0x42, 0x87, 0x81, 0x04, 0x42, 0x85, 0x81, 0x02,
        ];
        assert_eq!(download_label(&video("video/webm", webm)), "Download Video (WEBM)");
        assert_eq!(download_label(&video("video/webm", b"clip".to_vec())), "Download Video (WEBM)");
        assert_eq!(download_label(&video("", b"clip".to_vec())), "Download Video");
    }

    #[test]
    fn invalid_input_is_not_retryable() {
        let failure = Failure {
            stage: Stage::Image,
            error: GenerationError::InvalidInput("prompt rejected".to_string()),
        };
        let notice = notice_for(Some(&failure), Stage::Image).unwrap();
        assert!(!notice.retryable);
    }
}
