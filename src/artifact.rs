use crate::intake::MediaPayload;
use std::{fmt, sync::Arc};

/// Identifies one generated artifact; equal to the ticket of the job that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output of image generation; the input of video generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: ArtifactId,
    pub payload: Arc<MediaPayload>,
    /// Prompt the image was generated from.
    pub prompt: String,
}

/// Output of video generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub id: ArtifactId,
    pub payload: Arc<MediaPayload>,
    /// The image this video was generated from.
    pub source_image: ArtifactId,
}

/// Either artifact, as handed to the presenter and to exporters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    Image(GeneratedImage),
    Video(GeneratedVideo),
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        match self {
            Artifact::Image(image) => image.id,
            Artifact::Video(video) => video.id,
        }
    }

    pub fn payload(&self) -> &MediaPayload {
        match self {
            Artifact::Image(image) => &image.payload,
            Artifact::Video(video) => &video.payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Image(_) => "image",
            Artifact::Video(_) => "video",
        }
    }
}
