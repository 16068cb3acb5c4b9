use crate::artifact::{Artifact, GeneratedImage, GeneratedVideo};
use crate::error::ExportError;
use std::path::PathBuf;

/// Something that can be saved to the user's device.
pub trait Exportable {
    /// Suggested file name, including the extension.
    fn file_name(&self) -> String;
    fn content_type(&self) -> &str;
    fn bytes(&self) -> &[u8];

    /// File extension of the encoded bytes, when their signature is recognised.
    fn extension(&self) -> Option<&'static str> {
        infer::get(self.bytes()).map(|kind| kind.extension())
    }
}

impl Exportable for GeneratedImage {
    fn file_name(&self) -> String {
        format!("ugc-image-{}.{}", self.id, self.extension().unwrap_or("bin"))
    }

    fn content_type(&self) -> &str {
        &self.payload.content_type
    }

    fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }
}

impl Exportable for GeneratedVideo {
    fn file_name(&self) -> String {
        format!("ugc-video-{}.{}", self.id, self.extension().unwrap_or("bin"))
    }

    fn content_type(&self) -> &str {
        &self.payload.content_type
    }

    fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }
}

impl Exportable for Artifact {
    fn file_name(&self) -> String {
        match self {
            Artifact::Image(image) => image.file_name(),
            Artifact::Video(video) => video.file_name(),
        }
    }

    fn content_type(&self) -> &str {
        &self.payload().content_type
    }

    fn bytes(&self) -> &[u8] {
        &self.payload().bytes
    }
}

/// Delivers an artifact to the user.
pub trait Exporter {
    type Output;

    fn export(&mut self, artifact: &dyn Exportable) -> Result<Self::Output, ExportError>;
}

/// Writes artifacts into a directory, returning the written path.
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Exporter for FileExporter {
    type Output = PathBuf;

    fn export(&mut self, artifact: &dyn Exportable) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(artifact.file_name());
        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, artifact.bytes()))
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;
        log::info!("Exported {} ({} bytes)", path.display(), artifact.bytes().len());
        Ok(path)
    }
}
