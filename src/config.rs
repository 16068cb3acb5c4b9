use std::time::Duration;

/// Largest upload accepted by the media intake (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Longest prompt kept, in characters.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 500;

/// Media types accepted by default.
pub const DEFAULT_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_VIDEO_TIMEOUT: Duration = Duration::from_secs(300);

/// Limits and deadlines shared by every component of a workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowConfig {
    /// Uploads strictly larger than this are rejected.
    pub max_upload_bytes: usize,
    /// Prompts are truncated to this many characters.
    pub max_prompt_chars: usize,
    /// Declared media types the intake accepts, lowercase.
    pub allowed_image_types: Vec<String>,
    /// An image generation still running after this long fails with a timeout.
    pub image_timeout: Duration,
    /// Same as `image_timeout`, for video generation.
    pub video_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            allowed_image_types: DEFAULT_IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
            video_timeout: DEFAULT_VIDEO_TIMEOUT,
        }
    }
}

impl WorkflowConfig {
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_max_prompt_chars(mut self, chars: usize) -> Self {
        self.max_prompt_chars = chars;
        self
    }

    pub fn with_allowed_image_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_image_types = types
            .into_iter()
            .map(|t| t.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    pub fn with_video_timeout(mut self, timeout: Duration) -> Self {
        self.video_timeout = timeout;
        self
    }

    /// Human readable upload hint, e.g. `"JPG, PNG up to 10MB"`.
    pub fn upload_hint(&self) -> String {
        let mut formats: Vec<&str> = self
            .allowed_image_types
            .iter()
            .filter_map(|t| t.strip_prefix("image/"))
            .map(|sub| match sub {
                "jpeg" => "JPG",
                "png" => "PNG",
                "webp" => "WEBP",
                "gif" => "GIF",
                other => other,
            })
            .collect();
        formats.dedup();
        format!(
            "{} up to {}",
            formats.join(", "),
            human_size(self.max_upload_bytes)
        )
    }
}

/// Formats a byte count the way the upload hint shows it: `"10MB"`, `"512KB"`, `"300 bytes"`.
///
/// Whole units only; a limit that is not a multiple of the unit is shown in the next
/// smaller one.
pub(crate) fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_advertised_limits() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_prompt_chars, 500);
        assert!(config.allowed_image_types.iter().any(|t| t == "image/png"));
    }

    #[test]
    fn builder_lowercases_types() {
        let config = WorkflowConfig::default().with_allowed_image_types(["Image/PNG"]);
        assert_eq!(config.allowed_image_types, vec!["image/png".to_string()]);
    }

    #[test]
    fn upload_hint_lists_formats_and_limit() {
        let config = WorkflowConfig::default().with_allowed_image_types(["image/jpeg", "image/png"]);
        assert_eq!(config.upload_hint(), "JPG, PNG up to 10MB");
    }

    #[test]
    fn sizes_below_a_megabyte_are_not_rounded_to_zero() {
        assert_eq!(human_size(512 * 1024), "512KB");
        assert_eq!(human_size(1536 * 1024), "1536KB");
        assert_eq!(human_size(300), "300 bytes");
        let config = WorkflowConfig::default()
            .with_allowed_image_types(["image/png"])
            .with_max_upload_bytes(256 * 1024);
        assert_eq!(config.upload_hint(), "PNG up to 256KB");
    }
}
