//! Media intake: turns a picked or dropped file into an [`UploadedMedia`].
//!
//! Both entry points build a [`MediaFile`] and go through [`MediaIntake::submit`],
//! so the type and size checks exist exactly once.

use crate::config::WorkflowConfig;
use crate::error::IntakeError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::{path::Path, sync::Arc};

/// Bytes plus the media type they are encoded in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaPayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Renders the payload as a `data:` URI suitable for direct display.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.bytes)
        )
    }

    /// Parses a base64 `data:` URI back into a payload.
    pub fn from_data_uri(uri: &str) -> Result<Self, IntakeError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| IntakeError::MalformedDataUri("missing data: prefix".to_string()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| IntakeError::MalformedDataUri("missing ',' separator".to_string()))?;
        let content_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| IntakeError::MalformedDataUri("only base64 payloads are supported".to_string()))?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| IntakeError::MalformedDataUri(e.to_string()))?;
        Ok(Self::new(content_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A file handed over by the file picker or a drag-and-drop event.
#[derive(Clone, Debug)]
pub struct MediaFile {
    pub name: String,
    /// Media type as declared by the source (browser, sniffed signature), if any.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// A file received through drag-and-drop, with the type the drop payload declared.
    pub fn dropped(name: impl Into<String>, declared_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its type from the file signature.
    ///
    /// The name is not consulted: a file whose bytes match no known signature declares
    /// no type, whatever its extension claims.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| IntakeError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let declared_type = infer::get(&bytes).map(|kind| kind.mime_type().to_string());
        if declared_type.is_none() {
            log::debug!("No known signature in {}", path.display());
        }
        Ok(Self {
            name,
            declared_type,
            bytes,
        })
    }
}

/// An accepted upload. Cheap to clone; the bytes are shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedMedia {
    pub name: String,
    payload: Arc<MediaPayload>,
}

impl UploadedMedia {
    pub fn content_type(&self) -> &str {
        &self.payload.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }

    pub fn payload(&self) -> &Arc<MediaPayload> {
        &self.payload
    }

    pub fn data_uri(&self) -> String {
        self.payload.data_uri()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Validates uploads against the configured type allow-list and size limit.
#[derive(Clone, Debug)]
pub struct MediaIntake {
    max_bytes: usize,
    allowed_types: Vec<String>,
}

impl MediaIntake {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            allowed_types: config.allowed_image_types.clone(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validates a file and, on success, takes ownership of its bytes.
    pub fn submit(&self, file: MediaFile) -> Result<UploadedMedia, IntakeError> {
        let content_type = self.validate(file.declared_type.as_deref(), file.bytes.len())?;
        log::debug!(
            "Accepted upload {} ({}, {} bytes)",
            file.name,
            content_type,
            file.bytes.len()
        );
        Ok(UploadedMedia {
            name: file.name,
            payload: Arc::new(MediaPayload::new(content_type, file.bytes)),
        })
    }

    /// File-picker path. The size is checked against the file metadata before reading.
    pub fn submit_path(&self, path: impl AsRef<Path>) -> Result<UploadedMedia, IntakeError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|source| IntakeError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.max_bytes {
            return Err(IntakeError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        self.submit(MediaFile::from_path(path)?)
    }

    /// Returns the normalised content type when `declared` is an allowed image type.
    fn validate(&self, declared: Option<&str>, size: usize) -> Result<String, IntakeError> {
        let not_an_image = || IntakeError::NotAnImage {
            declared: declared.map(str::to_string),
        };

        let content_type = declared.map(normalize_type).ok_or_else(not_an_image)?;
        if !content_type.starts_with("image/")
            || !self.allowed_types.iter().any(|t| *t == content_type)
        {
            return Err(not_an_image());
        }
        if size == 0 {
            return Err(not_an_image());
        }
        if size > self.max_bytes {
            return Err(IntakeError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(content_type)
    }
}

fn normalize_type(declared: &str) -> String {
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> MediaIntake {
        MediaIntake::new(&WorkflowConfig::default())
    }

    #[test]
    fn accepts_declared_png() {
        let media = intake()
            .submit(MediaFile::dropped("a.png", Some("image/png"), vec![1, 2, 3]))
            .unwrap();
        assert_eq!(media.content_type(), "image/png");
        assert_eq!(media.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn normalises_jpg_alias_and_parameters() {
        let media = intake()
            .submit(MediaFile::dropped("a.jpg", Some("Image/JPG; q=1"), vec![0xff]))
            .unwrap();
        assert_eq!(media.content_type(), "image/jpeg");
    }

    #[test]
    fn rejects_non_image_and_missing_type() {
        let err = intake()
            .submit(MediaFile::dropped("notes.txt", Some("text/plain"), vec![1]))
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { .. }));

        let err = intake()
            .submit(MediaFile::dropped("blob", None, vec![1]))
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { declared: None }));
    }

    #[test]
    fn rejects_image_type_outside_allow_list() {
        let err = intake()
            .submit(MediaFile::dropped("a.bmp", Some("image/bmp"), vec![1]))
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { .. }));
    }

    #[test]
    fn rejects_empty_file() {
        let err = intake()
            .submit(MediaFile::dropped("a.png", Some("image/png"), Vec::new()))
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { .. }));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let intake = MediaIntake::new(&WorkflowConfig::default().with_max_upload_bytes(4));
        assert!(intake
            .submit(MediaFile::dropped("a.png", Some("image/png"), vec![0; 4]))
            .is_ok());
        let err = intake
            .submit(MediaFile::dropped("a.png", Some("image/png"), vec![0; 5]))
            .unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 5, limit: 4 }));
    }

    #[test]
    fn data_uri_round_trips_bytes() {
        let payload = MediaPayload::new("image/png", vec![0x89, b'P', b'N', b'G', 0, 255]);
        let uri = payload.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(MediaPayload::from_data_uri(&uri).unwrap(), payload);
    }

    #[test]
    fn malformed_data_uri_is_reported() {
        for uri in ["image/png;base64,AA==", "data:image/png,AA==", "data:image/png;base64", "data:image/png;base64,!!"] {
            let err = MediaPayload::from_data_uri(uri).unwrap_err();
            assert!(matches!(err, IntakeError::MalformedDataUri(_)), "{uri}");
        }
    }

    const JPEG_HEADER: [u8; 4] = [0xff, 0xd8, 0xff, 0xe0];

    #[test]
    fn picker_path_sniffs_type_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.JPG");
        std::fs::write(&path, JPEG_HEADER).unwrap();

        let media = intake().submit_path(&path).unwrap();
        assert_eq!(media.name, "product.JPG");
        assert_eq!(media.content_type(), "image/jpeg");
        assert_eq!(media.bytes(), &JPEG_HEADER);
    }

    #[test]
    fn picker_path_accepts_image_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0042");
        std::fs::write(&path, JPEG_HEADER).unwrap();

        let media = intake().submit_path(&path).unwrap();
        assert_eq!(media.content_type(), "image/jpeg");
    }

    #[test]
    fn picker_path_rejects_text_renamed_as_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.png");
        std::fs::write(&path, b"shopping list: mugs, candles").unwrap();

        let err = intake().submit_path(&path).unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { declared: None }));
    }

    #[test]
    fn picker_path_rejects_sniffed_type_outside_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();

        let err = intake().submit_path(&path).unwrap_err();
        assert!(
            matches!(err, IntakeError::NotAnImage { declared: Some(ref t) } if t == "application/pdf")
        );
    }

    #[test]
    fn picker_path_rejects_oversized_file_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, vec![0u8; 16]).unwrap();

        let intake = MediaIntake::new(&WorkflowConfig::default().with_max_upload_bytes(8));
        let err = intake.submit_path(&path).unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 16, limit: 8 }));
    }

    #[test]
    fn picker_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = intake().submit_path(dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, IntakeError::Unreadable { .. }));
    }
}
