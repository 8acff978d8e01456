//! Input acquisition: one uploaded file → vision or text branch.
//!
//! The host never reads image or PDF bytes itself; those go to the
//! rasterizer untouched. Text-like uploads are decoded here, and any decode
//! failure ends the submission before a request is built.

use crate::error::QuizError;
use crate::pipeline::text;
use crate::session::{InputMode, Session};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// MIME types accepted for upload (images match on the `image/` prefix).
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/*",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Coarse classification of an upload by its declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    PlainText,
    Csv,
    Spreadsheet,
}

impl MediaKind {
    /// Classify a MIME type, ignoring parameters such as `; charset=utf-8`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => Some(MediaKind::Pdf),
            "text/plain" => Some(MediaKind::PlainText),
            "text/csv" => Some(MediaKind::Csv),
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(MediaKind::Spreadsheet)
            }
            m if m.starts_with("image/") && m.len() > "image/".len() => Some(MediaKind::Image),
            _ => None,
        }
    }

    /// Image and PDF uploads are rasterised; everything else is text.
    pub fn is_vision(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Pdf)
    }

    /// Whether a session in `mode` accepts this kind.
    pub fn allowed_in(self, mode: InputMode) -> bool {
        match mode {
            InputMode::Auto => true,
            InputMode::Vision => self.is_vision(),
            InputMode::Text => !self.is_vision(),
        }
    }
}

/// Raw bytes plus declared MIME type. Lives for one submission.
#[derive(Clone)]
pub struct UploadedFile {
    bytes: Vec<u8>,
    mime: String,
    name: Option<String>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    pub fn new(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a file from disk. Without `mime`, the type is guessed from the
    /// extension; an unknown extension becomes `application/octet-stream`,
    /// which [`acquire`] rejects.
    pub async fn from_path(path: impl AsRef<Path>, mime: Option<&str>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| read_error(path.to_path_buf(), e))?;

        let mime = match mime {
            Some(m) => m.to_string(),
            None => guess_mime(path),
        };
        debug!("Read {} ({} bytes, {})", path.display(), bytes.len(), mime);

        let mut file = Self::new(bytes, mime);
        if let Some(name) = path.file_name() {
            file.name = Some(name.to_string_lossy().into_owned());
        }
        Ok(file)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Classify by declared type, or fail with the accepted list as a hint.
    pub fn kind(&self) -> Result<MediaKind, QuizError> {
        MediaKind::from_mime(&self.mime).ok_or_else(|| QuizError::UnsupportedMediaType {
            mime: self.mime.clone(),
            hint: Some(format!("Accepted types: {}", ACCEPTED_MIME_TYPES.join(", "))),
        })
    }
}

/// Guess a MIME type from a file extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn read_error(path: PathBuf, e: std::io::Error) -> QuizError {
    match e.kind() {
        std::io::ErrorKind::NotFound => QuizError::FileNotFound { path },
        std::io::ErrorKind::PermissionDenied => QuizError::PermissionDenied { path },
        _ => QuizError::ReadFailed { path, source: e },
    }
}

/// Outcome of acquisition: the branch the submission continues on.
#[derive(Debug)]
pub enum Acquired {
    /// Image or PDF, to be handed to the rasterizer.
    Vision(UploadedFile),
    /// Decoded text content.
    Text(String),
}

/// Accept one upload for `session` and route it.
///
/// Text-like files are decoded immediately. A file the session's mode does
/// not accept is rejected as [`QuizError::UnsupportedMediaType`].
pub fn acquire(session: &Session, file: UploadedFile) -> Result<Acquired, QuizError> {
    let kind = accepted_kind(session, &file)?;
    if kind.is_vision() {
        return Ok(Acquired::Vision(file));
    }

    let text = text::extract_text(kind, file.bytes())?;
    Ok(Acquired::Text(text))
}

/// Classify `file` and check the session's mode accepts it.
pub fn accepted_kind(session: &Session, file: &UploadedFile) -> Result<MediaKind, QuizError> {
    let kind = file.kind()?;
    if !kind.allowed_in(session.mode()) {
        return Err(QuizError::UnsupportedMediaType {
            mime: file.mime().to_string(),
            hint: Some(format!("Not accepted in {:?} mode", session.mode())),
        });
    }

    info!(
        "Acquired {} ({:?}, {} bytes)",
        file.name().unwrap_or("upload"),
        kind,
        file.bytes().len()
    );
    Ok(kind)
}
