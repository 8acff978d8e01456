//! Error types for the eduforge library.
//!
//! Every failure is terminal for the submission it happened in: the caller
//! shows the message and the user starts again from an idle form. Nothing is
//! retried here.
//!
//! Failures of the hosted model call carry a [`CallKind`] so callers can tell
//! a failed extraction apart from a failed answer verification, which matters
//! when the passage is already on screen and only one check went wrong.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which hosted-model request an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// The primary passage + Q&A extraction call.
    Extraction,
    /// The secondary semantic-equivalence judgement for one answer.
    Verification,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Extraction => f.write_str("extraction"),
            CallKind::Verification => f.write_str("verification"),
        }
    }
}

/// All errors returned by the eduforge library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Session errors ────────────────────────────────────────────────────
    /// No API key was supplied; every processing step stays disabled.
    #[error("Please enter your OpenRouter API key to proceed.\nPass --api-key or set OPENROUTER_API_KEY.")]
    MissingCredential,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The declared MIME type is not one we accept, or the selected mode excludes it.
    #[error("Unsupported file type '{mime}'{}", hint_suffix(.hint))]
    UnsupportedMediaType { mime: String, hint: Option<String> },

    /// A text-like upload could not be decoded.
    #[error("Could not read {kind} file: {detail}")]
    DecodeFailed { kind: &'static str, detail: String },

    // ── Rasterizer errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt, or the document is encrypted.
    #[error("PDF is unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium or the image decoder failed on one page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The rasterizer went away without delivering an image sequence.
    #[error("The rasterizer closed before sending any pages")]
    RasterizerClosed,

    // ── Hosted model errors ───────────────────────────────────────────────
    /// Network-level failure reaching the endpoint.
    #[error("Could not reach the model endpoint during {call}: {detail}")]
    Transport { call: CallKind, detail: String },

    /// HTTP 401/403 from the endpoint.
    #[error("Authentication failed during {call}: {detail}\nCheck your API key.")]
    Auth { call: CallKind, detail: String },

    /// HTTP 429 from the endpoint.
    #[error("Rate limit exceeded during {call}")]
    RateLimited { call: CallKind },

    /// Any other non-success status.
    #[error("Model API error during {call}: {message}")]
    Api { call: CallKind, message: String },

    /// Only possible when a timeout was configured explicitly.
    #[error("Model call ({call}) timed out after {secs}s")]
    Timeout { call: CallKind, secs: u64 },

    /// The endpoint answered 2xx but without a message body.
    #[error("The model returned an empty reply during {call}")]
    EmptyReply { call: CallKind },

    // ── Reply errors ──────────────────────────────────────────────────────
    /// A model reply (extraction or verification) we could not understand.
    #[error("Could not parse the {call} reply: {detail}")]
    ParseFailed { call: CallKind, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the upload from disk failed for a reason other than not-found/permissions.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!("\n{h}"),
        None => String::new(),
    }
}

impl QuizError {
    /// The hosted-model call this error came from, if any.
    pub fn call_kind(&self) -> Option<CallKind> {
        match self {
            QuizError::Transport { call, .. }
            | QuizError::Auth { call, .. }
            | QuizError::RateLimited { call, .. }
            | QuizError::Api { call, .. }
            | QuizError::Timeout { call, .. }
            | QuizError::EmptyReply { call }
            | QuizError::ParseFailed { call, .. } => Some(*call),
            _ => None,
        }
    }

    /// Whether this error was raised before any request left the process.
    pub fn is_local(&self) -> bool {
        self.call_kind().is_none()
    }
}
