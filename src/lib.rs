//! # eduforge
//!
//! Turn study material into a self-quiz with a hosted vision/language model.
//!
//! A user uploads one document: a photo of a worksheet, a PDF, a plain text
//! file, a CSV or a spreadsheet. Its content goes to a chat-completion model
//! together with a fixed instruction asking for the reading passage and every
//! question/answer pair. The JSON reply is parsed into an
//! [`ExtractionResult`], and the user's own answers can then be checked
//! against it: an exact (normalised) match first, a second model call for
//! semantic equivalence when that fails.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Acquire    classify by MIME type, check the session's mode
//!  ├─ 2. Rasterize  image/PDF → base64 PNG pages (pdfium, spawn_blocking)
//!  │    or Extract  text/CSV/spreadsheet → text
//!  ├─ 3. Payload    instruction + images, or instruction + text
//!  ├─ 4. Model      one chat completion, no retry
//!  ├─ 5. Parse      {"passage", "qna": [{"question", "answer"}]}
//!  └─ 6. Check      normalised match, else a verification call
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eduforge::{extract, ExtractorConfig, PdfiumRasterizer, Session, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractorConfig::default();
//!     let rasterizer = PdfiumRasterizer::from_config(&config);
//!     let key = std::env::var("OPENROUTER_API_KEY").ok();
//!     let session = Session::open(key.as_deref(), config)?;
//!
//!     let file = UploadedFile::from_path("worksheet.pdf", None).await?;
//!     if let Some(quiz) = extract(&session, &rasterizer, file).await? {
//!         println!("{}", quiz.passage);
//!         for (i, q) in quiz.qna.iter().enumerate() {
//!             println!("{}. {}", i + 1, q.question);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `eduforge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! PDF rendering needs the pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` at it, or place it in the working directory.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod verify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{ChatProvider, HttpChatProvider};
pub use config::{ExtractorConfig, ExtractorConfigBuilder};
pub use error::{CallKind, QuizError};
pub use extract::{extract, run_submission, submit};
pub use observer::{NoopObserver, SubmissionObserver, SubmissionState, SubmissionTracker};
pub use pipeline::input::{acquire, Acquired, MediaKind, UploadedFile};
pub use pipeline::payload::{build_request, ContentPart, ExtractionRequest, ImageSequence, SubmissionContent};
pub use pipeline::raster::{handoff, PdfiumRasterizer, RasterHandoff, RasterSender, Rasterizer};
pub use pipeline::reply::{parse_reply, ExtractionResult, QnaPair};
pub use session::{Credential, InputMode, Session};
pub use verify::{check_all, check_answer, normalize_answer, CheckOutcome, UserAnswers, Verdict};
