//! Pipeline stages for turning one upload into a quiz.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//!          ┌─▶ raster ─▶ render ─▶ encode ─┐
//! input ───┤  (handoff)  (pdfium)  (PNG)   ├─▶ payload ─▶ client ─▶ reply
//!          └─▶ text ───────────────────────┘   (parts)    (HTTP)    (JSON)
//! ```
//!
//! 1. [`input`]   — classify the upload and route it by MIME type and mode
//! 2. [`raster`]  — single-shot handoff to whatever rasterises images/PDFs
//! 3. [`render`]  — pdfium page rendering; runs in `spawn_blocking`
//! 4. [`encode`]  — PNG-encode and base64-wrap page images
//! 5. [`text`]    — decode plain text, CSV and spreadsheets
//! 6. [`payload`] — instruction plus image parts or one text part
//! 7. [`reply`]   — parse the model's JSON reply

pub mod encode;
pub mod input;
pub mod payload;
pub mod raster;
pub mod render;
pub mod reply;
pub mod text;
