//! PDF rasterisation via pdfium.
//!
//! pdfium keeps thread-local state and blocks, so everything here is
//! synchronous and is driven from `spawn_blocking` by
//! [`crate::pipeline::raster::PdfiumRasterizer`].
//!
//! Pages are scaled by `render_scale` (points → pixels) and then capped at
//! `max_rendered_pixels` on either edge, so an oversized page cannot blow up
//! memory or the request size.

use crate::error::QuizError;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rendering knobs copied out of the session config.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub scale: f32,
    pub max_pixels: u32,
    pub password: Option<String>,
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` names the library explicitly; otherwise a library in the
/// working directory wins over the system search path.
pub fn bind_pdfium() -> Result<Pdfium, QuizError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        debug!("Loading pdfium from PDFIUM_LIB_PATH={}", path);
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            QuizError::Internal(format!("failed to load pdfium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    if let Ok(bindings) = Pdfium::bind_to_library(&local) {
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        QuizError::Internal(format!(
            "pdfium library not found ({e}); install it or set PDFIUM_LIB_PATH"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size for a page of `width_pt` × `height_pt` points at `scale`,
/// capped at `max_pixels` on the longer edge with aspect ratio preserved.
pub fn target_dimensions(width_pt: f32, height_pt: f32, scale: f32, max_pixels: u32) -> (u32, u32) {
    let raw_w = (width_pt * scale).max(1.0);
    let raw_h = (height_pt * scale).max(1.0);
    let longest = raw_w.max(raw_h);
    let ratio = if longest > max_pixels as f32 {
        max_pixels as f32 / longest
    } else {
        1.0
    };
    (
        ((raw_w * ratio).round() as u32).clamp(1, max_pixels),
        ((raw_h * ratio).round() as u32).clamp(1, max_pixels),
    )
}

/// Render every page of an in-memory PDF to a base64 PNG, in page order.
pub fn render_pdf_blocking(bytes: &[u8], opts: &RenderOptions) -> Result<Vec<String>, QuizError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, opts.password.as_deref())
        .map_err(|e| {
            let detail = format!("{e}");
            let lower = detail.to_lowercase();
            if lower.contains("password") || lower.contains("encrypt") {
                QuizError::CorruptPdf {
                    detail: if opts.password.is_some() {
                        "wrong password".into()
                    } else {
                        "document is encrypted; supply a password".into()
                    },
                }
            } else {
                QuizError::CorruptPdf { detail }
            }
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let (w, h) = target_dimensions(
            page.width().value,
            page.height().value,
            opts.scale,
            opts.max_pixels,
        );
        let render_config = PdfRenderConfig::new()
            .set_target_width(w as i32)
            .set_maximum_height(h as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| QuizError::RasterisationFailed {
                page: page_num,
                detail: format!("{e}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let b64 = encode::encode_page(&image).map_err(|e| QuizError::RasterisationFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })?;
        images.push(b64);
    }

    Ok(images)
}
