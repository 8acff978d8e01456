//! Image encoding: anything the rasterizer produces → base64 PNG.
//!
//! PNG is lossless, so rendered text stays crisp for the model. The output
//! carries no `data:` prefix; [`crate::pipeline::payload`] adds it when the
//! image becomes a request part.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a base64 PNG string.
pub fn encode_page(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );
    Ok(b64)
}

/// Decode an uploaded image (PNG, JPEG, GIF, WebP) and re-encode it as PNG.
///
/// Re-encoding keeps the `image/png` label on every request part truthful
/// whatever format the user uploaded.
pub fn encode_upload(bytes: &[u8]) -> Result<String, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    encode_page(&img)
}
