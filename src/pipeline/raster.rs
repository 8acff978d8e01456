//! The rasterizer boundary.
//!
//! Rasterisation runs outside the host's flow of control: in the browser for
//! a web front end, on a blocking worker thread for [`PdfiumRasterizer`]. The
//! two sides meet through a single-shot channel. The host hands a
//! [`RasterSender`] to the rasterizer and awaits the matching
//! [`RasterHandoff`].
//!
//! The wait has no timeout. A rasterizer that never delivers (a user who
//! never finishes picking a file) leaves that submission waiting until the
//! session is dropped; there is no cancellation beyond dropping the future.
//! A rasterizer that goes away without delivering resolves the wait with
//! [`QuizError::RasterizerClosed`].

use crate::config::ExtractorConfig;
use crate::error::QuizError;
use crate::pipeline::encode;
use crate::pipeline::input::{MediaKind, UploadedFile};
use crate::pipeline::payload::ImageSequence;
use crate::pipeline::render::{self, RenderOptions};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Delivery = Result<ImageSequence, QuizError>;

/// Rasterizer side of the handoff. Consumed by the single delivery.
#[derive(Debug)]
pub struct RasterSender {
    tx: oneshot::Sender<Delivery>,
}

impl RasterSender {
    /// Send the finished sequence (possibly empty, e.g. a cancelled file
    /// dialog). Returns `false` if the host already stopped waiting.
    pub fn deliver(self, images: ImageSequence) -> bool {
        self.tx.send(Ok(images)).is_ok()
    }

    /// Report a rasterisation failure instead of a sequence.
    pub fn fail(self, err: QuizError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }
}

/// Host side of the handoff.
#[derive(Debug)]
pub struct RasterHandoff {
    rx: oneshot::Receiver<Delivery>,
}

impl RasterHandoff {
    /// Suspend until the rasterizer delivers. No timeout.
    pub async fn wait(self) -> Result<ImageSequence, QuizError> {
        match self.rx.await {
            Ok(delivery) => delivery,
            Err(_) => Err(QuizError::RasterizerClosed),
        }
    }
}

/// Create a connected sender/handoff pair.
pub fn handoff() -> (RasterSender, RasterHandoff) {
    let (tx, rx) = oneshot::channel();
    (RasterSender { tx }, RasterHandoff { rx })
}

/// Something that turns an image or PDF upload into page images.
///
/// `start` must return promptly; the work happens elsewhere and ends with
/// exactly one `deliver` or `fail` on `sender` (or with the sender dropped).
pub trait Rasterizer: Send + Sync {
    fn start(&self, file: UploadedFile, sender: RasterSender);
}

/// Renders on tokio's blocking pool: PDFs through pdfium, images through the
/// `image` decoders. Must be started from inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    options: RenderOptions,
}

impl PdfiumRasterizer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(RenderOptions {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
            password: config.pdf_password.clone(),
        })
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn start(&self, file: UploadedFile, sender: RasterSender) {
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || {
            let delivered = match rasterize_blocking(&file, &options) {
                Ok(images) => {
                    info!("Rasterised {} page image(s)", images.len());
                    sender.deliver(images)
                }
                Err(e) => {
                    warn!("Rasterisation failed: {}", e);
                    sender.fail(e)
                }
            };
            if !delivered {
                debug!("Host stopped waiting before rasterisation finished");
            }
        });
    }
}

fn rasterize_blocking(file: &UploadedFile, options: &RenderOptions) -> Delivery {
    match file.kind()? {
        MediaKind::Pdf => render::render_pdf_blocking(file.bytes(), options).map(ImageSequence::new),
        MediaKind::Image => {
            let b64 = encode::encode_upload(file.bytes()).map_err(|e| QuizError::DecodeFailed {
                kind: "image",
                detail: e.to_string(),
            })?;
            Ok(ImageSequence::new(vec![b64]))
        }
        other => Err(QuizError::Internal(format!(
            "{other:?} uploads are read as text, not rasterised"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    #[tokio::test]
    async fn delivered_sequence_reaches_host() {
        let (tx, rx) = handoff();
        assert!(tx.deliver(ImageSequence::new(vec!["AAAA".into(), "BBBB".into()])));
        let images = rx.wait().await.unwrap();
        assert_eq!(images.len(), 2);
    }

    #[tokio::test]
    async fn empty_sequence_is_not_an_error() {
        let (tx, rx) = handoff();
        tx.deliver(ImageSequence::default());
        assert!(rx.wait().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_sender_closes_handoff() {
        let (tx, rx) = handoff();
        drop(tx);
        assert!(matches!(rx.wait().await, Err(QuizError::RasterizerClosed)));
    }

    #[tokio::test]
    async fn failure_is_forwarded() {
        let (tx, rx) = handoff();
        tx.fail(QuizError::CorruptPdf {
            detail: "bad xref".into(),
        });
        assert!(matches!(rx.wait().await, Err(QuizError::CorruptPdf { .. })));
    }

    #[test]
    fn deliver_after_host_gone_reports_false() {
        let (tx, rx) = handoff();
        drop(rx);
        assert!(!tx.deliver(ImageSequence::default()));
    }

    #[tokio::test]
    async fn image_upload_rasterised_to_single_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let rasterizer = PdfiumRasterizer::from_config(&ExtractorConfig::default());
        let (tx, rx) = handoff();
        rasterizer.start(UploadedFile::new(png, "image/png"), tx);

        let images = rx.wait().await.unwrap();
        assert_eq!(images.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_image_upload_fails() {
        let rasterizer = PdfiumRasterizer::from_config(&ExtractorConfig::default());
        let (tx, rx) = handoff();
        rasterizer.start(UploadedFile::new(b"nope".to_vec(), "image/jpeg"), tx);

        assert!(matches!(
            rx.wait().await,
            Err(QuizError::DecodeFailed { kind: "image", .. })
        ));
    }
}
