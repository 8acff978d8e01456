//! Payload building: instruction + one modality → request content parts.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered base64 PNG strings, one per page or image, without `data:` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSequence(Vec<String>);

impl ImageSequence {
    pub fn new(images: Vec<String>) -> Self {
        Self(images)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// What one submission sends besides the instruction. Exactly one modality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionContent {
    Images(ImageSequence),
    Text(String),
}

/// An image reference as the chat API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of the user message's content list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Wrap a bare base64 PNG in a `data:` URL.
    pub fn png(b64: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{b64}"),
            },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

/// The content list of a single user-role chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionRequest {
    parts: Vec<ContentPart>,
}

impl ExtractionRequest {
    /// A request made of one text part. Used for the verification call.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// Number of image parts.
    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }
}

/// Build the extraction request: `instruction` first, then either one image
/// part per page or a single trailing text part.
///
/// Returns `None` when there is nothing to submit beyond the instruction (no
/// images, or blank text); the caller then issues no API call.
pub fn build_request(instruction: &str, content: SubmissionContent) -> Option<ExtractionRequest> {
    let mut parts = vec![ContentPart::text(instruction)];

    match content {
        SubmissionContent::Images(images) => {
            parts.extend(images.iter().map(ContentPart::png));
        }
        SubmissionContent::Text(text) => {
            if !text.trim().is_empty() {
                parts.push(ContentPart::text(text));
            }
        }
    }

    if parts.len() == 1 {
        debug!("Nothing to submit beyond the instruction");
        return None;
    }

    debug!("Built request with {} content parts", parts.len());
    Some(ExtractionRequest { parts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> SubmissionContent {
        SubmissionContent::Images(ImageSequence::new(
            (0..n).map(|i| format!("IMG{i}")).collect(),
        ))
    }

    #[test]
    fn instruction_always_first() {
        let req = build_request("INSTR", images(3)).unwrap();
        assert_eq!(req.parts()[0], ContentPart::text("INSTR"));
        assert_eq!(req.parts().len(), 4);
        assert_eq!(req.image_count(), 3);
    }

    #[test]
    fn image_parts_keep_page_order_and_prefix() {
        let req = build_request("INSTR", images(2)).unwrap();
        assert_eq!(req.parts()[1], ContentPart::png("IMG0"));
        match &req.parts()[2] {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/png;base64,IMG1")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn text_is_single_trailing_part() {
        let req = build_request("INSTR", SubmissionContent::Text("body".into())).unwrap();
        assert_eq!(
            req.parts(),
            &[ContentPart::text("INSTR"), ContentPart::text("body")]
        );
        assert_eq!(req.image_count(), 0);
    }

    #[test]
    fn never_mixes_modalities() {
        for content in [
            images(0),
            images(1),
            images(5),
            SubmissionContent::Text(String::new()),
            SubmissionContent::Text("some text".into()),
        ] {
            if let Some(req) = build_request("INSTR", content) {
                let tail = &req.parts()[1..];
                let all_images = tail.iter().all(ContentPart::is_image);
                let all_text = tail.iter().all(|p| !p.is_image()) && tail.len() == 1;
                assert!(all_images || all_text, "mixed parts: {:?}", req.parts());
            }
        }
    }

    #[test]
    fn empty_content_is_nothing_to_submit() {
        assert!(build_request("INSTR", images(0)).is_none());
        assert!(build_request("INSTR", SubmissionContent::Text("  \n".into())).is_none());
    }

    #[test]
    fn parts_serialise_in_chat_format() {
        let json = serde_json::to_value(ContentPart::png("QUJD")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "image_url", "image_url": {"url": "data:image/png;base64,QUJD"}})
        );
        let json = serde_json::to_value(ContentPart::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }
}
