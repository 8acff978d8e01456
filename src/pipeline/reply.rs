//! Reply parsing: model text → [`ExtractionResult`].
//!
//! Models are asked for bare JSON but sometimes wrap it in a ```` ```json ````
//! fence anyway. One outer fence is stripped; anything else that is not a
//! JSON object is a parse failure and nothing is shown to the user.

use crate::error::{CallKind, QuizError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One extracted question and, when the material supplied one, its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaPair {
    pub question: String,
    /// Numbers and booleans are kept as their JSON text.
    #[serde(
        default,
        deserialize_with = "scalar_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub answer: Option<String>,
}

/// Parsed extraction reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Reading passage, or empty when the material had none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub passage: String,
    /// Questions in document order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub qna: Vec<QnaPair>,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn scalar_as_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a text answer, got {}",
            json_kind(&other)
        ))),
    }
}

impl ExtractionResult {
    pub fn has_passage(&self) -> bool {
        !self.passage.trim().is_empty()
    }
}

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("valid regex")
});

/// Remove one outer Markdown code fence, if the whole text is fenced.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse the extraction reply.
pub fn parse_reply(text: &str) -> Result<ExtractionResult, QuizError> {
    let body = strip_code_fence(text);

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        warn!("Reply is not JSON: {}", e);
        QuizError::ParseFailed {
            call: CallKind::Extraction,
            detail: e.to_string(),
        }
    })?;

    if !value.is_object() {
        return Err(QuizError::ParseFailed {
            call: CallKind::Extraction,
            detail: format!("expected a JSON object, got {}", json_kind(&value)),
        });
    }

    let result: ExtractionResult =
        serde_json::from_value(value).map_err(|e| QuizError::ParseFailed {
            call: CallKind::Extraction,
            detail: e.to_string(),
        })?;

    debug!(
        "Parsed reply: passage {} chars, {} questions",
        result.passage.len(),
        result.qna.len()
    );
    Ok(result)
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
