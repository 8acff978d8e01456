//! Hosted chat-completion client.
//!
//! [`ChatProvider`] is the seam between the pipeline and the network: the
//! pipeline hands it a fully built [`ExtractionRequest`] and gets back the
//! reply text. [`HttpChatProvider`] talks to any OpenAI-compatible endpoint
//! (OpenRouter by default) through `async-openai`; tests swap in an
//! in-memory provider.
//!
//! One call is one round trip. There is no streaming and this module never
//! retries: a failed call is reported to the user, who resubmits if they
//! want to.

use crate::config::ExtractorConfig;
use crate::error::{CallKind, QuizError};
use crate::pipeline::payload::{ContentPart, ExtractionRequest};
use crate::session::Credential;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
};
use async_openai::Client;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends one request to a hosted model and returns its text reply.
///
/// Implementations must be `Send + Sync`; a session keeps its provider in an
/// `Arc` and may check answers from a spawned task.
pub trait ChatProvider: Send + Sync {
    /// Issue a single chat completion. `call` is attached to any error.
    fn complete<'a>(
        &'a self,
        call: CallKind,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<String, QuizError>>;
}

/// Build the chat-completion request: one user message holding every part.
pub fn chat_request(
    config: &ExtractorConfig,
    request: &ExtractionRequest,
) -> Result<CreateChatCompletionRequest, QuizError> {
    let parts: Vec<ChatCompletionRequestUserMessageContentPart> =
        request.parts().iter().map(wire_part).collect();

    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(ChatCompletionRequestUserMessageContent::Array(parts))
        .build()
        .map_err(|e| QuizError::Internal(format!("build message: {e}")))?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(&config.model)
        .messages(vec![ChatCompletionRequestMessage::User(user)]);
    if let Some(t) = config.temperature {
        args.temperature(t);
    }
    if let Some(n) = config.max_tokens {
        #[allow(deprecated)]
        args.max_tokens(n);
    }
    args.build()
        .map_err(|e| QuizError::Internal(format!("build request: {e}")))
}

fn wire_part(part: &ContentPart) -> ChatCompletionRequestUserMessageContentPart {
    match part {
        ContentPart::Text { text } => ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text: text.clone() },
        ),
        ContentPart::ImageUrl { image_url } => {
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image_url.url.clone(),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            )
        }
    }
}

// ── HTTP provider ────────────────────────────────────────────────────────

/// [`ChatProvider`] over HTTPS to an OpenAI-compatible endpoint.
pub struct HttpChatProvider {
    client: Client<OpenAIConfig>,
    config: ExtractorConfig,
}

impl HttpChatProvider {
    /// Build a provider for the session's credential and config.
    pub fn new(credential: Credential, config: &ExtractorConfig) -> Result<Self, QuizError> {
        let mut http = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }
        let http = http
            .build()
            .map_err(|e| QuizError::Internal(format!("HTTP client: {e}")))?;

        let openai = OpenAIConfig::new()
            .with_api_key(credential.expose())
            .with_api_base(&config.base_url);

        Ok(Self {
            client: Client::with_config(openai).with_http_client(http),
            config: config.clone(),
        })
    }

    async fn send(&self, call: CallKind, request: &ExtractionRequest) -> Result<String, QuizError> {
        let start = Instant::now();
        let body = chat_request(&self.config, request)?;
        info!(
            "Calling {} for {} ({} content parts)",
            self.config.model,
            call,
            request.parts().len()
        );

        let response = match self.client.chat().create(body).await {
            Ok(r) => r,
            Err(e) => {
                let err = map_error(call, self.config.api_timeout_secs, e);
                warn!("{} call failed after {:?}: {}", call, start.elapsed(), err);
                return Err(err);
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                "{} usage: {} input tokens, {} output tokens",
                call, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(QuizError::EmptyReply { call })?;

        debug!(
            "{} reply: {} chars in {:?}",
            call,
            content.len(),
            start.elapsed()
        );
        Ok(content)
    }
}

impl ChatProvider for HttpChatProvider {
    fn complete<'a>(
        &'a self,
        call: CallKind,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<String, QuizError>> {
        self.send(call, request).boxed()
    }
}

/// Map a client failure onto the error taxonomy.
fn map_error(call: CallKind, timeout_secs: Option<u64>, err: OpenAIError) -> QuizError {
    match err {
        OpenAIError::Reqwest(e) => match (e.status(), timeout_secs) {
            (_, Some(secs)) if e.is_timeout() => QuizError::Timeout { call, secs },
            (Some(status), _) => status_error(call, status, e.to_string()),
            (None, _) => QuizError::Transport {
                call,
                detail: e.to_string(),
            },
        },
        OpenAIError::ApiError(api) => {
            api_error(call, api.r#type.as_deref(), api.message)
        }
        OpenAIError::JSONDeserialize(e, ..) => QuizError::Api {
            call,
            message: format!("malformed completion body: {e}"),
        },
        other => QuizError::Transport {
            call,
            detail: other.to_string(),
        },
    }
}

fn status_error(call: CallKind, status: StatusCode, detail: String) -> QuizError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => QuizError::Auth { call, detail },
        StatusCode::TOO_MANY_REQUESTS => QuizError::RateLimited { call },
        _ => QuizError::Api {
            call,
            message: format!("HTTP {}: {detail}", status.as_u16()),
        },
    }
}

/// Classify an error body the endpoint returned.
///
/// OpenAI-compatible gateways disagree on error codes, so the `type` field
/// and the message text are both consulted.
fn api_error(call: CallKind, kind: Option<&str>, message: String) -> QuizError {
    let haystack = format!("{} {}", kind.unwrap_or_default(), message).to_ascii_lowercase();
    if haystack.contains("rate limit") || haystack.contains("rate_limit") {
        QuizError::RateLimited { call }
    } else if haystack.contains("auth")
        || haystack.contains("api key")
        || haystack.contains("api_key")
    {
        QuizError::Auth {
            call,
            detail: message,
        }
    } else {
        QuizError::Api { call, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::payload::{build_request, ImageSequence, SubmissionContent};

    #[test]
    fn request_has_single_user_message_with_parts() {
        let config = ExtractorConfig::default();
        let req = build_request(
            "Extract.",
            SubmissionContent::Images(ImageSequence::new(vec!["QUJD".into()])),
        )
        .unwrap();
        let body = serde_json::to_value(chat_request(&config, &req).unwrap()).unwrap();

        assert_eq!(body["model"], crate::config::DEFAULT_MODEL);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Extract.");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,QUJD");
    }

    #[test]
    fn request_includes_sampling_options_when_set() {
        let config = ExtractorConfig::builder()
            .temperature(0.2)
            .max_tokens(2048)
            .build()
            .unwrap();
        let req = ExtractionRequest::from_text("hello");
        let body = serde_json::to_value(chat_request(&config, &req).unwrap()).unwrap();
        assert_eq!(body["max_tokens"], 2048);
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["content"][0]["text"], "hello");
    }

    #[test]
    fn unauthorized_status_maps_to_auth() {
        let err = status_error(
            CallKind::Extraction,
            StatusCode::UNAUTHORIZED,
            "No auth credentials found".into(),
        );
        match err {
            QuizError::Auth { call, detail } => {
                assert_eq!(call, CallKind::Extraction);
                assert_eq!(detail, "No auth credentials found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        let err = status_error(
            CallKind::Verification,
            StatusCode::TOO_MANY_REQUESTS,
            "slow down".into(),
        );
        assert!(matches!(
            err,
            QuizError::RateLimited {
                call: CallKind::Verification
            }
        ));
    }

    #[test]
    fn server_error_keeps_status_in_message() {
        match status_error(
            CallKind::Extraction,
            StatusCode::BAD_GATEWAY,
            "upstream unavailable".into(),
        ) {
            QuizError::Api { message, .. } => {
                assert!(message.contains("502"));
                assert!(message.contains("upstream unavailable"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn api_error_body_is_classified() {
        assert!(matches!(
            api_error(CallKind::Extraction, Some("invalid_request_error"), "Invalid API key provided".into()),
            QuizError::Auth { .. }
        ));
        assert!(matches!(
            api_error(CallKind::Verification, Some("rate_limit_exceeded"), "Too many requests".into()),
            QuizError::RateLimited { call: CallKind::Verification }
        ));
        match api_error(CallKind::Extraction, None, "Provider returned error".into()) {
            QuizError::Api { message, .. } => assert_eq!(message, "Provider returned error"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn invalid_argument_keeps_call_kind() {
        let err = map_error(
            CallKind::Verification,
            None,
            OpenAIError::InvalidArgument("bad model".into()),
        );
        assert_eq!(err.call_kind(), Some(CallKind::Verification));
        assert!(err.to_string().contains("bad model"));
    }
}
