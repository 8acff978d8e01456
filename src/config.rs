//! Configuration for extraction and verification.
//!
//! All knobs live in [`ExtractorConfig`], built via [`ExtractorConfigBuilder`].
//! The credential is deliberately not part of it: it belongs to the
//! [`crate::session::Session`] and never ends up in a config that might be
//! logged.

use crate::client::ChatProvider;
use crate::error::QuizError;
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default hosted model. Vision-capable, so both input modes use it.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick:free";

/// Configuration for one session's extraction and answer checks.
///
/// # Example
/// ```rust
/// use eduforge::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .model("openai/gpt-4.1-mini")
///     .render_scale(2.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "openai/gpt-4.1-mini");
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Model identifier sent with every request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Base URL of the chat-completion API (without `/chat/completions`).
    pub base_url: String,

    /// Sampling temperature. `None` leaves it to the provider.
    pub temperature: Option<f32>,

    /// Completion token cap. `None` leaves it to the provider.
    pub max_tokens: Option<u32>,

    /// Per-call timeout in seconds. Default: `None`, one blocking round trip
    /// with no client-side limit.
    pub api_timeout_secs: Option<u64>,

    /// Scale applied to the PDF page size (in points) when rasterising. Default: 1.5.
    pub render_scale: f32,

    /// Cap on either rendered dimension in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// User password for encrypted PDFs.
    pub pdf_password: Option<String>,

    /// Replacement for [`crate::prompts::EXTRACTION_PROMPT`].
    pub extraction_prompt: Option<String>,

    /// Pre-constructed provider. Takes precedence over `base_url`.
    pub provider: Option<Arc<dyn ChatProvider>>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_tokens: None,
            api_timeout_secs: None,
            render_scale: 1.5,
            max_rendered_pixels: 2000,
            pdf_password: None,
            extraction_prompt: None,
            provider: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field("extraction_prompt", &self.extraction_prompt.as_ref().map(|p| p.len()))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn ChatProvider>"))
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction placed first in every extraction request.
    pub fn instruction(&self) -> &str {
        self.extraction_prompt
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_PROMPT)
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, QuizError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(QuizError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(QuizError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if !(0.25..=4.0).contains(&c.render_scale) {
            return Err(QuizError::InvalidConfig(format!(
                "render scale must be 0.25–4.0, got {}",
                c.render_scale
            )));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(QuizError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(p) = &c.extraction_prompt {
            if p.trim().is_empty() {
                return Err(QuizError::InvalidConfig(
                    "extraction prompt must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
