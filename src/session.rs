//! Per-user session context.
//!
//! A [`Session`] holds everything that is "global" from the user's point of
//! view: the API key, the selected input mode, the configuration and the
//! chat provider. It is passed explicitly to each pipeline stage, so stages
//! stay pure functions of their arguments and can be tested in isolation.
//! Dropping the session drops the credential with it.

use crate::client::{ChatProvider, HttpChatProvider};
use crate::config::ExtractorConfig;
use crate::error::QuizError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// User-supplied API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key, rejecting empty or whitespace-only input.
    pub fn new(key: impl Into<String>) -> Result<Self, QuizError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(QuizError::MissingCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw key, for the `Authorization` header only.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Which kinds of upload the user chose to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputMode {
    /// Route by declared MIME type. (default)
    #[default]
    Auto,
    /// Image or PDF, sent to the model as page images.
    Vision,
    /// Text, CSV or spreadsheet, sent to the model as extracted text.
    Text,
}

/// One user's interaction scope.
#[derive(Clone)]
pub struct Session {
    credential: Credential,
    mode: InputMode,
    config: ExtractorConfig,
    provider: Arc<dyn ChatProvider>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential)
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session. Fails with [`QuizError::MissingCredential`] when the
    /// key is absent or blank, before anything else is set up.
    ///
    /// Uses `config.provider` when present, otherwise an [`HttpChatProvider`]
    /// for `config.base_url`.
    pub fn open(api_key: Option<&str>, config: ExtractorConfig) -> Result<Self, QuizError> {
        let credential = Credential::new(api_key.unwrap_or_default())?;
        Self::with_credential(credential, config)
    }

    /// Open a session for a credential that was already checked.
    pub fn with_credential(
        credential: Credential,
        config: ExtractorConfig,
    ) -> Result<Self, QuizError> {
        let provider: Arc<dyn ChatProvider> = match config.provider {
            Some(ref p) => Arc::clone(p),
            None => Arc::new(HttpChatProvider::new(credential.clone(), &config)?),
        };
        debug!("Session opened for model {}", config.model);

        Ok(Self {
            credential,
            mode: InputMode::default(),
            config,
            provider,
        })
    }

    /// Select which uploads this session accepts.
    pub fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn ChatProvider {
        self.provider.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credential_is_missing() {
        assert!(matches!(
            Session::open(None, ExtractorConfig::default()),
            Err(QuizError::MissingCredential)
        ));
        assert!(matches!(
            Session::open(Some("   "), ExtractorConfig::default()),
            Err(QuizError::MissingCredential)
        ));
    }

    #[test]
    fn credential_is_trimmed_and_redacted() {
        let c = Credential::new("  sk-or-abc  ").unwrap();
        assert_eq!(c.expose(), "sk-or-abc");
        assert_eq!(format!("{c:?}"), "Credential(<redacted>)");
    }

    #[test]
    fn open_session_defaults_to_auto_mode() {
        let session = Session::open(Some("sk-or-abc"), ExtractorConfig::default()).unwrap();
        assert_eq!(session.mode(), InputMode::Auto);
        assert!(!format!("{session:?}").contains("sk-or-abc"));

        let session = session.with_mode(InputMode::Text);
        assert_eq!(session.mode(), InputMode::Text);
    }
}
