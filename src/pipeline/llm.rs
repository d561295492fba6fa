//! Provider routing and dispatch.
//!
//! [`ProviderRouter`] owns the [`ProviderConfig`] resolved at startup and
//! turns a finished prompt into the model's answer. Prompt layout lives in
//! [`crate::prompts`] and task templates in [`crate::tasks`].
//!
//! ## No retries
//!
//! A failed call is reported immediately as [`PdfChatError::Provider`]. The
//! session turns it into a user-visible message and the user can simply ask
//! again; there is no backoff loop and no core-level timeout.

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::PdfChatError;
use crate::status::StatusChannel;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One single-turn completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub kind: ProviderKind,
    pub model: &'a str,
    /// Sent as the only user message; no history.
    pub prompt: &'a str,
}

/// Executes a completion against a provider.
///
/// Implementations report transport/API failures as [`PdfChatError::Provider`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, PdfChatError>;
}

/// Production backend built on `edgequake-llm`.
///
/// `ProviderFactory` reads the API key from the same environment variable
/// the router has already checked ([`ProviderKind::credential_env`]).
#[derive(Debug, Default)]
pub struct EdgequakeBackend;

#[async_trait]
impl CompletionBackend for EdgequakeBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, PdfChatError> {
        let provider_error = |message: String| PdfChatError::Provider {
            provider: request.kind.display_name(),
            model: request.model.to_string(),
            message,
        };

        let provider =
            ProviderFactory::create_llm_provider(request.kind.factory_name(), request.model)
                .map_err(|e| provider_error(format!("{e}")))?;

        let messages = vec![ChatMessage::user(request.prompt)];
        let response = provider
            .chat(&messages, None)
            .await
            .map_err(|e| provider_error(format!("{e}")))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            request.model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Validates credentials and dispatches prompts to the configured provider.
pub struct ProviderRouter {
    config: ProviderConfig,
    backend: Arc<dyn CompletionBackend>,
    status: StatusChannel,
}

impl ProviderRouter {
    pub fn new(
        config: ProviderConfig,
        backend: Arc<dyn CompletionBackend>,
        status: StatusChannel,
    ) -> Self {
        Self {
            config,
            backend,
            status,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Send `prompt` to the configured provider and return the answer text.
    ///
    /// The credential check happens before the backend is touched: a missing
    /// key never produces a network attempt.
    pub async fn dispatch(&self, prompt: &str) -> Result<String, PdfChatError> {
        let kind = self.config.kind;
        let model = self.config.model.as_str();

        if self.config.api_key.is_none() {
            warn!("No credential for {} (model {})", kind, model);
            return Err(PdfChatError::MissingCredential {
                provider: kind.display_name(),
                variable: kind.credential_env(),
            });
        }

        self.status.status(format!("Asking {} ({})...", kind, model));
        info!(
            "Dispatching {} chars to {} model {}",
            prompt.chars().count(),
            kind,
            model
        );

        let start = Instant::now();
        let answer = self
            .backend
            .complete(CompletionRequest {
                kind,
                model,
                prompt,
            })
            .await
            .inspect_err(|e| {
                warn!("{} call failed after {:?}: {}", kind, start.elapsed(), e);
                self.status.status(format!("Error: {e}"));
            })?;

        if answer.trim().is_empty() {
            self.status.status(format!("Error: {} returned an empty response.", kind));
            return Err(PdfChatError::Provider {
                provider: kind.display_name(),
                model: model.to_string(),
                message: "the response contained no text".into(),
            });
        }

        debug!("{} answered {} chars in {:?}", kind, answer.len(), start.elapsed());
        self.status.status(format!("Response received from {}.", kind));
        Ok(answer)
    }
}
