//! Configuration types for a PDF chat session.
//!
//! Two kinds of configuration live here:
//!
//! * [`ChatConfig`]: everything the caller may tune (model override, system
//!   instruction, rendering capability, injected collaborators), built via
//!   [`ChatConfigBuilder`].
//! * [`ProviderConfig`]: the provider/model/credential triple resolved
//!   **once** when the session is created and never changed afterwards.
//!
//! Provider selection is a naming convention on the model id, isolated in
//! [`classify_model`] so it can be tested (and swapped) on its own.

use crate::error::PdfChatError;
use crate::pipeline::diagram::DiagramEngine;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::CompletionBackend;
use crate::status::StatusCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the model id.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

/// Model used when [`MODEL_ENV`] is unset or empty.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Model ids starting with this prefix (case-insensitive) go to OpenAI.
pub const OPENAI_MODEL_PREFIX: &str = "gpt";

/// System instruction used for free-form questions.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant analyzing an investor document.";

// ── Provider classification ──────────────────────────────────────────────

/// The two interchangeable provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Environment variable that must hold this provider's API key.
    pub fn credential_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Provider name understood by `edgequake_llm::ProviderFactory`.
    pub fn factory_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Human-readable name for status messages and errors.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Classify a model id into a provider family.
///
/// `gpt…` ids (any case) are OpenAI; everything else is Gemini.
pub fn classify_model(model: &str) -> ProviderKind {
    let head: String = model
        .trim()
        .chars()
        .take(OPENAI_MODEL_PREFIX.len())
        .collect::<String>()
        .to_ascii_lowercase();
    if head == OPENAI_MODEL_PREFIX {
        ProviderKind::OpenAi
    } else {
        ProviderKind::Gemini
    }
}

/// Provider, model and credential, resolved once per session.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub model: String,
    pub kind: ProviderKind,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Resolve from an explicit model (or the default) and a variable lookup.
    ///
    /// Only the credential variable of the classified provider is looked up.
    /// Empty values count as absent.
    pub fn resolve<F>(model: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();
        let kind = classify_model(&model);
        let api_key = lookup(kind.credential_env()).filter(|k| !k.trim().is_empty());
        Self {
            model,
            kind,
            api_key,
        }
    }

    /// Resolve from the process environment.
    ///
    /// `model_override` wins over [`MODEL_ENV`].
    pub fn from_env(model_override: Option<&str>) -> Self {
        let env_model = std::env::var(MODEL_ENV).ok();
        let model = model_override.or(env_model.as_deref());
        Self::resolve(model, |name| std::env::var(name).ok())
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── Rendering capability ─────────────────────────────────────────────────

/// Whether markdown/HTML rendering is available for this process.
///
/// Resolved once at startup. When `available` is false every answer is
/// displayed as plain text and no HTML is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderingCapability {
    pub available: bool,
}

impl Default for RenderingCapability {
    fn default() -> Self {
        Self { available: true }
    }
}

impl RenderingCapability {
    pub fn plain_text() -> Self {
        Self { available: false }
    }
}

// ── Session configuration ────────────────────────────────────────────────

/// Configuration for a [`crate::session::ChatSession`].
///
/// # Example
/// ```rust
/// use edgequake_pdfchat::ChatConfig;
///
/// let config = ChatConfig::builder()
///     .model("gemini-1.5-pro")
///     .download_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
/// ```
#[derive(Clone)]
pub struct ChatConfig {
    /// Model id override. If None, [`MODEL_ENV`] then [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Pre-resolved provider configuration. Skips environment lookup entirely.
    pub provider_config: Option<ProviderConfig>,

    /// System instruction prepended to free-form questions.
    /// Tasks never carry one.
    pub system_instruction: String,

    /// Markdown rendering switch. Default: available.
    pub rendering: RenderingCapability,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receiver for status and presentation events.
    pub status_callback: Option<Arc<dyn StatusCallback>>,

    /// Completion backend. Default: [`crate::pipeline::llm::EdgequakeBackend`].
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// Text extractor. Default: [`crate::pipeline::extract::PdfiumExtractor`].
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Diagram engine. Default: [`crate::pipeline::diagram::MermaidEngine`].
    pub diagram_engine: Option<Arc<dyn DiagramEngine>>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_config: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            rendering: RenderingCapability::default(),
            download_timeout_secs: 120,
            status_callback: None,
            backend: None,
            extractor: None,
            diagram_engine: None,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("model", &self.model)
            .field("provider_config", &self.provider_config)
            .field("system_instruction", &self.system_instruction)
            .field("rendering", &self.rendering)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "status_callback",
                &self.status_callback.as_ref().map(|_| "<dyn StatusCallback>"),
            )
            .field("backend", &self.backend.as_ref().map(|_| "<dyn CompletionBackend>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field(
                "diagram_engine",
                &self.diagram_engine.as_ref().map(|_| "<dyn DiagramEngine>"),
            )
            .finish()
    }
}

impl ChatConfig {
    /// Create a new builder for `ChatConfig`.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder {
            config: Self::default(),
        }
    }

    /// The provider configuration this session will use.
    pub fn resolve_provider(&self) -> ProviderConfig {
        match self.provider_config {
            Some(ref pc) => pc.clone(),
            None => ProviderConfig::from_env(self.model.as_deref()),
        }
    }
}

/// Builder for [`ChatConfig`].
#[derive(Debug)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_config(mut self, pc: ProviderConfig) -> Self {
        self.config.provider_config = Some(pc);
        self
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = instruction.into();
        self
    }

    pub fn rendering(mut self, capability: RenderingCapability) -> Self {
        self.config.rendering = capability;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn status_callback(mut self, cb: Arc<dyn StatusCallback>) -> Self {
        self.config.status_callback = Some(cb);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn diagram_engine(mut self, engine: Arc<dyn DiagramEngine>) -> Self {
        self.config.diagram_engine = Some(engine);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChatConfig, PdfChatError> {
        let c = &self.config;
        if let Some(ref m) = c.model {
            if m.trim().is_empty() {
                return Err(PdfChatError::InvalidConfig(
                    "Model id must not be empty".into(),
                ));
            }
        }
        if c.download_timeout_secs == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn gpt_models_are_openai() {
        assert_eq!(classify_model("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(classify_model("gpt-4.1-nano"), ProviderKind::OpenAi);
        assert_eq!(classify_model("GPT-4o"), ProviderKind::OpenAi);
        assert_eq!(classify_model("  gpt-4o-mini"), ProviderKind::OpenAi);
    }

    #[test]
    fn everything_else_is_gemini() {
        assert_eq!(classify_model("gemini-1.5-pro"), ProviderKind::Gemini);
        assert_eq!(classify_model("claude-sonnet-4"), ProviderKind::Gemini);
        assert_eq!(classify_model("gp"), ProviderKind::Gemini);
        assert_eq!(classify_model(""), ProviderKind::Gemini);
        assert_eq!(classify_model("my-gpt"), ProviderKind::Gemini);
    }

    #[test]
    fn resolve_reads_only_the_classified_credential() {
        let seen = RefCell::new(Vec::new());
        let pc = ProviderConfig::resolve(Some("gpt-4o"), |name| {
            seen.borrow_mut().push(name.to_string());
            Some("sk-test".to_string())
        });
        assert_eq!(pc.kind, ProviderKind::OpenAi);
        assert_eq!(pc.api_key.as_deref(), Some("sk-test"));
        assert_eq!(*seen.borrow(), vec!["OPENAI_API_KEY".to_string()]);

        seen.borrow_mut().clear();
        let pc = ProviderConfig::resolve(Some("gemini-1.5-pro"), |name| {
            seen.borrow_mut().push(name.to_string());
            None
        });
        assert_eq!(pc.kind, ProviderKind::Gemini);
        assert!(!pc.has_credential());
        assert_eq!(*seen.borrow(), vec!["GEMINI_API_KEY".to_string()]);
    }

    #[test]
    fn resolve_falls_back_to_default_model() {
        let pc = ProviderConfig::resolve(None, |_| None);
        assert_eq!(pc.model, DEFAULT_MODEL);
        let pc = ProviderConfig::resolve(Some("   "), |_| None);
        assert_eq!(pc.model, DEFAULT_MODEL);
    }

    #[test]
    fn empty_key_counts_as_absent() {
        let pc = ProviderConfig::resolve(Some("gpt-4o"), |_| Some("  ".into()));
        assert!(!pc.has_credential());
    }

    #[test]
    fn debug_redacts_key() {
        let pc = ProviderConfig::resolve(Some("gpt-4o"), |_| Some("sk-secret".into()));
        let dbg = format!("{pc:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn builder_rejects_empty_model() {
        assert!(ChatConfig::builder().model("").build().is_err());
        assert!(ChatConfig::builder().download_timeout_secs(0).build().is_err());
    }

    #[test]
    fn builder_defaults() {
        let c = ChatConfig::builder().build().unwrap();
        assert_eq!(c.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert!(c.rendering.available);
        assert_eq!(c.download_timeout_secs, 120);
    }

    #[test]
    fn explicit_provider_config_wins() {
        let pc = ProviderConfig::resolve(Some("gemini-2.0-flash"), |_| Some("g-key".into()));
        let c = ChatConfig::builder()
            .model("gpt-4o")
            .provider_config(pc.clone())
            .build()
            .unwrap();
        assert_eq!(c.resolve_provider(), pc);
    }
}
