//! The top-level chat session.
//!
//! [`ChatSession`] wires the document store, prompt builder, provider router
//! and renderer together and exposes the handlers a presentation layer calls:
//! open a document, ask a question, run a task, show the task menu.
//!
//! ## Two flavours of every request
//!
//! * [`ChatSession::ask`] / [`ChatSession::run_task`] never fail. Every
//!   error becomes an assistant [`Message`] (`"Error: …"`, plain text) ready
//!   to append to a transcript.
//! * [`ChatSession::try_ask`] / [`ChatSession::try_run_task`] return the raw
//!   answer or the [`PdfChatError`], for library callers.
//!
//! Both check for a loaded document before anything else. Without one the
//! prompt builder and the provider are never touched.
//!
//! ## One request at a time
//!
//! A session serves a single user. A question or task issued while another
//! is still waiting on the provider is rejected with [`PdfChatError::Busy`]
//! instead of being queued.

use crate::config::ChatConfig;
use crate::error::PdfChatError;
use crate::pipeline::diagram::{DiagramEngine, MermaidEngine};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::input::resolve_input;
use crate::pipeline::llm::{CompletionBackend, EdgequakeBackend, ProviderRouter};
use crate::pipeline::postprocess::normalise_answer;
use crate::pipeline::render::{DiagramBlock, RenderedContent, ResponseRenderer};
use crate::prompts::build_prompt;
use crate::status::StatusChannel;
use crate::store::{Document, DocumentStore};
use crate::tasks::{self, TaskDefinition};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Reply to a question or task issued before any document was loaded.
pub const NO_DOCUMENT_MESSAGE: &str = "Please open a PDF file first.";

/// Who wrote a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Normalised markdown of an assistant answer. `None` for user input and
    /// for error and notice messages.
    pub raw_markdown: Option<String>,
    pub content: RenderedContent,
    /// Diagrams found in the answer, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagrams: Vec<DiagramBlock>,
}

impl Message {
    /// A user entry: the question or the task label.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            raw_markdown: None,
            content: RenderedContent::PlainText(text.into()),
            diagrams: Vec::new(),
        }
    }

    /// An assistant notice shown verbatim.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            raw_markdown: None,
            content: RenderedContent::PlainText(text.into()),
            diagrams: Vec::new(),
        }
    }

    /// The text to put on the clipboard: the original markdown when there is
    /// one, else the displayed text.
    pub fn copy_text(&self) -> &str {
        self.raw_markdown
            .as_deref()
            .unwrap_or_else(|| self.content.as_str())
    }
}

/// Clears the busy flag when the request finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PdfChatError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PdfChatError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A chat over one loaded PDF at a time.
pub struct ChatSession {
    config: ChatConfig,
    store: DocumentStore,
    router: ProviderRouter,
    renderer: ResponseRenderer,
    status: StatusChannel,
    busy: AtomicBool,
}

impl ChatSession {
    /// Resolve the provider configuration and build every component.
    ///
    /// The environment is read here and nowhere else.
    pub fn new(config: ChatConfig) -> Result<Self, PdfChatError> {
        let provider = config.resolve_provider();
        if provider.model.trim().is_empty() {
            return Err(PdfChatError::InvalidConfig(
                "Model id must not be empty".into(),
            ));
        }
        info!(
            "Chat session using {} model {} (credential {})",
            provider.kind,
            provider.model,
            if provider.has_credential() { "present" } else { "missing" }
        );

        let status = StatusChannel::new(config.status_callback.clone());
        let extractor = config
            .extractor
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumExtractor::new()) as Arc<dyn TextExtractor>);
        let backend = config
            .backend
            .clone()
            .unwrap_or_else(|| Arc::new(EdgequakeBackend) as Arc<dyn CompletionBackend>);
        let engine = config
            .diagram_engine
            .clone()
            .unwrap_or_else(|| Arc::new(MermaidEngine::new()) as Arc<dyn DiagramEngine>);

        Ok(Self {
            store: DocumentStore::new(extractor, status.clone()),
            router: ProviderRouter::new(provider, backend, status.clone()),
            renderer: ResponseRenderer::new(config.rendering, engine),
            status,
            busy: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn renderer(&self) -> &ResponseRenderer {
        &self.renderer
    }

    /// Display name of the loaded document.
    pub fn document_name(&self) -> Option<String> {
        self.store.current().map(|d| d.name.clone())
    }

    /// Load a PDF from a local path or an `http(s)://` URL.
    pub async fn open(&self, input: &str) -> Result<Arc<Document>, PdfChatError> {
        let resolved = resolve_input(input, self.config.download_timeout_secs)
            .await
            .inspect_err(|e| self.status.status(format!("Error: {e}")))?;
        self.store.load(resolved.bytes, &resolved.name).await
    }

    /// Load a PDF the host has already read into memory.
    pub async fn load_document(
        &self,
        bytes: Vec<u8>,
        name: &str,
    ) -> Result<Arc<Document>, PdfChatError> {
        self.store.load(bytes, name).await
    }

    /// Ask a free-form question about the loaded document.
    pub async fn ask(&self, question: &str) -> Message {
        let result = self.try_ask(question).await;
        self.message_for(result)
    }

    /// Run a catalog task against the loaded document.
    pub async fn run_task(&self, task_id: &str) -> Message {
        let result = self.try_run_task(task_id).await;
        self.message_for(result)
    }

    /// [`Self::ask`] returning the provider's answer unmodified.
    pub async fn try_ask(&self, question: &str) -> Result<String, PdfChatError> {
        let document = self.store.require()?;
        let _guard = BusyGuard::acquire(&self.busy)?;

        info!("Question about '{}'", document.name);
        let instruction = Some(self.config.system_instruction.as_str()).filter(|s| !s.is_empty());
        let prompt = build_prompt(&document.text, question, instruction);
        self.router.dispatch(&prompt).await
    }

    /// [`Self::run_task`] returning the provider's answer unmodified.
    pub async fn try_run_task(&self, task_id: &str) -> Result<String, PdfChatError> {
        let document = self.store.require()?;
        let task = tasks::resolve(task_id)?;
        let _guard = BusyGuard::acquire(&self.busy)?;

        info!("Task '{}' on '{}'", task.id, document.name);
        let prompt = build_prompt(&document.text, task.prompt_template, None);
        self.router.dispatch(&prompt).await
    }

    /// Tasks in menu order.
    pub fn tasks(&self) -> &'static [TaskDefinition] {
        tasks::all()
    }

    /// Ask the presentation layer to show the task menu.
    pub fn request_task_menu(&self) {
        self.status.task_menu_requested();
    }

    /// Whether a question or task is waiting on the provider.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn message_for(&self, result: Result<String, PdfChatError>) -> Message {
        match result {
            Ok(answer) => self.answer_message(&answer),
            Err(PdfChatError::NoDocument) => Message::assistant_text(NO_DOCUMENT_MESSAGE),
            Err(e) => Message::assistant_text(format!("Error: {e}")),
        }
    }

    fn answer_message(&self, answer: &str) -> Message {
        let markdown = normalise_answer(answer);
        let rendered = self.renderer.render_message(&markdown);
        debug!(
            "Answer rendered as {} with {} diagrams",
            if rendered.content.is_html() { "HTML" } else { "plain text" },
            rendered.diagrams.len()
        );
        Message {
            role: Role::Assistant,
            raw_markdown: Some(markdown),
            content: rendered.content,
            diagrams: rendered.diagrams,
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("provider", self.router.config())
            .field("document", &self.document_name())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}
