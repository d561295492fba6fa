//! Integration tests for `ChatSession`.
//!
//! Text extraction and the provider are replaced with in-process fakes, so
//! these run without pdfium or network access. The live test at the bottom
//! is gated behind `E2E_ENABLED` and needs a real PDF plus an API key.
//!
//! Run with:
//!   cargo test --test session
//!
//! Set `RUST_LOG=edgequake_pdfchat=debug` to see the library's log lines.
//!
//! Live round trip:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test session live_ -- --nocapture

use async_trait::async_trait;
use edgequake_pdfchat::{
    ChannelStatusCallback, ChatConfig, ChatSession, CompletionBackend, CompletionRequest,
    PdfChatError, ProviderConfig, ProviderKind, RenderOutcome, RenderedContent,
    RenderingCapability, Role, StatusCallback, StatusEvent, TextExtractor, NO_DOCUMENT_MESSAGE,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// `%PDF<text>` extracts to `<text>`; anything else is unparseable.
struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract_text(&self, name: &str, bytes: Vec<u8>) -> Result<String, PdfChatError> {
        match bytes.strip_prefix(b"%PDF") {
            Some(rest) => Ok(String::from_utf8_lossy(rest).trim().to_string()),
            None => Err(PdfChatError::Parse {
                name: name.to_string(),
                detail: "no PDF header".into(),
            }),
        }
    }
}

/// Records every call and answers with a fixed reply.
#[derive(Default)]
struct FakeBackend {
    reply: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<(ProviderKind, String, String)>>,
    /// When set, each call signals `started` and waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeBackend {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.2.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, PdfChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((
            request.kind,
            request.model.to_string(),
            request.prompt.to_string(),
        ));
        if let Some((ref started, ref release)) = self.gate {
            started.notify_one();
            release.notified().await;
        }
        Ok(self.reply.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Route library logs to the test harness writer, filtered by `RUST_LOG`.
/// Safe to call from every test; only the first call installs a subscriber.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn provider(model: &str, key: Option<&str>) -> ProviderConfig {
    let key = key.map(str::to_string);
    ProviderConfig::resolve(Some(model), move |_| key.clone())
}

fn session_with(backend: Arc<FakeBackend>, provider: ProviderConfig) -> ChatSession {
    init_tracing();
    let config = ChatConfig::builder()
        .provider_config(provider)
        .backend(backend as Arc<dyn CompletionBackend>)
        .extractor(Arc::new(FakeExtractor) as Arc<dyn TextExtractor>)
        .build()
        .unwrap();
    ChatSession::new(config).unwrap()
}

fn session(backend: Arc<FakeBackend>) -> ChatSession {
    session_with(backend, provider("gpt-4o", Some("sk-test")))
}

fn pdf(text: &str) -> Vec<u8> {
    format!("%PDF{text}").into_bytes()
}

// ── No document ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_document_replies_without_calling_provider() {
    let backend = FakeBackend::replying("unused");
    let s = session(backend.clone());

    for message in [
        s.ask("What is the ARR?").await,
        s.run_task("summarize").await,
        // The document check comes before the task lookup.
        s.run_task("does-not-exist").await,
    ] {
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(
            message.content,
            RenderedContent::PlainText(NO_DOCUMENT_MESSAGE.into())
        );
    }
    assert_eq!(backend.calls(), 0);
    assert!(matches!(
        s.try_ask("q").await,
        Err(PdfChatError::NoDocument)
    ));
}

// ── Prompt layout ────────────────────────────────────────────────────────────

#[tokio::test]
async fn question_prompt_carries_system_instruction() {
    let backend = FakeBackend::replying("Three founders.");
    let s = session(backend.clone());
    s.load_document(pdf("Acme builds rockets."), "acme.pdf")
        .await
        .unwrap();

    let message = s.ask("Who founded it?").await;
    assert_eq!(message.copy_text(), "Three founders.");
    assert_eq!(
        backend.last_prompt(),
        "You are a helpful assistant analyzing an investor document.\n\n\
Document content:\nAcme builds rockets.\n\nUser question: Who founded it?"
    );
}

#[tokio::test]
async fn task_prompt_has_no_system_instruction() {
    let backend = FakeBackend::replying("Summary.");
    let s = session(backend.clone());
    s.load_document(pdf("Deck text"), "deck.pdf").await.unwrap();

    s.run_task("tech-questions").await;
    let prompt = backend.last_prompt();
    assert!(prompt.starts_with("Document content:\nDeck text\n\nUser question: "));
    assert!(prompt.ends_with(
        "please prepare a list of 5-10 technical due diligence questions to ask the team."
    ));
}

#[tokio::test]
async fn long_documents_are_truncated_in_the_prompt() {
    let backend = FakeBackend::replying("ok");
    let s = session(backend.clone());
    let text = "é".repeat(100_050);
    s.load_document(pdf(&text), "long.pdf").await.unwrap();

    s.run_task("summarize").await;
    let prompt = backend.last_prompt();
    let body = prompt
        .strip_prefix("Document content:\n")
        .and_then(|p| p.split("\n\nUser question: ").next())
        .unwrap();
    assert_eq!(body.chars().count(), 100_000);
    // The stored document itself is not truncated.
    assert_eq!(
        s.store().require().unwrap().text.chars().count(),
        100_050
    );
}

// ── Loading ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_load_keeps_previous_document() {
    let backend = FakeBackend::replying("ok");
    let s = session(backend.clone());
    s.load_document(pdf("Original text"), "first.pdf")
        .await
        .unwrap();

    let err = s
        .load_document(b"garbage".to_vec(), "broken.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, PdfChatError::Parse { .. }), "got {err:?}");
    assert_eq!(s.document_name().as_deref(), Some("first.pdf"));

    s.ask("anything").await;
    assert!(backend.last_prompt().contains("Original text"));
}

#[tokio::test]
async fn open_reads_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series-a.pdf");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"%PDF Series A deck")
        .unwrap();

    let s = session(FakeBackend::replying("ok"));
    let doc = s.open(path.to_str().unwrap()).await.unwrap();
    assert_eq!(doc.name, "series-a.pdf");
    assert_eq!(doc.text, "Series A deck");
    assert_eq!(s.document_name().as_deref(), Some("series-a.pdf"));
}

#[tokio::test]
async fn open_missing_file_reports_error_status() {
    let (cb, mut rx) = ChannelStatusCallback::new();
    let config = ChatConfig::builder()
        .provider_config(provider("gpt-4o", Some("sk")))
        .backend(FakeBackend::replying("ok") as Arc<dyn CompletionBackend>)
        .extractor(Arc::new(FakeExtractor) as Arc<dyn TextExtractor>)
        .status_callback(cb as Arc<dyn StatusCallback>)
        .build()
        .unwrap();
    let s = ChatSession::new(config).unwrap();

    let err = s.open("/no/such/deck.pdf").await.unwrap_err();
    assert!(matches!(err, PdfChatError::FileNotFound { .. }));
    match rx.try_recv().unwrap() {
        StatusEvent::Status(line) => assert!(line.starts_with("Error: "), "got {line}"),
        other => panic!("expected status, got {other:?}"),
    }
}

// ── Provider routing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credential_never_reaches_provider() {
    let backend = FakeBackend::replying("unused");
    let s = session_with(backend.clone(), provider("gpt-4o-mini", None));
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let message = s.ask("q").await;
    assert_eq!(
        message.content,
        RenderedContent::PlainText("Error: No API key found for OpenAI: set OPENAI_API_KEY".into())
    );
    assert!(message.raw_markdown.is_none());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn non_gpt_models_go_to_gemini() {
    let backend = FakeBackend::replying("ok");
    let s = session_with(backend.clone(), provider("gemini-1.5-pro", Some("g-key")));
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    s.ask("q").await;
    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[0].0, ProviderKind::Gemini);
    assert_eq!(requests[0].1, "gemini-1.5-pro");
}

#[tokio::test]
async fn unknown_task_is_reported() {
    let backend = FakeBackend::replying("unused");
    let s = session(backend.clone());
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let message = s.run_task("valuation").await;
    assert_eq!(message.copy_text(), "Error: Unknown task 'valuation'");
    assert_eq!(backend.calls(), 0);
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_good_and_one_broken_diagram() {
    let answer = "## Funding\n\n```mermaid\ngraph LR\n  Seed --> SeriesA[Series A]\n```\n\n\
## Team\n\n``` Mermaid\nflowchart TD\n  CEO[Jane --> CTO\n```\n";
    let backend = FakeBackend::replying(answer);
    let s = session(backend);
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let message = s.run_task("create-diagrams").await;
    assert_eq!(message.diagrams.len(), 2);
    assert_eq!(message.diagrams[0].outcome, RenderOutcome::Success);
    assert!(matches!(
        message.diagrams[1].outcome,
        RenderOutcome::Failed { .. }
    ));
    assert_eq!(
        message.diagrams[1].source_text,
        "flowchart TD\n  CEO[Jane --> CTO\n"
    );

    let html = match message.content {
        RenderedContent::Html(ref html) => html.as_str(),
        ref other => panic!("expected HTML, got {other:?}"),
    };
    assert_eq!(html.matches("<pre class=\"mermaid\">").count(), 1);
    assert_eq!(
        html.matches("Failed to render diagram. Showing raw syntax:")
            .count(),
        1
    );
    assert!(html.find("Funding").unwrap() < html.find("Team").unwrap());
    // The canonicalised fence is what gets copied.
    assert!(message.copy_text().contains("```mermaid\nflowchart TD"));
}

#[tokio::test]
async fn script_tags_never_reach_the_output() {
    let backend = FakeBackend::replying(
        "Looks fine.<script>document.cookie</script>\n\n<a href=\"javascript:alert(1)\">link</a>",
    );
    let s = session(backend);
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let message = s.ask("q").await;
    let html = message.content.as_str();
    assert!(message.content.is_html());
    assert!(!html.contains("<script"));
    assert!(!html.contains("javascript:"));
    assert!(html.contains("Looks fine."));
}

#[tokio::test]
async fn plain_rendering_returns_markdown_verbatim() {
    let config = ChatConfig::builder()
        .provider_config(provider("gpt-4o", Some("sk")))
        .backend(FakeBackend::replying("```markdown\n**Burn:** $1M/month\n```") as Arc<dyn CompletionBackend>)
        .extractor(Arc::new(FakeExtractor) as Arc<dyn TextExtractor>)
        .rendering(RenderingCapability::plain_text())
        .build()
        .unwrap();
    let s = ChatSession::new(config).unwrap();
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let message = s.ask("burn?").await;
    assert_eq!(
        message.content,
        RenderedContent::PlainText("**Burn:** $1M/month".into())
    );
    assert_eq!(message.copy_text(), "**Burn:** $1M/month");
    assert!(message.diagrams.is_empty());
}

#[tokio::test]
async fn try_ask_returns_the_unmodified_answer() {
    let s = session(FakeBackend::replying("```md\nraw\n```"));
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();
    assert_eq!(s.try_ask("q").await.unwrap(), "```md\nraw\n```");
}

// ── Notifications ────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_events_in_order() {
    let (cb, mut rx) = ChannelStatusCallback::new();
    let config = ChatConfig::builder()
        .provider_config(provider("gpt-4o", Some("sk")))
        .backend(FakeBackend::replying("ok") as Arc<dyn CompletionBackend>)
        .extractor(Arc::new(FakeExtractor) as Arc<dyn TextExtractor>)
        .status_callback(cb as Arc<dyn StatusCallback>)
        .build()
        .unwrap();
    let s = ChatSession::new(config).unwrap();

    s.load_document(pdf("text"), "deck.pdf").await.unwrap();
    s.request_task_menu();
    s.run_task("summarize").await;

    let events: Vec<StatusEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(
        events,
        vec![
            StatusEvent::Status("Reading file: deck.pdf...".into()),
            StatusEvent::Status("Parsing PDF...".into()),
            StatusEvent::Status("File loaded successfully.".into()),
            StatusEvent::DocumentLoaded("deck.pdf".into()),
            StatusEvent::TaskMenuRequested,
            StatusEvent::Status("Asking OpenAI (gpt-4o)...".into()),
            StatusEvent::Status("Response received from OpenAI.".into()),
        ]
    );
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_requests_are_rejected() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend {
        reply: "first answer".into(),
        gate: Some((started.clone(), release.clone())),
        ..Default::default()
    });
    let s = Arc::new(session(backend.clone()));
    s.load_document(pdf("text"), "deck.pdf").await.unwrap();

    let first = tokio::spawn({
        let s = Arc::clone(&s);
        async move { s.ask("first").await }
    });
    started.notified().await;
    assert!(s.is_busy());

    assert!(matches!(s.try_ask("second").await, Err(PdfChatError::Busy)));
    let rejected = s.run_task("summarize").await;
    assert!(rejected.copy_text().starts_with("Error: Another request"));

    release.notify_one();
    let answer = first.await.unwrap();
    assert_eq!(answer.copy_text(), "first answer");
    assert_eq!(backend.calls(), 1);
    assert!(!s.is_busy());
}

#[tokio::test]
async fn repeated_tracing_setup_keeps_sessions_working() {
    init_tracing();
    init_tracing();
    let backend = FakeBackend::replying("Fine.");
    let s = session(backend.clone());
    s.load_document(pdf("Deck"), "deck.pdf").await.unwrap();
    assert_eq!(s.ask("How is it?").await.copy_text(), "Fine.");
}

// ── Live round trip ──────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn live_summarize_real_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("deck.pdf"));
    init_tracing();

    let s = ChatSession::new(ChatConfig::default()).unwrap();
    s.open(path.to_str().unwrap()).await.unwrap();

    let message = s.run_task("summarize").await;
    println!("{}", message.copy_text());
    assert!(message.raw_markdown.is_some(), "got {:?}", message.content);
    assert!(!message.copy_text().trim().is_empty());
}
