//! CLI binary for edgequake-pdfchat.
//!
//! A thin shim over the library crate: maps CLI flags to `ChatConfig`, shows
//! status notifications on a spinner and either answers one question/task
//! or runs an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfchat::{
    ChatConfig, ChatSession, Message, RenderingCapability, StatusCallback, TaskDefinition,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI status callback using indicatif ──────────────────────────────────────

/// Terminal status callback: a spinner that shows the latest status line
/// while the library works, cleared with [`CliStatusCallback::idle`] before
/// the answer is printed.
struct CliStatusCallback {
    spinner: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl CliStatusCallback {
    fn new(quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            quiet,
        })
    }

    fn with_spinner(&self, f: impl FnOnce(&ProgressBar)) {
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        let bar = slot.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        f(bar);
    }

    /// Clear the spinner before printing to the terminal.
    fn idle(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        let slot = self.spinner.lock().unwrap_or_else(|p| p.into_inner());
        match *slot {
            Some(ref bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl StatusCallback for CliStatusCallback {
    fn on_status(&self, message: &str) {
        if message.starts_with("Error:") {
            self.println(format!("{} {}", red("✗"), red(message)));
        } else if !self.quiet {
            let message = message.to_string();
            self.with_spinner(|bar| bar.set_message(message));
        }
    }

    fn on_document_loaded(&self, name: &str) {
        if self.quiet {
            return;
        }
        self.println(format!(
            "{} I've read {}. Select a task ({}) or ask away!",
            green("✔"),
            bold(name),
            cyan("/tasks")
        ));
    }

    fn on_task_menu_requested(&self) {
        self.idle();
        print_task_menu(edgequake_pdfchat::tasks::all());
    }
}

fn print_task_menu(tasks: &[TaskDefinition]) {
    eprintln!("{}", bold("Tasks:"));
    for task in tasks {
        eprintln!("  {:<18} {}", cyan(task.id), dim(task.label));
    }
    eprintln!("  {}", dim("Run one with /task <id>"));
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive chat about a local deck
  pdfchat deck.pdf

  # One-shot summary
  pdfchat deck.pdf --task summarize

  # One question, answer as sanitized HTML
  pdfchat deck.pdf --question "What is the burn rate?" --format html

  # Use Gemini, answer as JSON (role, raw markdown, rendered content, diagrams)
  pdfchat --model gemini-1.5-pro https://example.com/memo.pdf --task create-diagrams --format json

INTERACTIVE COMMANDS:
  /open <path|url>   Load another PDF (replaces the current one)
  /tasks             Show the task menu
  /task <id>         Run a task: summarize, tech-questions, create-diagrams
  /copy              Print the last answer's markdown
  /help              Show this list
  /quit              Exit
  anything else      Asked as a question about the loaded document

PROVIDER ROUTING:
  Model ids starting with "gpt" go to OpenAI, everything else to Gemini.

ENVIRONMENT VARIABLES:
  EDGEQUAKE_MODEL     Model id (default gpt-4o)
  OPENAI_API_KEY      OpenAI API key (gpt* models)
  GEMINI_API_KEY      Google Gemini API key (all other models)
  PDFIUM_LIB_PATH     Path to libpdfium, else the system library is used
  RUST_LOG            Log filter, overrides -v / -q
"#;

/// Chat with a PDF document using OpenAI or Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Chat with a PDF document using OpenAI or Gemini",
    long_about = "Load a PDF (local file or URL), then ask questions about it or run \
predefined analysis tasks. Answers are rendered from markdown, including Mermaid diagrams.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL to load at startup.
    input: Option<String>,

    /// LLM model id (e.g. gpt-4o, gpt-4o-mini, gemini-1.5-pro).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Run one task and exit.
    #[arg(long, conflicts_with = "question")]
    task: Option<String>,

    /// Ask one question and exit.
    #[arg(long)]
    question: Option<String>,

    /// How answers are printed.
    #[arg(long, value_enum, default_value = "markdown", env = "PDFCHAT_FORMAT")]
    format: OutputFormat,

    /// Skip markdown rendering; answers are plain text.
    #[arg(long, env = "PDFCHAT_PLAIN")]
    plain: bool,

    /// Path to a text file containing a custom system instruction for questions.
    #[arg(long, env = "PDFCHAT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except answers and errors.
    #[arg(short, long, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// The answer's markdown.
    Markdown,
    /// The rendered (sanitized) HTML, or plain text when rendering is off.
    Html,
    /// The full message as JSON.
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries progress; library logs stay at warn unless asked.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build session ────────────────────────────────────────────────────
    let status = CliStatusCallback::new(cli.quiet);
    let config = build_config(&cli, Arc::clone(&status)).await?;
    let session = ChatSession::new(config).context("Failed to start chat session")?;

    if let Some(ref input) = cli.input {
        let opened = session.open(input).await;
        status.idle();
        opened.with_context(|| format!("Failed to open '{input}'"))?;
    }

    // ── One-shot mode ────────────────────────────────────────────────────
    let one_shot = match (cli.task.as_deref(), cli.question.as_deref()) {
        (Some(task), _) => Some(session.run_task(task).await),
        (None, Some(question)) => Some(session.ask(question).await),
        (None, None) => None,
    };
    if let Some(message) = one_shot {
        status.idle();
        return print_message(&message, cli.format);
    }

    // ── Interactive mode ─────────────────────────────────────────────────
    run_repl(&session, &status, cli.format).await
}

/// Map CLI args to `ChatConfig`.
async fn build_config(cli: &Cli, status: Arc<CliStatusCallback>) -> Result<ChatConfig> {
    let mut builder = ChatConfig::builder()
        .download_timeout_secs(cli.download_timeout)
        .status_callback(status as Arc<dyn StatusCallback>);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if cli.plain {
        builder = builder.rendering(RenderingCapability::plain_text());
    }
    if let Some(ref path) = cli.system_prompt {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_instruction(instruction.trim().to_string());
    }

    builder.build().context("Invalid configuration")
}

fn print_message(message: &Message, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Markdown => println!("{}", message.copy_text()),
        OutputFormat::Html => println!("{}", message.content.as_str()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(message).context("Failed to serialise message")?
        ),
    }
    Ok(())
}

fn print_help() {
    eprintln!("{}", bold("Commands:"));
    for (cmd, what) in [
        ("/open <path|url>", "load another PDF"),
        ("/tasks", "show the task menu"),
        ("/task <id>", "run a task"),
        ("/copy", "print the last answer's markdown"),
        ("/help", "show this list"),
        ("/quit", "exit"),
    ] {
        eprintln!("  {:<18} {}", cyan(cmd), dim(what));
    }
    eprintln!("  {}", dim("Anything else is asked as a question."));
}

async fn run_repl(
    session: &ChatSession,
    status: &CliStatusCallback,
    format: OutputFormat,
) -> Result<()> {
    if session.document_name().is_none() {
        eprintln!(
            "{} Open a PDF with {} to get started ({} for commands).",
            cyan("◆"),
            cyan("/open <path|url>"),
            cyan("/help")
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_answer: Option<Message> = None;

    loop {
        eprint!("{} ", bold(">"));
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/tasks" => session.request_task_menu(),
            "/copy" => match last_answer {
                Some(ref m) => println!("{}", m.copy_text()),
                None => eprintln!("{}", dim("Nothing to copy yet.")),
            },
            "/open" if arg.is_empty() => eprintln!("{}", red("Usage: /open <path|url>")),
            "/open" => {
                // Failures are already reported through the status callback.
                let _ = session.open(arg).await;
                status.idle();
            }
            "/task" if arg.is_empty() => session.request_task_menu(),
            "/task" => {
                let label = match edgequake_pdfchat::tasks::resolve(arg) {
                    Ok(task) => task.label,
                    Err(_) => arg,
                };
                eprintln!("{} {}", cyan("◆"), bold(label));
                let message = session.run_task(arg).await;
                status.idle();
                print_message(&message, format)?;
                last_answer = Some(message);
            }
            _ if command.starts_with('/') => {
                eprintln!("{} unknown command {}", red("✗"), command);
                print_help();
            }
            _ => {
                let message = session.ask(line).await;
                status.idle();
                print_message(&message, format)?;
                last_answer = Some(message);
            }
        }
    }

    Ok(())
}
