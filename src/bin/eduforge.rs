//! CLI binary for eduforge.
//!
//! A thin shim over the library crate: maps flags to `ExtractorConfig`,
//! runs one submission, prints the passage and questions, then quizzes the
//! user on stdin.

use anyhow::{bail, Context, Result};
use clap::Parser;
use eduforge::{
    check_all, run_submission, CheckOutcome, Credential, ExtractionResult, ExtractorConfig,
    InputMode,
    PdfiumRasterizer, Session, SubmissionObserver, SubmissionState, SubmissionTracker,
    UploadedFile, UserAnswers, Verdict,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Spinner driven by submission state ───────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shows what the submission is waiting on. Cleared on any terminal state.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SubmissionObserver for SpinnerObserver {
    fn on_transition(&self, _from: SubmissionState, to: SubmissionState) {
        match to {
            SubmissionState::FileAcquired => self.bar.set_message("Reading file…"),
            SubmissionState::Rasterizing => self.bar.set_message("Rendering pages…"),
            SubmissionState::TextExtracting => self.bar.set_message("Extracting text…"),
            SubmissionState::AwaitingModel => self.bar.set_message("Extracting…"),
            SubmissionState::Parsed | SubmissionState::Idle => self.bar.finish_and_clear(),
            s if s.is_terminal() => self.bar.finish_and_clear(),
            _ => {}
        }
    }

    fn on_pages(&self, count: usize) {
        self.bar
            .println(format!("  {} {} page image(s)", green("✓"), count));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Quiz yourself on a scanned worksheet
  eduforge worksheet.pdf

  # A photo of a textbook page
  eduforge page.jpg

  # A spreadsheet of questions and answers, text mode only
  eduforge --mode text answers.xlsx

  # Print the extracted passage and questions as JSON, no quiz
  eduforge --json notes.txt > quiz.json

  # Use another model or an OpenAI-compatible gateway
  eduforge --model openai/gpt-4o-mini --base-url https://gateway.local/v1 scan.png

ACCEPTED FILES:
  image/*                      photos and scans (sent as page images)
  application/pdf              every page rendered at --scale (default 1.5)
  text/plain                   sent as-is
  text/csv, .xls, .xlsx        first sheet flattened into a text table

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      API key (required)
  EDUFORGE_MODEL          Override model ID
  EDUFORGE_BASE_URL       Override the endpoint base URL
  PDFIUM_LIB_PATH         Path to libpdfium for PDF rendering
  RUST_LOG                Override the log filter
"#;

/// Turn study material into a self-quiz with a hosted model.
#[derive(Parser, Debug)]
#[command(
    name = "eduforge",
    version,
    about = "Extract a reading passage and Q&A from a document and quiz yourself on it",
    long_about = "Send an image, PDF, text file, CSV or spreadsheet to a hosted vision/language \
model, extract the reading passage and question/answer pairs, then answer the questions and have \
each answer checked: exact match first, semantic equivalence by the model otherwise.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to extract from.
    file: PathBuf,

    /// OpenRouter (or compatible) API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "EDUFORGE_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "EDUFORGE_BASE_URL")]
    base_url: Option<String>,

    /// Declared MIME type; guessed from the extension when omitted.
    #[arg(long)]
    mime: Option<String>,

    /// Which uploads to accept: auto, vision (image/PDF), text (text/CSV/Excel).
    #[arg(long, value_enum, default_value = "auto")]
    mode: ModeArg,

    /// Path to a text file replacing the extraction instruction.
    #[arg(long, env = "EDUFORGE_PROMPT")]
    prompt: Option<PathBuf>,

    /// PDF render scale (0.25–4.0).
    #[arg(long, env = "EDUFORGE_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "EDUFORGE_PDF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Model call timeout in seconds. No timeout when omitted.
    #[arg(long, env = "EDUFORGE_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Print the extraction result as JSON and exit.
    #[arg(long)]
    json: bool,

    /// Print the passage and questions without quizzing.
    #[arg(long)]
    no_quiz: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EDUFORGE_VERBOSE")]
    verbose: bool,

    /// Suppress everything except results and errors.
    #[arg(short, long, env = "EDUFORGE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Auto,
    Vision,
    Text,
}

impl From<ModeArg> for InputMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Auto => InputMode::Auto,
            ModeArg::Vision => InputMode::Vision,
            ModeArg::Text => InputMode::Text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs from
    // tearing through it.
    let show_progress = !cli.quiet && !cli.json && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Session ──────────────────────────────────────────────────────────
    let session = start_session(&cli).await?;
    let rasterizer = PdfiumRasterizer::from_config(session.config());

    // ── Extract ──────────────────────────────────────────────────────────
    let file = UploadedFile::from_path(&cli.file, cli.mime.as_deref())
        .await
        .with_context(|| format!("Cannot read {}", cli.file.display()))?;

    let mut tracker = if show_progress {
        SubmissionTracker::new(SpinnerObserver::new())
    } else {
        SubmissionTracker::default()
    };

    let Some(result) = run_submission(&session, &rasterizer, file, &mut tracker)
        .await
        .context("Extraction failed")?
    else {
        if !cli.quiet {
            eprintln!("{} Nothing to submit: the file has no content.", yellow("⚠"));
        }
        return Ok(());
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
        return Ok(());
    }

    print_result(&result).context("Failed to write to stdout")?;
    tracker.advance(SubmissionState::Rendered);

    if cli.no_quiz || result.qna.is_empty() {
        return Ok(());
    }

    // ── Quiz ─────────────────────────────────────────────────────────────
    tracker.advance(SubmissionState::AwaitingUserAnswers);
    let answers = read_answers(&result).await?;
    let outcomes = check_all(&session, &result, &answers).await;

    let failed = outcomes.iter().any(|(_, o)| o.is_error());
    tracker.advance(if failed {
        SubmissionState::ErrorChecking
    } else {
        SubmissionState::Checked
    });

    print_outcomes(&result, &outcomes).context("Failed to write to stdout")?;
    if failed {
        bail!("Some answers could not be verified");
    }
    Ok(())
}

/// Check the key, then load the config. A missing key stops everything
/// before any file (the prompt override included) is read.
async fn start_session(cli: &Cli) -> Result<Session> {
    let credential = Credential::new(cli.api_key.clone().unwrap_or_default())
        .context("Cannot start a session")?;
    let config = build_config(cli).await?;
    let session = Session::with_credential(credential, config)
        .context("Cannot start a session")?
        .with_mode(cli.mode.into());
    Ok(session)
}

/// Map CLI args to `ExtractorConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder().render_scale(cli.scale);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.pdf_password(pwd);
    }
    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.extraction_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

fn print_result(result: &ExtractionResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if result.has_passage() {
        writeln!(out, "{}\n", bold("Passage"))?;
        writeln!(out, "{}\n", result.passage.trim_end())?;
    }

    if result.qna.is_empty() {
        writeln!(out, "{}", dim("No questions found."))?;
        return Ok(());
    }

    writeln!(out, "{}\n", bold("Questions"))?;
    for (i, pair) in result.qna.iter().enumerate() {
        writeln!(out, "{:>3}. {}", i + 1, pair.question)?;
    }
    writeln!(out)
}

/// Prompt for one answer per question. EOF leaves the rest unanswered.
async fn read_answers(result: &ExtractionResult) -> Result<UserAnswers> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answers = UserAnswers::new();

    for (i, pair) in result.qna.iter().enumerate() {
        eprint!("{} {}\n     > ", bold(&format!("{:>3}.", i + 1)), pair.question);
        io::stderr().flush().ok();

        match lines.next_line().await.context("Failed to read answer")? {
            Some(line) => {
                answers.insert(i, line);
            }
            None => {
                eprintln!();
                break;
            }
        }
    }
    Ok(answers)
}

fn print_outcomes(result: &ExtractionResult, outcomes: &[(usize, CheckOutcome)]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut correct = 0;
    let mut decided = 0;

    writeln!(out, "\n{}\n", bold("Results"))?;
    for (idx, outcome) in outcomes {
        let reference = result.qna[*idx].answer.as_deref().unwrap_or("—");
        let line = match outcome {
            CheckOutcome::Verdict(Verdict::Unanswered) => dim("not answered"),
            CheckOutcome::Verdict(Verdict::NoReference) => {
                yellow("no answer in the material to compare with")
            }
            CheckOutcome::Verdict(Verdict::Match) => green("✓ correct"),
            CheckOutcome::Verdict(Verdict::Judged {
                equivalent: true,
                explanation,
            }) => format!("{} {}", green("✓ correct"), dim(explanation)),
            CheckOutcome::Verdict(Verdict::Judged {
                equivalent: false,
                explanation,
            }) => format!(
                "{} (expected: {}) {}",
                red("✗ incorrect"),
                reference,
                dim(explanation)
            ),
            CheckOutcome::Error(e) => red(&format!("could not verify: {e}")),
        };
        if let CheckOutcome::Verdict(v) = outcome {
            if let Some(ok) = v.is_correct() {
                decided += 1;
                if ok {
                    correct += 1;
                }
            }
        }
        writeln!(out, "{:>3}. {}", idx + 1, line)?;
    }

    if decided > 0 {
        writeln!(out, "\nScore: {}/{}", bold(&correct.to_string()), decided)?;
    }
    Ok(())
}
