//! CLI binary for exam2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the batch, and prints a per-exam summary.

use anyhow::{Context, Result};
use clap::Parser;
use exam2json::{
    run_batch, ArtifactKind, ExamProgressCallback, ExamRegistry, ExtractionConfig,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per document, with per-page log
/// lines distinguishing cache hits from fresh extractions.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} pages",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Arc::new(Self { bar })
    }
}

impl ExamProgressCallback for CliProgress {
    fn on_document_start(&self, exam: &str, kind: ArtifactKind, total_pages: usize) {
        self.bar.reset();
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix(format!("{exam} {kind}"));
    }

    fn on_page_cached(&self, page_index: usize, fragments: usize) {
        self.bar.println(format!(
            "  {} page {:>3}  {}",
            green("✓"),
            page_index,
            dim(&format!("{fragments} fragments (cache)")),
        ));
        self.bar.inc(1);
    }

    fn on_page_extracted(&self, page_index: usize, fragments: usize) {
        self.bar.println(format!(
            "  {} page {:>3}  {}",
            green("✓"),
            page_index,
            dim(&format!("{fragments} fragments")),
        ));
        self.bar.inc(1);
    }

    fn on_page_failed(&self, page_index: usize, error: &str) {
        let msg = truncate_message(error, 79);
        self.bar
            .println(format!("  {} page {:>3}  {}", red("✗"), page_index, red(&msg)));
        self.bar.inc(1);
    }

    fn on_exam_complete(&self, exam: &str, records: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {} merged records",
            green("✔"),
            bold(exam),
            records
        );
    }
}

/// Truncate very long error messages to keep the log tidy.
///
/// Counts characters, not bytes: provider error text is arbitrary UTF-8 and
/// a fixed byte slice could land inside a multibyte character.
fn truncate_message(error: &str, max_chars: usize) -> String {
    match error.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
        None => error.to_string(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digitize every configured exam
  exam2json

  # Quick end-to-end check on the first two pages of each document
  exam2json --test

  # One exam, explicit model
  exam2json --exam P --provider anthropic --model claude-sonnet-4-20250514

  # Custom locations
  exam2json --pdf-dir ./pdf --cache-dir ./interim --output-dir ./processed

CACHING:
  Each successfully parsed page is stored as
    {cache-dir}/{exam}_{questions|answers}_{page}.json
  and is authoritative on later runs. Delete a file to force that page
  through extraction again; failed pages are never cached and retry
  automatically on the next run.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
"#;

/// Digitize scanned exam PDFs into structured question/answer JSON.
#[derive(Parser, Debug)]
#[command(
    name = "exam2json",
    version,
    about = "Digitize scanned exam PDFs into structured question/answer JSON using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Test mode: process only the first pages of each document.
    #[arg(long, env = "EXAM2JSON_TEST")]
    test: bool,

    /// Exam code to process (repeatable). Default: all configured exams.
    #[arg(long = "exam", env = "EXAM2JSON_EXAM")]
    exams: Vec<String>,

    /// Directory containing the source exam PDFs.
    #[arg(long, env = "EXAM2JSON_PDF_DIR", default_value = "pdf")]
    pdf_dir: PathBuf,

    /// Directory for the per-page result cache.
    #[arg(long, env = "EXAM2JSON_CACHE_DIR", default_value = "interim")]
    cache_dir: PathBuf,

    /// Directory receiving the per-exam output JSON files.
    #[arg(long, env = "EXAM2JSON_OUTPUT_DIR", default_value = "processed")]
    output_dir: PathBuf,

    /// Vision model ID (e.g. claude-sonnet-4-20250514, gpt-4.1).
    #[arg(long, env = "EXAM2JSON_MODEL")]
    model: Option<String>,

    /// Provider: anthropic, openai, gemini, ollama. Auto-detected if unset.
    #[arg(long, env = "EXAM2JSON_PROVIDER")]
    provider: Option<String>,

    /// Max model output tokens per page.
    #[arg(long, env = "EXAM2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "EXAM2JSON_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on a transport failure.
    #[arg(long, env = "EXAM2JSON_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Disable the progress bar.
    #[arg(long, env = "EXAM2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAM2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAM2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build config ─────────────────────────────────────────────────────
    let registry = ExamRegistry::actuarial_samples(&cli.pdf_dir);
    let registry = if cli.exams.is_empty() {
        registry
    } else {
        let mut subset = ExamRegistry::new();
        for code in &cli.exams {
            let entry = registry
                .resolve(code)
                .with_context(|| format!("--exam {code}"))?;
            subset = subset.with_exam(code.clone(), entry.clone());
        }
        subset
    };

    let mut builder = ExtractionConfig::builder()
        .exams(registry)
        .cache_dir(&cli.cache_dir)
        .output_dir(&cli.output_dir)
        .test_mode(cli.test)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if show_progress {
        builder = builder.progress_callback(CliProgress::new() as ProgressCallback);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run the batch ────────────────────────────────────────────────────
    let report = run_batch(&config).await.context("Digitization failed")?;

    if !cli.quiet {
        for output in &report.succeeded {
            eprintln!(
                "{}  {}  {} records  →  {}",
                green("✔"),
                bold(&output.exam),
                output.records,
                output.path.display()
            );
        }
        for (exam, error) in &report.failed {
            eprintln!("{}  {}  {}", red("✘"), bold(exam), red(error));
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!("{}/{} exams failed",
            report.failed.len(),
            report.failed.len() + report.succeeded.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::truncate_message;

    #[test]
    fn short_message_passes_through() {
        assert_eq!(truncate_message("503 overloaded", 79), "503 overloaded");
    }

    #[test]
    fn long_ascii_message_is_truncated_with_ellipsis() {
        let error = "x".repeat(120);
        let out = truncate_message(&error, 79);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn multibyte_char_straddling_the_limit_does_not_panic() {
        // 78 one-byte chars followed by a 3-byte em dash: bytes 78..81,
        // so a byte-offset slice at 79 would land mid-character.
        let error = format!("{}\u{2014}x", "e".repeat(78));
        assert_eq!(error.len(), 82);

        let out = truncate_message(&error, 79);
        // 79 complete characters survive; nothing is sliced mid-character.
        assert!(out.starts_with(&"e".repeat(78)));

        // And a message long enough to truncate cuts on the boundary.
        let error = format!("{}{}", "\u{2014}".repeat(80), "tail");
        let out = truncate_message(&error, 79);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('\u{2026}'));
    }
}
