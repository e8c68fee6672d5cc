//! CLI binary for docqa.
//!
//! A thin shim over the library crate that maps CLI flags to `ServiceConfig`
//! and either serves the HTTP API or answers one question locally.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docqa::config::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use docqa::{ask, recover, AnswerBody, AskContext, RecoveryStatus, ServiceConfig, Upload};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on port 8000
  docqa serve

  # Ask about a local document
  docqa ask contrato.pdf --question "perguntas de revisão"

  # Same, JSON answer body on stdout
  docqa ask notas.md --question "perguntas objetivas" --json

  # Use a bigger model on another machine
  docqa --ollama-url http://gpu-box:11434 --model llama3.1:70b serve

  # Use a hosted provider instead of Ollama
  OPENAI_API_KEY=sk-... docqa --provider openai --model gpt-4.1-nano ask doc.docx --question "resumo"

  # Replay a saved model completion through the recovery pipeline
  docqa recover completion.txt
  cat completion.txt | docqa recover -

HTTP API:
  POST /ask             multipart: file=<document>, question=<text>
  GET  /health/ollama   backend status and available models

ENVIRONMENT VARIABLES:
  DOCQA_OLLAMA_URL      Ollama base URL (default http://localhost:11434)
  DOCQA_MODEL           Model name (default llama3)
  DOCQA_PROVIDER        Hosted provider (openai, anthropic, gemini, …)
  DOCQA_BIND            Listen address for `serve` (default 0.0.0.0:8000)
  PDFIUM_LIB_PATH       Path to libpdfium, if not on the system library path
  RUST_LOG              Log filter, overrides -v / -q
"#;

/// Ask questions about documents through a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about PDF, DOCX and Markdown documents through a local LLM",
    long_about = "Extracts the text of a PDF, DOCX or Markdown document, asks an Ollama model \
(or a hosted provider) to write questions about it, and repairs the model's JSON answer when \
it comes back malformed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ollama base URL.
    #[arg(long, global = true, env = "DOCQA_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Model name.
    #[arg(long, global = true, env = "DOCQA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Hosted provider (openai, anthropic, gemini, …). Ollama if unset.
    #[arg(long, global = true, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "DOCQA_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Nucleus sampling cut-off (0.0–1.0).
    #[arg(long, global = true, env = "DOCQA_TOP_P", default_value_t = 0.9)]
    top_p: f32,

    /// Characters of document text sent to the model.
    #[arg(long, global = true, env = "DOCQA_MAX_CONTEXT_CHARS", default_value_t = 3000)]
    max_context_chars: usize,

    /// Model call timeout in seconds.
    #[arg(long, global = true, env = "DOCQA_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Retries on connection errors and 5xx answers.
    #[arg(long, global = true, env = "DOCQA_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCQA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCQA_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen address.
        #[arg(long, env = "DOCQA_BIND", default_value = "0.0.0.0:8000")]
        bind: String,

        /// Maximum upload size in MiB.
        #[arg(long, env = "DOCQA_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,
    },

    /// Ask one question about a local document.
    Ask {
        /// PDF, DOCX or Markdown file.
        file: PathBuf,

        /// Kind of questions wanted.
        #[arg(long)]
        question: String,

        /// Print the JSON answer body instead of a list.
        #[arg(long)]
        json: bool,
    },

    /// Run the recovery pipeline on a saved model completion.
    Recover {
        /// File holding the raw completion; `-` or absent reads stdin.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `ask` shows a spinner on stderr; keep INFO logs out of its way.
    let spinner = matches!(cli.command, Command::Ask { json: false, .. }) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    match cli.command {
        Command::Serve {
            ref bind,
            max_upload_mb,
        } => {
            let config = build_config(&cli)?;
            let config = ServiceConfig {
                bind_addr: bind.clone(),
                max_upload_bytes: max_upload_mb * 1024 * 1024,
                ..config
            };
            docqa::server::serve(&config)
                .await
                .context("Server failed")?;
        }

        Command::Ask {
            ref file,
            ref question,
            json,
        } => {
            let config = build_config(&cli)?;
            let ctx = AskContext::from_config(&config).context("Failed to set up model client")?;
            let upload = Upload::from_path(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let bar = (!cli.quiet && !json).then(|| {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
                );
                bar.set_prefix("Asking");
                bar.set_message(format!("{} ({})", upload.filename, config.generation.model));
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            });

            let start = Instant::now();
            let result = ask(&upload, question, &ctx).await;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            let answer = result.context("Failed to answer question")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&answer).context("Failed to serialise answer")?
                );
            } else {
                print_answer(&answer);
                if !cli.quiet {
                    eprintln!("{}", dim(&format!("{}ms", start.elapsed().as_millis())));
                }
            }
        }

        Command::Recover { ref file } => {
            let raw = read_completion(file.as_ref())?;
            let answer = recover(&raw).into_answer();
            println!(
                "{}",
                serde_json::to_string_pretty(&answer).context("Failed to serialise answer")?
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .ollama_url(&cli.ollama_url)
        .model(&cli.model)
        .temperature(cli.temperature)
        .top_p(cli.top_p)
        .max_context_chars(cli.max_context_chars)
        .api_timeout_secs(cli.api_timeout)
        .max_retries(cli.max_retries);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }

    builder.build().context("Invalid configuration")
}

fn read_completion(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
            Ok(raw)
        }
    }
}

fn print_answer(answer: &AnswerBody) {
    for q in answer.perguntas.iter() {
        println!("{}  {}", bold(&q.key), q.text);
    }

    let report = &answer.recovery;
    let tag = match report.status {
        RecoveryStatus::Success => green("✔ success"),
        RecoveryStatus::Degraded => yellow(&format!("⚠ degraded ({})", report.tier)),
        RecoveryStatus::Unrecoverable => red("✘ unrecoverable, placeholder questions"),
    };
    eprintln!("{tag}");
    if let Some(ref diagnostic) = report.diagnostic {
        eprintln!("  {}", dim(diagnostic));
    }
}
