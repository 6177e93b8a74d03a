//! CLI binary for edgequake-doctag.
//!
//! A thin shim over the library crate: maps CLI flags to
//! `ProcessingConfig`, runs every PDF it is given, and prints each
//! document's summary and tags.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doctag::{
    process_many, DocTagError, DocumentProcessor, ProcessingConfig, ProcessingResult, TagLibrary,
    TagMatch,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise and tag one document
  doctag minutes.pdf

  # Every PDF in a directory, four at a time
  doctag data/docs --concurrency 4

  # Use a tag taxonomy file and keep the raw model replies
  doctag data/docs --tags-file tag_groups.json --cache-response

  # Machine-readable output
  doctag --json data/docs > results.json

TAG TAXONOMY FILE:
  [
    { "name": "Finance", "tags": ["Finance", "Budgets", "Reserve Fund Study"] },
    { "name": "Legal",   "tags": ["Legal", "Contract Review", "Insurance"] }
  ]

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or containing directory)
"#;

/// Summarise and tag PDF documents using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doctag",
    version,
    about = "Summarise and tag PDF documents using Vision LLMs",
    long_about = "Rasterise the first pages of each PDF, send them to a vision-capable LLM, \
and print a short summary plus up to three tags chosen from a tag taxonomy.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF file, or a directory whose *.pdf files are all processed.
    input: PathBuf,

    /// Directory for page images and cached replies.
    #[arg(long, env = "DOCTAG_OUTPUT_DIR", default_value = "data/converted_images")]
    output_dir: PathBuf,

    /// Maximum leading pages sent to the model per document.
    #[arg(long, env = "DOCTAG_MAX_PAGES", default_value_t = 5)]
    max_pages: usize,

    /// JSON tag-groups file. Defaults to the built-in taxonomy.
    #[arg(long, env = "DOCTAG_TAGS_FILE")]
    tags_file: Option<PathBuf>,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "DOCTAG_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCTAG_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "DOCTAG_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Per-document model call timeout in seconds (no timeout if unset).
    #[arg(long, env = "DOCTAG_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Documents processed concurrently.
    #[arg(short, long, env = "DOCTAG_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Write each raw model reply to {stem}_response.json.
    #[arg(long, env = "DOCTAG_CACHE_RESPONSE")]
    cache_response: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCTAG_PASSWORD")]
    password: Option<String>,

    /// Output one JSON array instead of text.
    #[arg(long, env = "DOCTAG_JSON")]
    json: bool,

    /// Disable progress spinner.
    #[arg(long, env = "DOCTAG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCTAG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "DOCTAG_QUIET")]
    quiet: bool,
}

/// One line of `--json` output.
#[derive(Serialize)]
struct JsonEntry<'a> {
    file: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_tags: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inputs ───────────────────────────────────────────────────────────
    let sources = collect_sources(&cli.input)?;
    if sources.is_empty() {
        anyhow::bail!("No PDF files found in {}", cli.input.display());
    }

    let library = match cli.tags_file {
        Some(ref path) => TagLibrary::load(path).context("Failed to load tag taxonomy")?,
        None => TagLibrary::default_library(),
    };

    let config = build_config(&cli).await?;
    let processor = DocumentProcessor::from_config(config).context("Failed to set up model client")?;
    info!(
        "Processing {} documents with model {}",
        sources.len(),
        processor.client().model_id()
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {} documents…", sources.len()))
        ));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let results = process_many(
        &processor,
        &sources,
        &cli.output_dir,
        &library,
        cli.concurrency,
    )
    .await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    // ── Report ───────────────────────────────────────────────────────────
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    if cli.json {
        let entries: Vec<JsonEntry<'_>> = results
            .iter()
            .map(|(path, r)| match r {
                Ok(res) => JsonEntry {
                    file: path,
                    result: Some(res),
                    new_tags: Some(new_tags(&library, &res.tags)),
                    error: None,
                },
                Err(e) => JsonEntry {
                    file: path,
                    result: None,
                    new_tags: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise output")?
        );
    } else {
        for (path, result) in &results {
            print_result(path, result, &library);
        }
    }

    if !cli.quiet && !cli.json {
        let ok = results.len() - failed;
        eprintln!(
            "{} {}/{} documents processed",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&ok.to_string()),
            results.len()
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", results.len());
    }
    Ok(())
}

/// A single file, or every `*.pdf` in a directory (sorted, non-recursive).
fn collect_sources(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut sources: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("Failed to read directory {}", input.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_pdf_name(p))
        .collect();
    sources.sort();
    Ok(sources)
}

fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Map CLI args to `ProcessingConfig`.
async fn build_config(cli: &Cli) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .max_pages(cli.max_pages)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .cache_response(cli.cache_response);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }

    builder.build().context("Invalid configuration")
}

fn new_tags<'a>(library: &TagLibrary, tags: &'a [String]) -> Vec<&'a str> {
    tags.iter()
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty() && library.find(t).is_none())
        .collect()
}

fn print_result(path: &Path, result: &Result<ProcessingResult, DocTagError>, library: &TagLibrary) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match result {
        Ok(res) => {
            println!("\n{} {}", green("✓"), bold(&name));
            println!("Summary: {}", res.summary);
            let tags: Vec<String> = library
                .reconcile(&res.tags)
                .into_iter()
                .map(|m| match m {
                    TagMatch::Existing(n) => n,
                    TagMatch::New(n) => format!("{n} {}", dim("(new)")),
                })
                .collect();
            println!("Tags:    {}", tags.join(", "));
            println!(
                "{}",
                dim(&format!(
                    "{} pages · {:?} reply · {} in / {} out / {} total tokens · stop {} · {}ms",
                    res.pages.len(),
                    res.outcome,
                    res.usage.input_tokens,
                    res.usage.output_tokens,
                    res.usage.total_tokens,
                    res.stop_reason.as_deref().unwrap_or("-"),
                    res.duration_ms
                ))
            );
        }
        Err(e) => {
            println!("\n{} {}", red("✗"), bold(&name));
            println!("{}", red(&e.to_string()));
        }
    }
}
