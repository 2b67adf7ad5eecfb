//! CLI binary for mht2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, converts one or many captures and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mht2md::{
    convert, inspect, ConversionConfig, ConversionProgressCallback, ConversionResult,
    ProgressCallback,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner per capture plus one log line per
/// screenshot. The image count is unknown until the container is parsed, so
/// the bar never shows a length.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, input: &Path) {
        let name = display_name(input);
        self.bar.set_message(name.clone());
        self.bar.println(format!("{} {}", cyan("◆"), bold(&name)));
    }

    fn on_image_saved(&self, filename: &str, index: usize) {
        self.bar.set_message(format!("image #{index}"));
        self.bar
            .println(format!("  {} {:>4}  {}", green("✓"), index, dim(filename)));
    }

    fn on_image_error(&self, index: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:>4}  {}", red("✗"), index, red(&msg)));
    }

    fn on_conversion_complete(&self, images: usize, steps: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} steps, {} images",
                green("✔"),
                bold(&steps.to_string()),
                bold(&images.to_string())
            );
        } else {
            eprintln!(
                "{} {} steps, {} images  ({} skipped)",
                cyan("⚠"),
                bold(&steps.to_string()),
                bold(&images.to_string()),
                red(&failed.to_string())
            );
        }
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        // A failed conversion never reaches on_conversion_complete.
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every .mht file in the current directory
  mht2md

  # Convert one capture (output lands next to it in ./capture/)
  mht2md capture.mht

  # Re-encode screenshots as PNG
  mht2md --png capture.mht

  # Lower JPEG quality, write under ./converted/capture/
  mht2md --quality 85 -o ./converted capture.mht

  # Skip corrupt screenshots with a warning instead of failing
  mht2md --lenient capture.mht

  # Show what a capture contains without writing anything
  mht2md --inspect-only capture.mht

  # Machine-readable result
  mht2md --json capture.mht > result.json

OUTPUT LAYOUT:
  <output>/<name>/<name>.md               Markdown document
  <output>/<name>/conversion_metadata.json
  <output>/<name>/screenshot0001.JPEG     one file per step (.png with --png)

ENVIRONMENT VARIABLES:
  RUST_LOG               Override the log filter (e.g. mht2md=debug)
  MHT2MD_OUTPUT          Default output directory
  MHT2MD_QUALITY         Default JPEG quality
"#;

/// Convert step-recorder MHT captures to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "mht2md",
    version,
    about = "Convert step-recorder MHT captures to Markdown with extracted screenshots",
    long_about = "Convert step-recorder MHT captures (multipart/related web archives) into a \
Markdown document with one section per recorded step, the screenshots extracted as numbered \
image files, and a JSON metadata sidecar. Without INPUT, every .mht file in the current \
directory is converted.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// MHT file to convert. Default: every *.mht in the current directory.
    input: Option<PathBuf>,

    /// Directory in which the <name>/ output folder is created.
    #[arg(short, long, env = "MHT2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Re-encode JPEG screenshots as PNG.
    #[arg(long, env = "MHT2MD_PNG")]
    png: bool,

    /// JPEG re-encode quality (1–100). Ignored with --png.
    #[arg(long, env = "MHT2MD_QUALITY", default_value_t = mht2md::config::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Skip corrupt screenshots with a warning instead of failing.
    #[arg(long, env = "MHT2MD_LENIENT")]
    lenient: bool,

    /// Print the conversion result(s) as JSON on stdout.
    #[arg(long, env = "MHT2MD_JSON")]
    json: bool,

    /// Parse and summarise the capture(s) without writing anything.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress output.
    #[arg(long, env = "MHT2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MHT2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MHT2MD_QUIET")]
    quiet: bool,
}

/// Totals across every capture processed in one invocation.
#[derive(Debug, Default)]
struct Summary {
    processed: usize,
    succeeded: usize,
    failed: usize,
    images: usize,
    steps: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress output covers INFO-level milestones, so the library logs
    // are reduced to errors while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when at least one capture failed.
fn run(cli: &Cli) -> Result<bool> {
    let inputs = resolve_inputs(cli.input.as_deref())?;
    if inputs.is_empty() {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        eprintln!("{} No .mht files found in {}", red("✘"), cwd.display());
        eprintln!(
            "   {}",
            dim("Place captures in the current directory or pass a file path")
        );
        return Ok(false);
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect_all(cli, &inputs);
    }

    // ── Run conversions ──────────────────────────────────────────────────
    let mut summary = Summary::default();
    let mut results: Vec<ConversionResult> = Vec::new();

    for input in &inputs {
        summary.processed += 1;
        let config = build_config(cli)?;
        match convert(input, &config) {
            Ok(result) => {
                summary.succeeded += 1;
                summary.images += result.stats.total_images;
                summary.steps += result.stats.total_steps;
                if !cli.quiet && !cli.json {
                    eprintln!(
                        "   {}  {}",
                        dim("→"),
                        bold(&result.markdown_path.display().to_string())
                    );
                    for w in result.warnings() {
                        eprintln!("   {} {}", cyan("⚠"), dim(&w.to_string()));
                    }
                }
                results.push(result);
            }
            Err(e) => {
                summary.failed += 1;
                eprintln!("{} {}: {}", red("✘"), display_name(input), e);
            }
        }
    }

    if cli.json {
        let json = if let [single] = results.as_slice() {
            serde_json::to_string_pretty(single)
        } else {
            serde_json::to_string_pretty(&results)
        }
        .context("Failed to serialise result")?;
        println!("{json}");
    }

    if !cli.quiet && inputs.len() > 1 {
        print_summary(&summary);
    }

    Ok(summary.failed == 0)
}

fn inspect_all(cli: &Cli, inputs: &[PathBuf]) -> Result<bool> {
    let mut ok = true;
    let mut summaries = Vec::new();
    for input in inputs {
        match inspect(input) {
            Ok(s) if cli.json => summaries.push(s),
            Ok(s) => {
                println!("File:         {}", input.display());
                println!("Parts:        {}", s.total_parts);
                println!("HTML part:    {}", if s.has_html { "yes" } else { "no" });
                println!("Images:       {}", s.image_parts);
                println!("Steps:        {}", s.steps.len());
                for (n, text) in s.steps.iter() {
                    println!("  {:>4}  {}", n, text);
                }
            }
            Err(e) => {
                ok = false;
                eprintln!("{} {}: {}", red("✘"), display_name(input), e);
            }
        }
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries).context("Failed to serialise summary")?
        );
    }
    Ok(ok)
}

fn print_summary(s: &Summary) {
    let rule = "═".repeat(60);
    eprintln!("{}", dim(&rule));
    eprintln!("{}", bold("Conversion summary"));
    eprintln!("  {} Succeeded:    {}", green("✔"), s.succeeded);
    eprintln!("  {} Failed:       {}", red("✘"), s.failed);
    eprintln!("    Files:        {}", s.processed);
    eprintln!("    Total images: {}", s.images);
    eprintln!("    Total steps:  {}", s.steps);
    eprintln!("{}", dim(&rule));
}

/// Map CLI args to `ConversionConfig`.
///
/// Called once per capture so each conversion gets its own progress spinner.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .convert_to_png(cli.png)
        .quality(cli.quality)
        .strict_images(!cli.lenient);

    if let Some(ref dir) = cli.output {
        builder = builder.output_root(dir.clone());
    }

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// The single input, or every `*.mht` in the current directory, sorted.
fn resolve_inputs(input: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = input {
        return Ok(vec![path.to_path_buf()]);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut found: Vec<PathBuf> = std::fs::read_dir(&cwd)
        .with_context(|| format!("Failed to list {}", cwd.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mht"))
        })
        .collect();
    found.sort();
    Ok(found)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
