//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use flowlens_core::{ProgressReporter, extract_page, extract_page_offline};
use flowlens_discovery::list_frames;
use flowlens_fetch::{FrameFetcher, HttpTranscriptFetcher};
use flowlens_shared::{
    AppConfig, ExtractionResult, FrameInput, FrameOrigin, PageInput, init_config, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FlowLens: pair workflow nodes with their notes and find the explainer video.
#[derive(Parser)]
#[command(
    name = "flowlens",
    version,
    about = "Extract node annotations and explainer videos from workflow marketplace pages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract one page and print the result as JSON.
    Extract(ExtractArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct ExtractArgs {
    /// Hosting document markup. Fetched from --url when omitted.
    #[arg(long)]
    pub page: Option<PathBuf>,

    /// Page URL, used to resolve frame sources.
    #[arg(long)]
    pub url: Option<String>,

    /// Workflow definition JSON. Searched for in the page when omitted.
    #[arg(long)]
    pub workflow: Option<PathBuf>,

    /// Frame markup as `<src>=<file>` (repeatable).
    #[arg(long = "frame", value_name = "SRC=FILE")]
    pub frames: Vec<String>,

    /// Fetch markup of frames not supplied with --frame.
    #[arg(long)]
    pub fetch_frames: bool,

    /// Skip transcript acquisition.
    #[arg(long)]
    pub no_transcripts: bool,

    /// Transcript service base URL (overrides config).
    #[arg(long, env = "FLOWLENS_TRANSCRIPT_ENDPOINT")]
    pub transcript_endpoint: Option<String>,

    /// Videos fetched in parallel (overrides config).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Write the JSON result here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "flowlens=info",
        1 => "flowlens=debug",
        _ => "flowlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract(args) => cmd_extract(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_extract(args: ExtractArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(endpoint) = &args.transcript_endpoint {
        config.transcripts.endpoint = Some(endpoint.clone());
    }
    if let Some(n) = args.concurrency {
        config.transcripts.concurrency = n.max(1);
    }

    let page_url = args
        .url
        .as_deref()
        .map(|u| Url::parse(u).map_err(|e| eyre!("invalid URL '{u}': {e}")))
        .transpose()?;

    let mut input = match (&args.page, &page_url) {
        (Some(path), _) => {
            let host_markup = read_file(path)?;
            let frames = list_frames(&host_markup, page_url.as_ref().map(Url::as_str))
                .into_iter()
                .map(|f| f.into_input())
                .collect();
            PageInput {
                page_url: page_url.as_ref().map(Url::to_string),
                host_markup,
                frames,
                ..PageInput::default()
            }
        }
        (None, Some(url)) => {
            let fetcher = FrameFetcher::new(&config.fetch)?;
            info!(%url, "fetching page");
            fetcher.load_page(url).await?
        }
        (None, None) => return Err(eyre!("either --page or --url is required")),
    };

    if let Some(path) = &args.workflow {
        input.workflow_json = Some(read_file(path)?);
    }

    for spec in &args.frames {
        let (src, path) = parse_frame_arg(spec)?;
        attach_frame(&mut input, page_url.as_ref(), src, read_file(Path::new(path))?);
    }

    if args.fetch_frames && args.page.is_some() {
        FrameFetcher::new(&config.fetch)?
            .fill_frames(&mut input)
            .await;
    }

    let progress = CliProgress::new();
    let result = if args.no_transcripts {
        extract_page_offline(&input, &config, &progress)
    } else if config.transcripts.endpoint.is_some() {
        let fetcher = Arc::new(HttpTranscriptFetcher::new(&config.transcripts)?);
        extract_page(&input, fetcher, &config, &progress).await
    } else {
        warn!("no transcript endpoint configured; skipping transcripts");
        extract_page_offline(&input, &config, &progress)
    };

    write_result(&result, args.out.as_deref())?;

    if !result.success {
        let reason = result
            .errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "unknown error".into());
        return Err(eyre!("extraction failed: {reason}"));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read '{}'", path.display()))
}

fn write_result(result: &ExtractionResult, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .wrap_err_with(|| format!("cannot write '{}'", path.display()))?;
            eprintln!("Result written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Split `<src>=<file>` at the last `=`, since frame URLs carry query strings.
fn parse_frame_arg(spec: &str) -> Result<(&str, &str)> {
    match spec.rsplit_once('=') {
        Some((src, file)) if !src.is_empty() && !file.is_empty() => Ok((src, file)),
        _ => Err(eyre!("invalid --frame '{spec}': expected <src>=<file>")),
    }
}

/// Give a frame its markup, adding it when the host document does not list it.
fn attach_frame(input: &mut PageInput, page_url: Option<&Url>, src: &str, markup: String) {
    let resolved = match page_url {
        Some(base) => base.join(src).ok(),
        None => Url::parse(src).ok(),
    };
    let key = resolved
        .as_ref()
        .map(Url::to_string)
        .unwrap_or_else(|| src.to_string());

    if let Some(frame) = input
        .frames
        .iter_mut()
        .find(|f| f.src.as_deref() == Some(key.as_str()))
    {
        frame.markup = Some(markup);
        frame.fetch_error = None;
        return;
    }

    let origin = match (&resolved, page_url) {
        (Some(frame), Some(page)) if frame.origin() == page.origin() => FrameOrigin::SameContext,
        _ => FrameOrigin::CrossOrigin,
    };
    input.frames.push(FrameInput {
        src: Some(key),
        title: None,
        origin,
        markup: Some(markup),
        fetch_error: None,
    });
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, result: &ExtractionResult) {
        self.spinner.finish_and_clear();
        eprintln!(
            "  {} videos, {} transcripts, {} node contexts, quality {}",
            result.videos.len(),
            result.transcripts.len(),
            result.node_contexts.len(),
            result.quality_score
        );
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
