//! CLI parsing and orchestration. Parses args, builds the client, registry,
//! and engine, runs the download, and maps errors to exit codes.

use crate::config;
use crate::config::SourcesConfig;
use crate::engine::{Engine, EngineError, EngineOptions, RunOptions, RunPaths};
use crate::fetch::{
    batch_api::BatchApiSource, fqweb::FqwebSource, jingluo::JingluoSource, ApiClient, FetchError,
    Registry,
};
use crate::model::{Manifest, ManifestError};
use crate::progress::ProgressStore;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Manifest(#[from] ManifestError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Gave up with {unresolved} chapter(s) unresolved after {rounds} round(s). Re-run to continue, or raise --max-rounds.")]
    Incomplete { unresolved: usize, rounds: u32 },

    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Manifest(_) => 1,
            CliRunError::Fetch(_) | CliRunError::Incomplete { .. } => 2,
            CliRunError::Engine(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tomatodl")]
#[command(about = "Download a Fanqie (Tomato) novel from a chapter manifest and write plain text")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, cookie, timeout_secs, workers, batch_size, round_backoff_secs, max_rounds, jitter_ms, indent, [sources]) are read from ./tomatodl.toml or the XDG config dir. CLI flags override config."
)]
pub struct Args {
    /// Chapter manifest (JSON): book metadata plus ordered chapter ids.
    pub manifest: PathBuf,

    /// Output directory. Default: config output_dir, else current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Download only chapters in this range (1-based inclusive), e.g. 1-100.
    #[arg(long, value_parser = parse_chapter_range)]
    pub chapters: Option<(u32, u32)>,

    /// Worker-pool width (overrides config; default 5).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum ids per bulk request (overrides config; default 20).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Request timeout in seconds (overrides config; default 15).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sleep between retry rounds in seconds (overrides config; default 2).
    #[arg(long)]
    pub backoff: Option<u64>,

    /// Stop after this many retry rounds and report unresolved chapters.
    /// Default: retry until every chapter is captured.
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Skip the bulk endpoint and fetch every chapter individually.
    #[arg(long)]
    pub no_batch: bool,

    /// Progress file location. Default: {output_dir}/chapter.json.
    #[arg(long)]
    pub status_file: Option<PathBuf>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Load manifest and progress, print pending count and output path,
    /// fetch nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain and the endpoint health report.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_chapter_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim();
    let (from_str, to_str) = s.split_once('-').ok_or_else(|| {
        format!(
            "Invalid --chapters: expected 'from-to' (e.g. 1-100), got '{}'",
            s
        )
    })?;
    let from: u32 = from_str.trim().parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid start chapter number",
            from_str.trim()
        )
    })?;
    let to: u32 = to_str.trim().parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid end chapter number",
            to_str.trim()
        )
    })?;
    if from > to {
        return Err(format!(
            "Invalid --chapters: start ({}) must be <= end ({})",
            from, to
        ));
    }
    Ok((from, to))
}

/// Sanitize book title to a safe filename: keep alphanumeric characters
/// (including CJK), replace the rest with `-`.
fn sanitize_title(title: &str) -> String {
    let mut s = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "book".to_string();
    }
    s
}

/// Build the endpoint registry from config. Registration order is fallback
/// priority for single sources.
fn build_registry(sources: &SourcesConfig) -> Result<Registry, FetchError> {
    let mut builder = Registry::builder();
    if !sources.disable_batch {
        let url = sources
            .batch_url
            .clone()
            .unwrap_or_else(|| crate::fetch::batch_api::DEFAULT_BASE_URL.to_string());
        builder = builder.batch(
            "batch-api",
            Box::new(BatchApiSource::new(url, sources.batch_token.clone())),
        );
    }
    if !sources.disable_jingluo {
        let url = sources
            .jingluo_url
            .clone()
            .unwrap_or_else(|| crate::fetch::jingluo::DEFAULT_BASE_URL.to_string());
        builder = builder.single("jingluo", Box::new(JingluoSource::new(url)));
    }
    if !sources.disable_fqweb {
        let url = sources
            .fqweb_url
            .clone()
            .unwrap_or_else(|| crate::fetch::fqweb::DEFAULT_BASE_URL.to_string());
        builder = builder.single("fqweb", Box::new(FqwebSource::new(url)));
    }
    builder.build()
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and
/// message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let manifest = Manifest::load(&args.manifest)?;
    let (book, mut tasks) = manifest.into_tasks()?;

    if let Some((from, to)) = args.chapters {
        tasks.retain(|t| t.index + 1 >= from && t.index + 1 <= to);
        if tasks.is_empty() {
            return Err(CliRunError::InvalidInput(format!(
                "--chapters {}-{} selects no chapters (manifest has fewer entries).",
                from, to
            )));
        }
    }

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    const DEFAULT_WORKERS: usize = 5;
    const DEFAULT_BATCH_SIZE: usize = 20;
    const DEFAULT_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_BACKOFF_SECS: u64 = 2;
    let workers = args
        .workers
        .or_else(|| config.as_ref().and_then(|c| c.workers))
        .unwrap_or(DEFAULT_WORKERS)
        .max(1);
    let batch_size = args
        .batch_size
        .or_else(|| config.as_ref().and_then(|c| c.batch_size))
        .unwrap_or(DEFAULT_BATCH_SIZE)
        .max(1);
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let backoff_secs = args
        .backoff
        .or_else(|| config.as_ref().and_then(|c| c.round_backoff_secs))
        .unwrap_or(DEFAULT_BACKOFF_SECS);
    let max_rounds = args
        .max_rounds
        .or_else(|| config.as_ref().and_then(|c| c.max_rounds));
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));
    let cookie = config.as_ref().and_then(|c| c.cookie.clone());
    let jitter = config.as_ref().and_then(|c| c.jitter_ms);
    let indent = config
        .as_ref()
        .and_then(|c| c.indent.clone())
        .unwrap_or_else(|| crate::text::DEFAULT_INDENT.to_string());

    let mut builder = ApiClient::builder().timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(cookie) = cookie {
        builder = builder.cookie(cookie);
    }
    if let Some([min, max]) = jitter {
        builder = builder.jitter_ms(min, max);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let sources = config.as_ref().map(|c| &c.sources);
    let default_sources = SourcesConfig::default();
    let registry = build_registry(sources.unwrap_or(&default_sources))?;

    let output_dir: PathBuf = args
        .output
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir).map_err(|e| {
        CliRunError::InvalidInput(format!(
            "Cannot create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let base = sanitize_title(&book.title);
    let paths = RunPaths {
        output: output_dir.join(format!("{}.txt", base)),
        status: args
            .status_file
            .clone()
            .unwrap_or_else(|| output_dir.join("chapter.json")),
        snapshot: output_dir.join(format!("{}.resume.json", base)),
    };

    if args.dry_run {
        let progress = ProgressStore::load(&paths.status);
        let pending = tasks.iter().filter(|t| !progress.contains(&t.id)).count();
        eprintln!("Chapters: {}", tasks.len());
        eprintln!("Pending: {}", pending);
        eprintln!("Output: {}", paths.output.display());
        return Ok(());
    }

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Downloading {}/{} chapters", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let options = EngineOptions {
        workers,
        batch_size,
        round_backoff: Duration::from_secs(backoff_secs),
        max_rounds,
        use_batch: !args.no_batch,
        indent,
    };
    let engine = Engine::new(&client, &registry, options);
    let run_options = RunOptions {
        progress,
        cancel: Default::default(),
    };
    let summary = engine.run(&book, &tasks, &paths, &run_options)?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    if !args.quiet {
        eprintln!(
            "Done: {} fetched, {} already present, {} unresolved.",
            summary.fetched,
            summary.already_done,
            summary.unresolved.len()
        );
        eprintln!("Wrote {}", paths.output.display());
    }
    if args.verbose {
        for row in registry.health_report() {
            eprintln!(
                "endpoint {} ({}): {} error(s), {} consecutive, last latency {}",
                row.name,
                row.capability,
                row.total_errors,
                row.consecutive_errors,
                row.last_latency_ms
                    .map(|ms| format!("{}ms", ms))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
        }
    }

    if summary.gave_up {
        return Err(CliRunError::Incomplete {
            unresolved: summary.unresolved.len(),
            rounds: summary.rounds,
        });
    }
    Ok(())
}
