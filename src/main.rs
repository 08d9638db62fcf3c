use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use sysupdate::{
    adapter::SourceAdapter,
    output::{export, print_items_table, print_summary, ExportFormat, ScanSummary},
    select_target, update_readiness, Config, InstalledItem, ItemSource, RefreshEvent,
    RefreshOutcome, ScanOutcome, Selection, SystemUpdate, UpdateReadiness,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sysupdate")]
#[command(
    author,
    version,
    about = "List installed software across package managers and keep it up to date"
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan installed packages and check for updates
    Scan {
        /// Only scan one source (winget, chocolatey, npm, pnpm, bun, yarn, pip, path, registry)
        #[arg(short, long)]
        source: Option<String>,

        /// Ignore the cached scan
        #[arg(long)]
        no_cache: bool,

        /// Export results (json, csv)
        #[arg(short, long)]
        export: Option<String>,

        /// Export file path; implies --export with the configured default format
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upgrade one package, or every package with an update
    Update {
        /// Package name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        package: Option<String>,

        /// Upgrade every package with an available update
        #[arg(long)]
        all: bool,

        /// Restrict to one source
        #[arg(short, long)]
        source: Option<String>,

        /// Install this version instead of the latest
        #[arg(long, requires = "package")]
        version: Option<String>,

        /// Show what would run without running it
        #[arg(long)]
        dry_run: bool,

        /// Reinstall even if the package is not known to be outdated
        #[arg(long, requires = "package")]
        force: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List available sources
    ListSources,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sysupdate=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan {
            source,
            no_cache,
            export,
            output,
        } => {
            let config = Config::load()?;
            run_scan(config, parse_source(source)?, no_cache, export, output).await
        }
        Commands::Update {
            package,
            all,
            source,
            version,
            dry_run,
            force,
            yes,
        } => {
            let config = Config::load()?;
            let request = UpdateRequest {
                package: if all { None } else { package },
                source: parse_source(source)?,
                version,
                dry_run,
                force,
                yes,
            };
            run_update(config, request).await
        }
        Commands::ListSources => {
            let config = Config::load()?;
            list_sources(&SystemUpdate::new(config)?);
            Ok(())
        }
        Commands::Config { init, path } => handle_config(init, path),
        Commands::ClearCache => {
            let engine = SystemUpdate::new(Config::load()?)?;
            engine.clear_cache()?;
            println!("Cache cleared.");
            Ok(())
        }
    }
}

async fn run_scan(
    config: Config,
    filter: Option<ItemSource>,
    no_cache: bool,
    export_format: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let format = match (export_format, &output) {
        (Some(format), _) => Some(format.parse::<ExportFormat>()?),
        (None, Some(_)) => Some(config.export.default_format.parse::<ExportFormat>()?),
        (None, None) => None,
    };

    let engine = SystemUpdate::new(config)?;
    let started = Instant::now();
    let outcome = refresh_with_progress(&engine, !no_cache, filter).await;

    print_items_table(&outcome.items);
    print_summary(&ScanSummary {
        items: &outcome.items,
        update_count: outcome.update_count,
        elapsed: started.elapsed(),
        from_cache: outcome.from_cache,
    });

    if let Some(format) = format {
        let path = export(&outcome.items, format, outcome.scanned_at, output.as_deref())?;
        println!();
        println!("Results written to: {}", path.display());
    }
    Ok(())
}

struct UpdateRequest {
    /// `None` means every package with an update.
    package: Option<String>,
    source: Option<ItemSource>,
    version: Option<String>,
    dry_run: bool,
    force: bool,
    yes: bool,
}

async fn run_update(config: Config, request: UpdateRequest) -> Result<()> {
    let engine = SystemUpdate::new(config)?;
    let outcome = refresh_with_progress(&engine, true, request.source).await;

    let mut confirmed = false;
    let targets: Vec<InstalledItem> = match &request.package {
        None => outcome
            .items
            .iter()
            .filter(|item| item.has_update())
            .filter(|item| !engine.config().ignore.should_ignore_update(&item.name))
            .cloned()
            .collect(),
        Some(name) => match select_target(&outcome.items, name, request.source) {
            Selection::NotFound => bail!("package `{}` not found", name),
            Selection::Ambiguous(candidates) => {
                let sources: Vec<&str> = candidates.iter().map(|i| i.source.as_str()).collect();
                bail!(
                    "`{}` is installed from several sources ({}); pick one with --source",
                    name,
                    sources.join(", ")
                );
            }
            Selection::Found(item) => {
                let mut item = item.clone();
                let readiness = update_readiness(&item, request.version.as_deref());
                if readiness != UpdateReadiness::Ready {
                    if readiness == UpdateReadiness::Current {
                        println!("{} {} is up to date.", item.name, item.version);
                    } else {
                        println!("{} {}: update status is {}.", item.name, item.version, item.status);
                    }
                    if !request.force {
                        if request.yes || !confirm("Reinstall anyway?")? {
                            println!("Use --force to reinstall.");
                            return Ok(());
                        }
                        confirmed = true;
                    }
                }
                if let Some(version) = &request.version {
                    item.pin_target(version.clone());
                }
                vec![item]
            }
        },
    };

    if targets.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }

    println!();
    for item in &targets {
        let latest = if item.latest_version.is_empty() {
            "latest"
        } else {
            item.latest_version.as_str()
        };
        println!("  {} ({}) {} -> {}", item.name, item.source.display_name(), item.version, latest);
    }
    println!();

    let prompt = format!("Upgrade {} package(s)?", targets.len());
    if !request.dry_run && !request.yes && !confirmed && !confirm(&prompt)? {
        println!("Aborted.");
        return Ok(());
    }

    let summary = engine
        .dispatch_batch(&targets, request.dry_run, |item, ok| {
            let mark = if ok { "ok" } else { "failed" };
            println!("  [{}] {} ({})", mark, item.name, item.source.display_name());
        })
        .await;

    println!();
    if request.dry_run {
        println!("Dry run: {} command(s) previewed.", summary.attempted);
        return Ok(());
    }
    println!("{} of {} upgraded.", summary.succeeded, summary.attempted);

    if summary.succeeded > 0 {
        // upgraded versions invalidate the snapshot
        engine.clear_cache()?;
    }
    if summary.failed() > 0 {
        bail!("{} upgrade(s) failed", summary.failed());
    }
    Ok(())
}

/// Runs a refresh with a bar over the discovery phase and a spinner over the
/// update checks.
async fn refresh_with_progress(
    engine: &SystemUpdate,
    use_cache: bool,
    filter: Option<ItemSource>,
) -> RefreshOutcome {
    let sources = engine
        .adapters()
        .iter()
        .filter(|a| filter.map_or(true, |s| a.source() == s))
        .filter(|a| engine.config().sources.is_enabled(a.source()) && a.is_supported())
        .count();

    let bar = ProgressBar::new(sources as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("Scanning sources...");

    let mut found = 0;
    let mut spinner: Option<ProgressBar> = None;
    let outcome = engine
        .refresh(use_cache, filter, |event| match event {
            RefreshEvent::Source(report) => {
                found += report.outcome.count();
                if let ScanOutcome::Failed(reason) = &report.outcome {
                    bar.println(format!("  {} skipped: {}", report.name, reason));
                }
                bar.inc(1);
            }
            RefreshEvent::Checking { items } => {
                bar.finish_with_message(format!("Found {} packages", found));
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message(format!("Checking {} packages for updates...", items));
                spinner = Some(pb);
            }
        })
        .await;

    if outcome.from_cache {
        bar.finish_and_clear();
        println!(
            "Using cached scan from {}",
            outcome.scanned_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    } else if let Some(pb) = spinner {
        pb.finish_with_message(format!("{} updates available", outcome.update_count));
    }
    outcome
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn list_sources(engine: &SystemUpdate) {
    println!("Available sources:");
    println!();

    for adapter in engine.adapters().iter() {
        let supported = if adapter.is_supported() { "yes" } else { "no" };
        let enabled = if engine.config().sources.is_enabled(adapter.source()) {
            "yes"
        } else {
            "no"
        };
        println!(
            "  {:<12} {:<25} [supported: {}, enabled: {}]",
            adapter.source().as_str(),
            adapter.name(),
            supported,
            enabled
        );
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'sysupdate config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

fn parse_source(source: Option<String>) -> Result<Option<ItemSource>> {
    Ok(source.map(|s| s.parse::<ItemSource>()).transpose()?)
}
