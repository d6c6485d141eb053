//! Territory CLI
//!
//! Command-line front end for the bulk territory entry automation.
//!
//! Usage from the workspace root:
//!   cargo run --bin territory                       # full run
//!   cargo run --bin territory -- --dry-run          # report without touching the UI
//!   cargo run --bin territory -- --no-save          # fill, confirm each record by hand
//!   cargo run --bin territory -- --verify           # cross-check attachments only
//!   cargo run --bin territory -- --reset            # forget all recorded progress

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use territory_automation::{
    create_backend, verify_attachments, AutomationConfig, FormDriver, Orchestrator,
    ProgressLedger, RecordSource, RunMode, RunSummary, SessionManager, TerritoryRecord,
};

#[derive(Parser, Debug)]
#[command(name = "territory")]
#[command(about = "Bulk territory entry for the New World Scheduler desktop application")]
struct Cli {
    /// Report what would be filled without issuing any UI interaction.
    #[arg(long, conflicts_with = "no_save")]
    dry_run: bool,

    /// Fill each record without saving; confirm manually before the next one.
    #[arg(long)]
    no_save: bool,

    /// Clear recorded progress before running.
    #[arg(long)]
    reset: bool,

    /// Cross-check records against the attachment directory, then exit.
    #[arg(long)]
    verify: bool,

    /// Source data file (.csv or .tsv).
    #[arg(long, default_value = "data/territories.csv")]
    data_file: PathBuf,

    /// Directory holding the per-territory PDF attachments.
    #[arg(long, default_value = "data/pdfs")]
    attachment_dir: PathBuf,

    /// Progress file used to resume interrupted runs.
    #[arg(long, default_value = "data/progress.json")]
    progress_file: PathBuf,

    /// Directory with calibration.json and options.json.
    #[arg(long, default_value = "data")]
    config_dir: PathBuf,

    /// Skip records before this zero-based index, regardless of progress.
    #[arg(long, default_value_t = 0)]
    start_from: usize,

    /// Directory for the per-run log file.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn init_tracing(log_dir: &PathBuf) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let filename = format!(
        "automation_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let file = tracing_appender::rolling::never(log_dir, filename);
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::INFO),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
        )
        .init();
    Ok(guard)
}

fn build_config(cli: &Cli) -> AutomationConfig {
    let mut config = AutomationConfig::new(
        cli.data_file.clone(),
        cli.attachment_dir.clone(),
        cli.progress_file.clone(),
    );
    config.load_dir(&cli.config_dir);
    config
}

/// Data must exist before anything is launched. A missing executable is only a
/// warning here: it matters only if no running instance can be connected to.
fn preflight(config: &AutomationConfig) -> Result<()> {
    if !config.data_file.exists() {
        bail!("data file not found: {}", config.data_file.display());
    }
    if !config.attachment_dir.is_dir() {
        bail!(
            "attachment directory not found: {}",
            config.attachment_dir.display()
        );
    }
    if !config.exe_path.exists() {
        warn!(
            "application executable not found at {}; launching will fail unless already running",
            config.exe_path.display()
        );
    }
    Ok(())
}

fn run_mode(cli: &Cli) -> RunMode {
    if cli.dry_run {
        RunMode::DryRun
    } else if cli.no_save {
        RunMode::NoSave
    } else {
        RunMode::Normal
    }
}

/// Missing individual attachments are the same warn-and-skip degraded case as
/// at run time, not a failure.
fn verify_command(records: &[TerritoryRecord], config: &AutomationConfig) -> Result<()> {
    let report = verify_attachments(records, config);
    if !report.missing.is_empty() {
        warn!("missing files will be skipped at run time");
    }
    Ok(())
}

/// Per-record failures are already contained and persisted; the run itself
/// completed and a rerun will retry them.
fn finish_run(summary: &RunSummary) -> Result<()> {
    if summary.failed > 0 {
        warn!("{} record(s) failed; rerun to retry them", summary.failed);
    }
    Ok(())
}

async fn execute(
    cli: &Cli,
    config: Arc<AutomationConfig>,
    records: Vec<TerritoryRecord>,
) -> Result<()> {
    let mut ledger = ProgressLedger::open(&config.ledger_path);
    if cli.reset {
        ledger.reset()?;
    }

    if cli.verify {
        return verify_command(&records, &config);
    }

    let backend = create_backend()?;
    let session = SessionManager::new(backend.clone(), config.clone());
    let driver = FormDriver::new(backend, config.clone());
    let mut orchestrator =
        Orchestrator::new(records, ledger, session, driver).with_start_from(cli.start_from);

    tokio::select! {
        result = orchestrator.run(run_mode(cli)) => finish_run(&result?),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; progress has been saved, run again to resume");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(&cli.log_dir)?;

    let config = build_config(&cli);
    preflight(&config)?;

    let mut source = RecordSource::new(&config.data_file, config.columns.clone());
    source.load()?;

    execute(&cli, Arc::new(config), source.into_records()).await
}
