use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use kostats_sync::app::{App, Selection, history_summary};
use kostats_sync::catalog::HttpCatalog;
use kostats_sync::config::{ConfigLoader, ConfigOverrides, Credentials, ResolvedConfig};
use kostats_sync::download::HttpDownloader;
use kostats_sync::error::SyncError;
use kostats_sync::history::HistoryStore;
use kostats_sync::output::{JsonOutput, TextOutput};
use kostats_sync::reconcile::Reconciler;
use kostats_sync::session;

#[derive(Parser)]
#[command(name = "kostats-sync")]
#[command(about = "Download new KOStats subscription files, skipping ones already fetched")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (default: ./kostats-sync.json if present)")]
    config: Option<Utf8PathBuf>,

    #[arg(long, global = true, help = "Base download directory")]
    download_dir: Option<Utf8PathBuf>,

    #[arg(long, global = true, help = "Pause between downloads in milliseconds")]
    delay_ms: Option<u64>,

    #[arg(long, global = true, help = "Log file path")]
    log_file: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Log in and download new files (default)")]
    Sync(SyncArgs),
    #[command(about = "Show how many files are recorded per sport")]
    History(HistoryArgs),
}

#[derive(Args, Default)]
struct SyncArgs {
    #[arg(
        long = "category",
        value_name = "CODE",
        help = "Sport code (CBK, CFB, MLB, NBA, NFL, NHL); repeatable, default all"
    )]
    categories: Vec<String>,

    #[arg(long, help = "List new files without downloading them")]
    dry_run: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        tracing::error!("{report}");
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SyncError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::MissingCredentials
        | SyncError::ConfigRead(_)
        | SyncError::ConfigParse(_)
        | SyncError::InvalidUrl { .. }
        | SyncError::InvalidPattern(_) => 2,
        SyncError::AuthFailed(_) | SyncError::LoginFormNotFound(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        download_dir: cli.download_dir,
        delay_ms: cli.delay_ms,
        log_file: cli.log_file,
    };
    let file = ConfigLoader::read_file(cli.config.as_deref());
    init_tracing(&ConfigLoader::log_file(file.as_ref().ok(), &overrides))?;
    let config = ConfigLoader::resolve(file?, &overrides)?;

    match cli.command.unwrap_or(Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => run_sync(&config, args),
        Commands::History(args) => {
            let store = HistoryStore::new(config.history_path());
            let result = history_summary(&store)?;
            if args.json {
                JsonOutput::print_history(&result).into_diagnostic()
            } else {
                TextOutput::print_history(&result).into_diagnostic()
            }
        }
    }
}

fn run_sync(config: &ResolvedConfig, args: SyncArgs) -> miette::Result<()> {
    let credentials = Credentials::from_env()?;
    tracing::info!(download_dir = %config.download_dir, "starting KOStats sync");

    let session = session::authenticate(config, &credentials)?;
    let catalog = HttpCatalog::new(session.clone(), config);
    let downloader = HttpDownloader::new(session);
    let reconciler = Reconciler::new(
        catalog,
        downloader,
        config.download_dir.clone(),
        config.delay,
    )
    .dry_run(args.dry_run);
    let app = App::new(reconciler, HistoryStore::new(config.history_path()));

    let result = app.sync(&Selection::from_codes(&args.categories))?;
    if args.json {
        JsonOutput::print_sync(&result).into_diagnostic()
    } else {
        TextOutput::print_sync(&result).into_diagnostic()
    }
}

/// Console (stderr) plus an appended plain-text log file.
fn init_tracing(path: &Utf8Path) -> miette::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent.as_std_path()).into_diagnostic()?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .into_diagnostic()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(())
}
