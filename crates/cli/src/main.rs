mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ffshare_core::{
    audit::AuditFilter,
    classify, create_audit_system,
    engine::{build_command, Engine, FfmpegEngine, Prober},
    job::{hooks_for, DefaultOutputPolicy, JobRunner, JobState, OutputPolicy},
    load_config, load_config_from_env, planner, validate_config, AuditStore, Config,
    SqliteAuditStore,
};

use report::{print_history, write_metrics, StatePrinter};

/// Config file used when neither `--config` nor `FFSHARE_CONFIG` is given.
const DEFAULT_CONFIG_PATH: &str = "ffshare.toml";

#[derive(Parser)]
#[command(name = "ffshare")]
#[command(about = "Compress images, videos and audio files with ffmpeg")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $FFSHARE_CONFIG, then ffshare.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files one after another
    Compress {
        /// Files to compress
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print every state as JSON instead of a progress line
        #[arg(long)]
        json: bool,

        /// Write Prometheus metrics to this file when done
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Print the engine command for each file without running it
    Plan {
        /// Files to plan
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show recent encode records
    History {
        /// Only failed attempts
        #[arg(long)]
        failed: bool,

        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Check that ffmpeg and ffprobe are usable
    Check,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but did not succeed.
async fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = resolve_config(cli.config)?;

    match cli.command {
        Commands::Compress {
            files,
            json,
            metrics,
        } => compress(config, files, json, metrics).await,
        Commands::Plan { files } => plan(config, files).await.map(|_| true),
        Commands::History { failed, limit } => history(config, failed, limit).map(|_| true),
        Commands::Check => {
            FfmpegEngine::new(config.engine.clone())
                .validate()
                .await
                .context("Engine check failed")?;
            println!("ffmpeg and ffprobe are available");
            Ok(true)
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,ffshare_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries progress and results.
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_config(explicit: Option<PathBuf>) -> Result<Config> {
    let path = explicit.or_else(|| std::env::var("FFSHARE_CONFIG").ok().map(PathBuf::from));

    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None if PathBuf::from(DEFAULT_CONFIG_PATH).exists() => {
            load_config(&PathBuf::from(DEFAULT_CONFIG_PATH)).context("Failed to load ffshare.toml")?
        }
        None => load_config_from_env().context("Failed to load configuration from environment")?,
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn compress(
    config: Config,
    files: Vec<PathBuf>,
    json: bool,
    metrics_out: Option<PathBuf>,
) -> Result<bool> {
    let engine = Arc::new(FfmpegEngine::new(config.engine.clone()));
    engine.validate().await.context("Engine check failed")?;

    let (audit_handle, writer_handle) = if config.audit.enabled {
        let store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&config.audit.database_path)
                .context("Failed to create audit store")?,
        );
        let (handle, writer) = create_audit_system(store, config.audit.buffer_size);
        (Some(handle), Some(tokio::spawn(writer.run())))
    } else {
        (None, None)
    };

    let mut runner = JobRunner::new(
        engine.clone(),
        engine,
        config.encoding.clone(),
        Arc::new(DefaultOutputPolicy::new(config.output.clone())),
    )
    .with_hooks(hooks_for(&config.output))
    .with_global_args(config.engine.extra_global_args.clone());
    if let Some(handle) = audit_handle {
        runner = runner.with_audit(handle);
    }
    info!(job = %runner.id(), files = files.len(), "Compressing");

    let printer = tokio::spawn(StatePrinter::new(json).run(runner.subscribe()));
    let cancel = runner.cancel_handle();

    let final_state = {
        let run = runner.run(files);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => result?,
            _ = signal::ctrl_c() => {
                warn!("Interrupted, cancelling");
                cancel.cancel();
                run.await?
            }
        }
    };

    // Closes the state feed and the audit channel.
    drop(runner);
    if let Err(e) = printer.await {
        warn!("State printer failed: {}", e);
    }
    if let Some(handle) = writer_handle {
        let _ = handle.await;
    }

    if let Some(path) = metrics_out {
        write_metrics(&path).with_context(|| format!("Failed to write metrics to {:?}", path))?;
    }

    Ok(matches!(final_state, JobState::Completed { .. }))
}

async fn plan(config: Config, files: Vec<PathBuf>) -> Result<()> {
    let engine = FfmpegEngine::new(config.engine.clone());
    let policy = DefaultOutputPolicy::new(config.output.clone());

    for input in files {
        let kind = classify(&input.to_string_lossy());
        if !kind.is_supported() {
            println!("{}: unsupported media type", input.display());
            continue;
        }

        let probe = match engine.probe(&input).await {
            Ok(probe) => probe,
            Err(e) => {
                println!("{}: {}", input.display(), e);
                continue;
            }
        };

        let target = match policy.output_for(&input, kind) {
            Ok(target) => target,
            Err(e) => {
                println!("{}: {}", input.display(), e);
                continue;
            }
        };

        let plan = planner::plan(
            &input.to_string_lossy(),
            &probe,
            kind,
            target.kind,
            &config.encoding,
        );
        let command = build_command(
            &config.engine.extra_global_args,
            &input,
            &plan.params,
            &target.path,
        );
        println!("{} {}", config.engine.ffmpeg_path.display(), command);
    }

    Ok(())
}

fn history(config: Config, failed: bool, limit: i64) -> Result<()> {
    if limit <= 0 {
        bail!("--limit must be positive");
    }
    if !config.audit.database_path.exists() {
        println!("No encode records yet");
        return Ok(());
    }

    let store =
        SqliteAuditStore::new(&config.audit.database_path).context("Failed to open audit store")?;
    let mut filter = AuditFilter::new().with_limit(limit);
    if failed {
        filter = filter.with_success(false);
    }

    let records = store.query(&filter).context("Failed to query audit store")?;
    print_history(&records);
    Ok(())
}
