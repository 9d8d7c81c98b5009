use crate::{
    config::Config,
    delete::{Executor, SystemTrash},
    lock::RunLock,
    pipeline::Cleanup,
    progress::LogProgress,
    scan::{self, ScanOptions},
    store::JsonFileStore,
    util::ensure_dir,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "backup-janitor")]
#[command(about = "Retention and cleanup for backup job directories (age + quota + minimum keep)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./backup-janitor.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List discovered jobs, oldest first.
    Scan {},
    /// Show what a cleanup would delete, without deleting.
    Plan {},
    /// Apply the retention policy.
    Run {
        /// Only run when retention.auto_cleanup is enabled.
        #[arg(long)]
        scheduled: bool,
    },
    /// Delete every job regardless of policy.
    Wipe {
        #[arg(long)]
        yes: bool,
    },
    /// Job count, footprint and last run summary.
    Status {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = Config::load(&cfg_path)?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Scan {} => list_jobs(&cfg),
        Command::Plan {} => plan(&cfg),
        Command::Run { scheduled } => {
            if *scheduled && !cfg.retention.auto_cleanup {
                info!("auto_cleanup is disabled; skipping scheduled run");
                return Ok(());
            }
            cleanup(&cfg, false)
        }
        Command::Wipe { yes } => {
            if !yes {
                bail!("wipe deletes every backup job; pass --yes to confirm");
            }
            cleanup(&cfg, true)
        }
        Command::Status {} => status(&cfg),
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("backup-janitor.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("backup-janitor.example.toml")
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    if cfg.paths.root.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.paths.root).join("logs").join("backup-janitor.log"))
}

fn list_jobs(cfg: &Config) -> Result<()> {
    let roots = cfg.job_roots()?;
    let jobs = scan::scan(&roots, &ScanOptions::from_config(cfg))?;
    println!("{}", serde_json::to_string_pretty(&jobs)?);
    Ok(())
}

fn plan(cfg: &Config) -> Result<()> {
    let trash = SystemTrash;
    let store = JsonFileStore::new(cfg.paths.state_file()?);
    let engine = build_engine(cfg, &trash, &store)?;
    let eval = engine.plan(OffsetDateTime::now_utc())?;
    println!("{}", serde_json::to_string_pretty(&eval)?);
    Ok(())
}

fn status(cfg: &Config) -> Result<()> {
    let trash = SystemTrash;
    let store = JsonFileStore::new(cfg.paths.state_file()?);
    let engine = build_engine(cfg, &trash, &store)?;
    let status = engine.status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cleanup(cfg: &Config, full_wipe: bool) -> Result<()> {
    let lock_path = cfg.paths.lock_file()?;
    let _lock = RunLock::acquire(&lock_path)?;

    let trash = SystemTrash;
    let store = JsonFileStore::new(cfg.paths.state_file()?);
    let progress = LogProgress;
    let engine = build_engine(cfg, &trash, &store)?
        .with_progress(&progress)
        .with_audit_log(cfg.audit.log_path(&cfg.paths));

    let now = OffsetDateTime::now_utc();
    let result = if full_wipe {
        engine.wipe(now)?
    } else {
        engine.run(now)?
    };
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.summary_persisted {
        warn!("summary was not written to {}", store.path().display());
    }
    if !result.ok {
        bail!(
            "cleanup finished with {} failed job(s)",
            result.summary.error_count
        );
    }
    Ok(())
}

fn build_engine<'a>(
    cfg: &Config,
    trash: &'a SystemTrash,
    store: &'a JsonFileStore,
) -> Result<Cleanup<'a>> {
    let roots = cfg.job_roots()?;
    let trash_root = cfg
        .paths
        .app_trash_dir()
        .with_context(|| "resolving quarantine folder")?;
    let executor = Executor::new(cfg.delete_method(), trash_root, trash);
    info!(
        "backups={} reports={:?} method={}",
        roots.backups.display(),
        roots.reports,
        cfg.delete_method().as_str()
    );
    Ok(Cleanup::new(roots, cfg.policy(), executor, store)
        .with_scan_options(ScanOptions::from_config(cfg)))
}
