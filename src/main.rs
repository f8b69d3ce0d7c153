use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use driftd::{
    config::DaemonConfig,
    engine::{DriftComputer, FingerprintStore, MemoryFingerprintStore},
    metrics::EngineMetrics,
    policy::{PolicyEvaluator, PolicyRuleSet},
    reconciler::{providers_from_config, Reconciler},
    report::Reporter,
    rest,
    storage::{SqliteFingerprintStore, Storage},
    AppContext,
};

#[derive(Parser)]
#[command(
    name = "driftd",
    about = "driftd — always-on infrastructure drift reconciliation daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Health/metrics HTTP port
    #[arg(long, env = "DRIFTD_PORT")]
    port: Option<u16>,

    /// Data directory for config, SQLite database, and reports
    #[arg(long, env = "DRIFTD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DRIFTD_LOG")]
    log: Option<String>,

    /// Seconds between reconciliation cycles in serve mode
    #[arg(long, env = "DRIFTD_INTERVAL")]
    interval: Option<u64>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "DRIFTD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run continuous reconciliation (default when no subcommand given).
    ///
    /// Cycles every `interval_secs` and serves /health, /ready, and
    /// /metrics. A failed cycle is logged and the loop continues.
    Serve,
    /// Run exactly one reconciliation cycle and exit.
    ///
    /// Any provider or report failure aborts with a non-zero exit status —
    /// suited to cron jobs and CI gates.
    Once,
    /// Validate config, policy artifact, and snapshot paths, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = std::env::var("DRIFTD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    let config = Arc::new(DaemonConfig::new(
        args.data_dir,
        args.log,
        args.interval,
        args.port,
    ));

    match args.command {
        Some(Command::Once) => run_once(config).await,
        Some(Command::Check) => {
            let exit_code = run_check(&config);
            std::process::exit(exit_code);
        }
        None | Some(Command::Serve) => run_serve(config).await,
    }
}

/// Build the reconciler shared by serve and once modes.
fn build_reconciler(
    config: &Arc<DaemonConfig>,
    storage: &Arc<Storage>,
    metrics: Arc<EngineMetrics>,
    fail_fast: bool,
) -> Reconciler {
    let store: Arc<dyn FingerprintStore> = if config.engine.persist_fingerprints {
        Arc::new(SqliteFingerprintStore::new(
            storage.pool(),
            config.engine.dedup_retention_secs,
        ))
    } else {
        Arc::new(MemoryFingerprintStore::new(
            config.engine.dedup_capacity,
            config.engine.dedup_retention_secs,
        ))
    };

    let rules = PolicyRuleSet::load(&config.policy_candidates());
    let evaluator = PolicyEvaluator::new(rules, config.environment.clone());

    let providers = providers_from_config(config);
    if providers.is_empty() {
        warn!("no domains configured — cycles will report nothing (add [domains.*] to config.toml)");
    }

    Reconciler::new(
        providers,
        DriftComputer::new(store),
        evaluator,
        Reporter::new(config.report_destination()),
        Some(storage.clone()),
        metrics,
        fail_fast,
    )
}

async fn run_serve(config: Arc<DaemonConfig>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        interval_secs = config.interval_secs,
        environment = %config.environment,
        "starting driftd"
    );

    let storage = Arc::new(Storage::new(&config.data_dir).await?);
    let metrics = Arc::new(EngineMetrics::new());
    let reconciler = build_reconciler(&config, &storage, metrics.clone(), false);

    let ctx = Arc::new(AppContext::new(config.clone(), storage, metrics));

    // Health/metrics responder runs beside the cycle loop; its failure is
    // not fatal to reconciliation.
    let http_ctx = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = rest::start_http_server(http_ctx).await {
            warn!(error = %e, "health/metrics endpoint failed");
        }
    });

    reconciler
        .run_loop(config.interval_secs, ctx.ready.clone())
        .await;
    Ok(())
}

async fn run_once(config: Arc<DaemonConfig>) -> Result<()> {
    let storage = Arc::new(Storage::new(&config.data_dir).await?);
    let metrics = Arc::new(EngineMetrics::new());
    let reconciler = build_reconciler(&config, &storage, metrics, true);

    let summary = reconciler
        .run_cycle()
        .await
        .context("reconciliation cycle failed")?;
    info!(
        cycle_id = %summary.cycle_id,
        drift = summary.drift_records,
        actions = summary.actions,
        "one-shot reconciliation complete"
    );
    Ok(())
}

/// Validate the deployment without running a cycle. Returns the process
/// exit code: 0 when everything resolves, 1 otherwise.
fn run_check(config: &DaemonConfig) -> i32 {
    let mut failures = 0;

    println!("data dir:     {}", config.data_dir.display());
    println!("environment:  {}", config.environment);
    println!("interval:     {}s", config.interval_secs);
    println!("report sink:  {:?}", config.report_destination());

    match config.policy_candidates().iter().find(|p| p.exists()) {
        Some(path) => println!("policy:       {}", path.display()),
        None => println!("policy:       (none found — built-in defaults apply)"),
    }

    if config.domains.is_empty() {
        println!("domains:      none configured");
        failures += 1;
    }
    for (name, snapshots) in &config.domains {
        if driftd::model::Domain::parse(name).is_none() {
            println!("domain {name}: unknown domain name");
            failures += 1;
            continue;
        }
        for (which, path) in [("desired", &snapshots.desired), ("live", &snapshots.live)] {
            if path.exists() {
                println!("domain {name}: {which} snapshot {}", path.display());
            } else {
                println!("domain {name}: {which} snapshot MISSING at {}", path.display());
                failures += 1;
            }
        }
    }

    if failures == 0 {
        println!("ok");
        0
    } else {
        println!("{failures} problem(s) found");
        1
    }
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("driftd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
