use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use reaper_core::config::{DEFAULT_ENDPOINT, DEFAULT_REGION};
use reaper_core::domain::{ClusterObservation, IdleBudget};
use reaper_core::impls::{DataprocClusterService, DryRunService, InMemoryFleet};
use reaper_core::ports::ClusterService;
use reaper_core::{ReaperBuilder, ReaperConfig};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Delete ephemeral clusters that stay idle longer than their `timeout` label allows.
#[derive(Parser, Debug)]
#[command(name = "cluster-reaper")]
struct Args {
    /// Project whose clusters are watched
    #[arg(long, env = "GC_PROJECT_ID")]
    project_id: Option<String>,

    /// Region to watch
    #[arg(long, env = "GC_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Seconds to sleep between poll cycles
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// Idle budget for clusters without a `timeout` label (e.g. t15); none by default
    #[arg(long, value_parser = IdleBudget::parse)]
    default_timeout: Option<IdleBudget>,

    /// Log "no clusters running" once per this many empty polls
    #[arg(long, default_value_t = 10)]
    quiet_log_every: u32,

    /// Log delete decisions without sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Base URL of the cluster-management API
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Bearer token for the cluster-management API
    #[arg(long, env = "GC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Serve the fleet from a JSON file of cluster observations instead of the API
    #[arg(long)]
    fleet_file: Option<PathBuf>,

    /// Run a single cycle, print its report as JSON and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "reaper_core=debug"
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn config(&self) -> ReaperConfig {
        ReaperConfig {
            project_id: self.project_id.clone(),
            region: self.region.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            default_budget: self.default_timeout.unwrap_or_default(),
            quiet_log_every: self.quiet_log_every,
            dry_run: self.dry_run,
            endpoint: self.endpoint.clone(),
            access_token: self.access_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format, args.log_level.as_deref());

    let config = args.config();
    info!(config = %serde_json::to_string(&config)?, "starting cluster reaper");
    let builder = ReaperBuilder::new(config.clone());

    match &args.fleet_file {
        Some(path) => {
            let fleet = load_fleet(path)?;
            launch(builder, fleet, config.dry_run, args.once).await
        }
        None => {
            let service = DataprocClusterService::new(
                &config.endpoint,
                config.access_token.clone(),
                config.request_timeout,
            )?;
            launch(builder, service, config.dry_run, args.once).await
        }
    }
}

async fn launch<S: ClusterService>(
    builder: ReaperBuilder,
    service: S,
    dry_run: bool,
    once: bool,
) -> Result<()> {
    if dry_run {
        run(builder, DryRunService::new(service), once).await
    } else {
        run(builder, service, once).await
    }
}

async fn run<S: ClusterService>(builder: ReaperBuilder, service: S, once: bool) -> Result<()> {
    let mut reaper = builder.build(service)?;

    if once {
        let Some(report) = reaper.tick().await else {
            bail!("poll cycle failed, see log for details");
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    reaper.run_until(shutdown_signal()).await;
    Ok(())
}

fn load_fleet(path: &Path) -> Result<InMemoryFleet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fleet file {}", path.display()))?;
    let clusters: Vec<ClusterObservation> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse fleet file {}", path.display()))?;
    Ok(InMemoryFleet::from_observations(clusters))
}

fn init_tracing(format: LogFormat, level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM. In-memory idle state is dropped on exit.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
