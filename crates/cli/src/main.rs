use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskprobe_cache::{prune_namespace, KeyPolicy, Namespace};
use taskprobe_ingest::{
    fresh_write, Discard, FanOut, SplitByPolicy, Stage, TrackerClient, TrackerConfig,
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod metrics;
mod probe;
mod scheduler;
mod server;

#[derive(Parser, Debug)]
#[command(name = "taskprobe")]
#[command(about = "Cache-backed task status exporter for a remote tracker")]
#[command(version)]
struct Args {
    /// Listen address for the probe and metrics server
    #[arg(long, default_value = "0.0.0.0:9666")]
    listen: SocketAddr,

    /// Path to the cache directory
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Tracker endpoint given when the API client was created
    #[arg(long, env = "TRACKER_URL")]
    tracker_url: Option<url::Url>,

    /// Tracker API client id
    #[arg(long, env = "TRACKER_CLIENT_ID")]
    client_id: Option<String>,

    /// Tracker API client secret
    #[arg(long, env = "TRACKER_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Per-request timeout in seconds for tracker calls
    #[arg(long, default_value = "300")]
    fetch_timeout_secs: u64,

    /// Seconds between scheduled refresh runs
    #[arg(long, default_value = "3600")]
    refresh_interval_secs: u64,

    /// Lookback window in seconds for scheduled refresh runs
    #[arg(long, default_value = "7200")]
    refresh_lookback_secs: u64,

    /// Lookback window in seconds for startup and on-demand backfills
    #[arg(long, default_value = "172800")]
    backfill_lookback_secs: u64,

    /// Page size for tracker fetches
    #[arg(long, default_value = "5000")]
    page_limit: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete cache entries whose files are older than the retention age
    Prune {
        /// Retention age in seconds
        #[arg(long, default_value = "604800")]
        retention_secs: u64,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let mut args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_level(true).with_target(true))
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            args.log_level,
        ))
        .init();

    match args.command.take() {
        Some(Commands::Prune { retention_secs }) => {
            prune(&args.cache_dir, Duration::from_secs(retention_secs))
        }
        None => serve(args).await,
    }
}

fn prune(cache_dir: &std::path::Path, retention: Duration) -> eyre::Result<()> {
    let mut removed = 0;
    for policy in [KeyPolicy::ByPolicy, KeyPolicy::ByTenant, KeyPolicy::ByUuid] {
        let dir = cache_dir.join(policy.dir_name());
        if !dir.is_dir() {
            continue;
        }
        removed += prune_namespace(&dir, retention)?;
    }
    info!(removed, "prune finished");
    Ok(())
}

async fn serve(args: Args) -> eyre::Result<()> {
    let tracker_url = args
        .tracker_url
        .ok_or_else(|| eyre::eyre!("--tracker-url (or TRACKER_URL) is required"))?;
    let client_id = args
        .client_id
        .ok_or_else(|| eyre::eyre!("--client-id (or TRACKER_CLIENT_ID) is required"))?;
    let client_secret = args
        .client_secret
        .ok_or_else(|| eyre::eyre!("--client-secret (or TRACKER_CLIENT_SECRET) is required"))?;

    let policy_ns = Namespace::open(KeyPolicy::ByPolicy, &args.cache_dir)?;
    let tenant_ns = Namespace::open(KeyPolicy::ByTenant, &args.cache_dir)?;
    let uuid_ns = Namespace::open(KeyPolicy::ByUuid, &args.cache_dir)?;
    info!("cache directory: {}", args.cache_dir.display());

    // Every sink freshness-checks its own namespace, so overlapping runs
    // converge on the newest record no matter how they interleave.
    let pipeline: Arc<dyn Stage> = Arc::new(FanOut::new(vec![
        Box::new(SplitByPolicy::new(fresh_write(policy_ns.clone()), Discard)),
        Box::new(fresh_write(tenant_ns.clone())),
        Box::new(fresh_write(uuid_ns.clone())),
    ]));

    let client = Arc::new(
        TrackerClient::connect(TrackerConfig {
            base_url: tracker_url,
            client_id,
            client_secret,
            fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
            page_limit: args.page_limit,
        })
        .await?,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let state = server::AppState {
        policy: policy_ns,
        tenant: tenant_ns,
        uuid: uuid_ns,
    };
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("starting probe server on {}", args.listen);
    let server_task = tokio::spawn(server::serve(listener, state, shutdown_rx));

    scheduler::run(
        client,
        pipeline,
        scheduler::Schedule {
            refresh_interval: Duration::from_secs(args.refresh_interval_secs),
            refresh_lookback: Duration::from_secs(args.refresh_lookback_secs),
            backfill_lookback: Duration::from_secs(args.backfill_lookback_secs),
            page_limit: args.page_limit,
        },
        shutdown_tx,
    )
    .await?;

    server_task.await??;
    info!("shut down cleanly");
    Ok(())
}
