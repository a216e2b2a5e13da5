//! shipwatch - vessel proximity monitor
//!
//! # Usage
//!
//! ```bash
//! # Monitor with ./shipwatch.toml (or built-in defaults)
//! shipwatch
//!
//! # One refresh cycle, then exit
//! shipwatch --once
//!
//! # Device token management and feed health
//! shipwatch register-token --token <TOKEN>
//! shipwatch unregister-token --token <TOKEN>
//! shipwatch check
//! ```
//!
//! # Environment Variables
//!
//! - `SHIPWATCH_CONFIG`: Path to the TOML config file
//! - `SHIPWATCH_SERVER_ADDR`: Status API bind address
//! - `SHIPWATCH_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use shipwatch::api::{create_app, ApiState};
use shipwatch::config::defaults::DELIVERY_DRAIN_TIMEOUT_SECS;
use shipwatch::config::WatchConfig;
use shipwatch::geodesy::bounding_box;
use shipwatch::notify::{DeliveryReport, HttpPushTransport, NotificationDispatcher};
use shipwatch::pipeline::{CycleReport, MonitoringEngine, RefreshScheduler, WatchState};
use shipwatch::tracking::AlertTracker;
use shipwatch::{DeliveryOutcome, HttpVesselFeed, VesselFeed};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "shipwatch")]
#[command(about = "Vessel proximity monitor with inner-zone push alerts")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides SHIPWATCH_CONFIG and ./shipwatch.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the status API address (default: "0.0.0.0:8080")
    #[arg(short, long, value_name = "HOST:PORT", env = "SHIPWATCH_SERVER_ADDR")]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Run a single refresh cycle, wait for its deliveries, then exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Register a device token with the push gateway
    RegisterToken {
        #[arg(long)]
        token: String,
    },
    /// Unregister a device token from the push gateway
    UnregisterToken {
        #[arg(long)]
        token: String,
    },
    /// Probe the feed health endpoint and fetch one batch
    Check,
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    Scheduler,
    Engine,
    HttpServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Scheduler => write!(f, "Scheduler"),
            TaskName::Engine => write!(f, "Engine"),
            TaskName::HttpServer => write!(f, "HttpServer"),
        }
    }
}

/// Run the supervisor loop: monitor tasks, cancel everything on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!(task = %task_name, "Supervisor: task completed");
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let tasks observe cancellation and finish their shutdown
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!(task = %task_name, "Stopped");
        }
    }
    Ok(())
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WatchConfig> {
    match path {
        Some(p) => WatchConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(WatchConfig::load()),
    }
}

fn build_dispatcher(config: &WatchConfig) -> Result<NotificationDispatcher> {
    let n = &config.notifications;
    let transport = HttpPushTransport::new(&n.base_url).context("Failed to build push transport")?;
    Ok(NotificationDispatcher::new(
        Arc::new(transport),
        n.retry_policy(),
        n.alert_path.clone(),
        n.device_token.clone(),
    ))
}

fn report_token_call(action: &str, report: &DeliveryReport) -> Result<()> {
    info!(
        action,
        outcome = %report.outcome,
        attempts = report.attempts,
        "Push gateway call finished"
    );
    if report.outcome == DeliveryOutcome::Delivered {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} failed after {} attempt(s): {}",
            action,
            report.attempts,
            report.last_error.as_deref().unwrap_or("unknown error")
        ))
    }
}

async fn run_check(feed: &HttpVesselFeed) -> Result<()> {
    let health_url = feed.health_url()?;
    match feed.check_health(&health_url).await {
        Ok(body) => info!(url = %health_url, body = %body, "Feed health OK"),
        Err(e) => warn!(url = %health_url, error = %e, "Feed health check failed"),
    }

    let batch = feed
        .fetch()
        .await
        .with_context(|| format!("Fetching {} failed", feed.ships_url()))?;
    info!(
        records = batch.records.len(),
        reported_total = ?batch.reported_total,
        backend_zones = ?batch.zone_counts,
        "Feed fetch OK"
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = load_config(args.config.as_ref())?;
    let observer = config.observer.coordinate();
    let radii = config.zones.radii().context("Invalid zone radii")?;
    info!(
        observer = %observer,
        inner_m = radii.inner(),
        middle_m = radii.middle(),
        outer_m = radii.outer(),
        "Observation point"
    );

    let bbox = config
        .feed
        .send_bbox
        .then(|| bounding_box(observer, radii.outer()));
    let feed = HttpVesselFeed::new(&config.feed, bbox).context("Failed to build feed client")?;
    let dispatcher = Arc::new(build_dispatcher(&config)?);

    match &args.command {
        Some(SubCommand::RegisterToken { token }) => {
            let report = dispatcher.register_token(token).await;
            return report_token_call("register-token", &report);
        }
        Some(SubCommand::UnregisterToken { token }) => {
            let report = dispatcher.unregister_token(token).await;
            return report_token_call("unregister-token", &report);
        }
        Some(SubCommand::Check) => return run_check(&feed).await,
        None => {}
    }

    let watch_state = Arc::new(RwLock::new(WatchState::new()));
    let mut engine = MonitoringEngine::new(
        AlertTracker::new(observer, radii),
        Arc::new(feed),
        dispatcher,
        Arc::clone(&watch_state),
    )
    .with_schema(config.feed.schema)
    .with_notifications(config.notifications.enabled);

    if !config.notifications.enabled {
        info!("Notifications disabled: alerts are recorded but not sent");
    }

    if args.once {
        let report = engine.run_once().await;
        let outcomes = engine.wait_for_deliveries().await;
        info!(deliveries = outcomes.len(), "Single cycle complete");
        return match report {
            CycleReport::FeedFailed { error, .. } => Err(anyhow::anyhow!("Feed unavailable: {}", error)),
            _ => Ok(()),
        };
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let (scheduler, scheduler_handle, ticks) =
        RefreshScheduler::new(config.scheduler.refresh_interval());

    let server_addr = args.addr.unwrap_or_else(|| config.server.addr.clone());
    let relay = engine.relay();
    let app = create_app(ApiState {
        watch: Arc::clone(&watch_state),
        scheduler: scheduler_handle,
        relay: relay.clone(),
        observer,
        radii,
    });
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_addr))?;
    info!(addr = %server_addr, "Status API listening");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let token = cancel_token.clone();
    task_set.spawn(async move {
        scheduler.run(token).await;
        Ok(TaskName::Scheduler)
    });

    let token = cancel_token.clone();
    task_set.spawn(async move {
        engine.run(ticks, token).await;
        Ok(TaskName::Engine)
    });

    let token = cancel_token.clone();
    task_set.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;
        Ok(TaskName::HttpServer)
    });

    run_supervisor(&mut task_set, cancel_token).await?;

    let pending = relay.in_flight();
    if pending > 0 {
        info!(pending, "Waiting for in-flight deliveries");
        let drain = Duration::from_secs(DELIVERY_DRAIN_TIMEOUT_SECS);
        if tokio::time::timeout(drain, relay.wait_for_deliveries()).await.is_err() {
            warn!(pending, "Abandoned deliveries still in flight at shutdown");
        }
    }
    info!("Shutdown complete");
    Ok(())
}
