mod sequencer;
mod telemetry;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rand::Rng;
use sequencer::LatestResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Development companion for the SLMS ingestor.
#[derive(Debug, Parser)]
#[command(name = "slms-simulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve a fake board hub that the ingestor can poll.
    Upstream(UpstreamArgs),
    /// Poll the ingestor dashboard and log fleet status.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct UpstreamArgs {
    #[arg(long, env = "SIM_ADDR", default_value = "0.0.0.0:6050")]
    addr: String,

    #[arg(long, env = "DEVICES", default_value_t = 12)]
    devices: usize,

    /// Probability that a request is answered with the alert-feed shape.
    #[arg(long, env = "MALFORMED_RATE", default_value_t = 0.05)]
    malformed_rate: f64,
}

#[derive(Debug, Args)]
struct WatchArgs {
    #[arg(long, env = "SLMS_URL", default_value = "http://localhost:3000")]
    url: String,

    #[arg(long, env = "WATCH_INTERVAL_SECS", default_value_t = 60)]
    interval_secs: u64,
}

#[derive(Clone)]
struct HubState {
    device_ids: Arc<Vec<String>>,
    malformed_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardSummary {
    uptime_percentage: f64,
    board_status: BoardCounts,
}

#[derive(Debug, Clone, Deserialize)]
struct BoardCounts {
    online: usize,
    offline: usize,
    power_off: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Upstream(args) => run_upstream(args).await,
        Command::Watch(args) => run_watch(args).await,
    }
}

async fn run_upstream(args: UpstreamArgs) -> anyhow::Result<()> {
    info!(
        "Starting fake board hub on {} with {} devices, malformed rate {}",
        args.addr, args.devices, args.malformed_rate
    );

    let state = HubState {
        device_ids: Arc::new(telemetry::device_ids(args.devices)),
        malformed_rate: args.malformed_rate.clamp(0.0, 1.0),
    };

    let app = Router::new()
        .route("/iothub/show.jsp", get(show_boards))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn show_boards(State(state): State<HubState>) -> Json<Value> {
    let mut rng = rand::thread_rng();

    if rng.gen_bool(state.malformed_rate) {
        warn!("Answering with alert feed instead of board list");
        return Json(json!({ "alerts": [] }));
    }

    let now = Utc::now();
    let boards: Vec<_> = state
        .device_ids
        .iter()
        .map(|id| telemetry::generate_board(&mut rng, id, now))
        .collect();
    debug!("Serving {} board records", boards.len());

    Json(json!(boards))
}

async fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let url = format!("{}/api/dashboard", args.url.trim_end_matches('/'));
    let latest = Arc::new(LatestResponse::<DashboardSummary>::new());

    info!("Watching {} every {}s", url, args.interval_secs);

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                if let Some((seq, summary)) = latest.current().await {
                    info!("Last applied response #{}: uptime {}%", seq, summary.uptime_percentage);
                }
                return Ok(());
            }
        }

        // Requests are not awaited here; a slow one must not hold back the
        // next tick, and its late answer is dropped by the sequencer.
        let seq = latest.issue();
        let client = client.clone();
        let url = url.clone();
        let latest = latest.clone();
        tokio::spawn(async move {
            let summary = match fetch_summary(&client, &url).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("Request #{} failed: {}", seq, e);
                    return;
                }
            };

            if latest.offer(seq, summary.clone()).await {
                let counts = &summary.board_status;
                info!(
                    "#{} uptime {}% (on {}, off {}, power off {})",
                    seq, summary.uptime_percentage, counts.online, counts.offline, counts.power_off
                );
            } else {
                debug!("Discarding stale response #{}", seq);
            }
        });
    }
}

async fn fetch_summary(client: &reqwest::Client, url: &str) -> anyhow::Result<DashboardSummary> {
    let summary = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<DashboardSummary>()
        .await?;
    Ok(summary)
}
