use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use taperd::bridge::{create_router, AppState, Reconciler, WorkerClient};
use taperd::capture::CpalBackend;
use taperd::config::Config;
use taperd::session::{KeepAlive, LogWakeLock, NotificationPresenter, SessionManager};

#[derive(Parser)]
#[command(name = "taperd", about = "Background recording session worker and controller")]
struct Cli {
    /// Config file path (extension optional, file optional)
    #[arg(long, default_value = "config/taperd")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker process (owns the capture resource and the bridge)
    Serve,
    /// Start a recording session
    Start {
        /// Output path; chunk files derive from it. Generated when omitted.
        output: Option<String>,
        /// Chunk duration in seconds; 0 disables rotation
        #[arg(long)]
        chunk_secs: Option<u64>,
    },
    /// Stop the active session
    Stop,
    /// Pause the active session
    Pause,
    /// Resume a paused session
    Resume,
    /// Print the worker's state snapshot
    Status,
    /// Follow the worker state via the reconciliation loop
    Watch,
    /// Ask the worker to request a power-management exemption
    Exempt,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Start { output, chunk_secs } => {
            let client = client(&cfg)?;
            let output = output.unwrap_or_else(|| generated_output(&cfg));
            let chunk_ms = chunk_secs
                .or(Some(cfg.session.chunk_secs))
                .filter(|s| *s > 0)
                .map(|s| s * 1000);
            report(client.start_recording(&output, chunk_ms).await, "start")
        }
        Command::Stop => report(client(&cfg)?.stop_recording().await, "stop"),
        Command::Pause => report(client(&cfg)?.pause_recording().await, "pause"),
        Command::Resume => report(client(&cfg)?.resume_recording().await, "resume"),
        Command::Status => {
            let snapshot = client(&cfg)?.snapshot_or_idle().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Command::Watch => watch(&cfg).await,
        Command::Exempt => report(client(&cfg)?.request_battery_exemption().await, "exempt"),
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("{} starting", cfg.service.name);

    let backend = Arc::new(CpalBackend::new());
    let keepalive = Arc::new(KeepAlive::new(Arc::new(LogWakeLock::new()), platform_notifier()));
    let manager = Arc::new(SessionManager::with_heartbeat_interval(
        backend,
        keepalive,
        Duration::from_secs(cfg.session.heartbeat_secs),
    ));

    let router = create_router(AppState::new(Arc::clone(&manager)));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind bridge address {addr}"))?;
    info!("bridge listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("bridge server failed")?;

    // Release the capture resource and keep-alive duties before exit.
    manager.teardown().await;
    info!("worker shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
    }
}

async fn watch(cfg: &Config) -> Result<()> {
    let client = client(cfg)?;
    let (mut rx, _handle) = Reconciler::new(client).spawn();

    println!("{:?}", *rx.borrow());
    while rx.changed().await.is_ok() {
        println!("{:?}", *rx.borrow());
    }
    Ok(())
}

fn client(cfg: &Config) -> Result<WorkerClient> {
    WorkerClient::new(cfg.bridge_url())
}

fn generated_output(cfg: &Config) -> String {
    format!(
        "{}/rec-{}.m4a",
        cfg.session.recordings_path,
        uuid::Uuid::new_v4()
    )
}

fn report(ok: bool, op: &str) -> Result<()> {
    if ok {
        println!("{op}: ok");
        Ok(())
    } else {
        println!("{op}: refused or failed");
        std::process::exit(1);
    }
}

#[cfg(target_os = "linux")]
fn platform_notifier() -> Arc<dyn NotificationPresenter> {
    Arc::new(taperd::session::DesktopNotifier::new())
}

#[cfg(not(target_os = "linux"))]
fn platform_notifier() -> Arc<dyn NotificationPresenter> {
    Arc::new(taperd::session::LogNotifier)
}
