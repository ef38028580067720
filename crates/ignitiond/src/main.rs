//! ignitiond - rate-limited game server starter
//!
//! Wires the components together:
//! - Configuration loading
//! - Usage store
//! - WebDriver browser backend
//! - Gatekeeper, automation driver and orchestrator
//!
//! A chat front end talks to `ignitiond serve` over stdin/stdout, one JSON
//! request per line. `start`, `stats`, `rules` and `health` are one-shot
//! commands for operators.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ignition_browser_api::BrowserBackend;
use ignition_config::{Config, load_config};
use ignition_core::{
    AutomationDriver, DriverSettings, Gatekeeper, OutcomeCategory, StartOrchestrator, StartReply,
    StartResult, render_rules, render_stats,
};
use ignition_store::{SqliteStore, UsageStore};
use ignition_util::{DATABASE_FILENAME, RequesterId, default_config_path};
use ignition_webdriver::{WebDriverBackend, WebDriverConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// ignitiond - start the game server on request, within fair-use limits
#[derive(Parser, Debug)]
#[command(name = "ignitiond")]
#[command(about = "Rate-limited game server starter", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/ignition/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set IGNITION_DATA_DIR env var)
    #[arg(short, long, env = "IGNITION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle start requests read as JSON lines from stdin
    Serve,

    /// Attempt one server start on behalf of a requester
    Start {
        /// Requester identity
        #[arg(long)]
        requester_id: i64,

        /// Name shown in replies
        #[arg(long)]
        name: String,
    },

    /// Show usage statistics
    Stats {
        /// How many requesters to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Show the start rules
    Rules,

    /// Check the usage store and the WebDriver endpoint
    Health,
}

/// One line of `serve` input
#[derive(Debug, Deserialize)]
struct StartRequest {
    requester_id: RequesterId,
    display_name: String,
}

/// One line of `serve` output
#[derive(Debug, Serialize)]
struct StartResponse<'a> {
    requester_id: RequesterId,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deny_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<OutcomeCategory>,
    user_message: &'a str,
    admin_notification: Option<&'a str>,
}

impl<'a> StartResponse<'a> {
    fn new(requester_id: RequesterId, reply: &'a StartReply) -> Self {
        let (allowed, deny_reason, outcome) = match &reply.result {
            StartResult::Denied { reason, .. } => (false, Some(reason.code()), None),
            StartResult::Completed(outcome) => (true, None, Some(outcome.category)),
        };
        Self {
            requester_id,
            allowed,
            deny_reason,
            outcome,
            user_message: &reply.user_message,
            admin_notification: reply.admin_notification.as_deref(),
        }
    }
}

/// Everything a command may need
struct Service {
    config: Config,
    store: Arc<dyn UsageStore>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            site = %config.site.url,
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn UsageStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        Ok(Self { config, store })
    }

    fn backend(&self) -> Result<WebDriverBackend> {
        let backend = WebDriverBackend::new(WebDriverConfig {
            endpoint: self.config.browser.webdriver_url.clone(),
            request_timeout: self.config.browser.request_timeout,
        })
        .context("Failed to set up WebDriver client")?;
        Ok(backend)
    }

    fn orchestrator(&self) -> Result<StartOrchestrator> {
        let backend = Arc::new(self.backend()?);
        info!(endpoint = backend.endpoint(), "WebDriver backend ready");

        let driver = AutomationDriver::new(backend, DriverSettings::from_config(&self.config));
        Ok(StartOrchestrator::new(
            Gatekeeper::new(self.store.clone()),
            Arc::new(driver),
            self.config.automation.max_concurrent_runs,
        ))
    }
}

async fn start_once(service: &Service, requester_id: RequesterId, name: &str) -> Result<()> {
    let orchestrator = service.orchestrator()?;
    let reply = orchestrator
        .attempt_start(requester_id, name, ignition_util::now())
        .await;

    println!("{}", reply.user_message);
    if let Some(admin) = &reply.admin_notification {
        println!();
        println!("[admin] {}", admin.replace('\n', "\n[admin] "));
    }
    Ok(())
}

async fn serve(orchestrator: Arc<StartOrchestrator>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    info!("Waiting for start requests on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read request")? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let request: StartRequest = match serde_json::from_str(&line) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(error = %e, "Ignoring malformed request");
                        continue;
                    }
                };

                let orchestrator = orchestrator.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let reply = orchestrator
                        .attempt_start(request.requester_id, &request.display_name, ignition_util::now())
                        .await;
                    match serde_json::to_string(&StartResponse::new(request.requester_id, &reply)) {
                        Ok(line) => {
                            let _ = tx.send(line);
                        }
                        Err(e) => error!(error = %e, "Failed to encode reply"),
                    }
                });
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, letting runs in progress finish");
                orchestrator.shutdown();
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, letting runs in progress finish");
                orchestrator.shutdown();
                break;
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Request task failed");
        }
    }

    drop(tx);
    writer.await.context("Reply writer crashed")??;
    Ok(())
}

async fn health(service: &Service) -> Result<()> {
    let store_ok = service.store.is_healthy();
    let backend = service.backend()?;
    let browser_ok = backend.is_healthy().await;

    println!("usage store: {}", if store_ok { "ok" } else { "FAILED" });
    println!(
        "webdriver ({}): {}",
        backend.endpoint(),
        if browser_ok { "ready" } else { "not ready" }
    );

    if !(store_ok && browser_ok) {
        bail!("ignitiond is not healthy");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries `serve` replies.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "ignitiond starting");

    if ignition_util::is_mock_time_active() {
        warn!("Mock time is active, timestamps are shifted");
    }

    match &args.command {
        Command::Rules => {
            println!("{}", render_rules());
            Ok(())
        }
        Command::Serve => {
            let service = Service::new(&args)?;
            serve(Arc::new(service.orchestrator()?)).await
        }
        Command::Start { requester_id, name } => {
            let service = Service::new(&args)?;
            start_once(&service, RequesterId::new(*requester_id), name).await
        }
        Command::Stats { top } => {
            let service = Service::new(&args)?;
            let stats = service
                .store
                .usage_stats(*top)
                .context("Failed to read usage statistics")?;
            println!("{}", render_stats(&stats));
            Ok(())
        }
        Command::Health => {
            let service = Service::new(&args)?;
            health(&service).await
        }
    }
}
