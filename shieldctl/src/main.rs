//! `shieldctl`: submit scans, follow them to completion, and tail the live
//! event feed of a CyberShield backend.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use shield_config::constants::DEFAULT_WS_URL;
use shield_config::validation::apply_guard_rails;
use shield_config::{ConfigLoad, ConfigLoader, ConfigSource, SyncConfig};
use shield_model::{ComplianceReport, ComplianceStandard, ScanStatus};
use shield_sync::{
    EventFeed, HttpScanApi, PollEvent, PollerSettings, PushEventClient, ScanApi,
    ScanPoller, push::push_url_for_api,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shieldctl", version)]
#[command(about = "Submit CyberShield scans and follow scan status and live events")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend API root (overrides config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Push channel WebSocket URL (overrides config)
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a scan of a target and follow it until it finishes
    Scan {
        /// URL or host to scan
        target: String,

        /// Print the scan id and exit without following the scan
        #[arg(long, default_value_t = false)]
        no_watch: bool,
    },
    /// Follow an existing scan until it finishes
    Watch {
        /// Scan id returned when the scan was created
        scan_id: String,
    },
    /// List scans known to the backend
    History,
    /// Tail live events from the push channel
    Events {
        /// Exit after this many events
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Map a completed scan's findings onto the built-in compliance standards
    Compliance {
        /// Scan id of a completed scan
        scan_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shield_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Scan { target, no_watch } => {
            let api = Arc::new(build_api(&config)?);
            let scan_id = api
                .create_scan(&target)
                .await
                .context("failed to create scan")?;
            println!("scan {scan_id} queued for {target}");
            if no_watch {
                return Ok(());
            }
            follow(api, &config, scan_id, Some(target)).await
        }
        Command::Watch { scan_id } => {
            let api = Arc::new(build_api(&config)?);
            follow(api, &config, scan_id, None).await
        }
        Command::History => {
            let api = build_api(&config)?;
            let jobs = api
                .scan_history()
                .await
                .context("failed to fetch scan history")?;
            print!("{}", render::history(&jobs));
            Ok(())
        }
        Command::Events { limit } => tail_events(&config, limit).await,
        Command::Compliance { scan_id } => {
            let api = build_api(&config)?;
            let job = api
                .scan_status(&scan_id)
                .await
                .with_context(|| format!("failed to fetch scan {scan_id}"))?;
            if job.status != ScanStatus::Completed {
                bail!("scan {scan_id} is {}, compliance needs a completed scan", job.status);
            }
            let report =
                ComplianceReport::evaluate(&ComplianceStandard::builtin(), &job.findings);
            print!("{}", render::compliance(&report));
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path.clone());
    }
    let ConfigLoad {
        mut config,
        mut warnings,
    } = loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    match &config.metadata.source {
        ConfigSource::Default => {}
        ConfigSource::EnvPath(path) | ConfigSource::File(path) => {
            info!(path = %path.display(), "configuration loaded from file")
        }
    }

    let overridden = cli.api_url.is_some() || cli.ws_url.is_some();
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.trim_end_matches('/').to_string();
    }
    match &cli.ws_url {
        Some(url) => config.push.url = url.clone(),
        // Follow --api-url unless a push URL was configured explicitly.
        None if cli.api_url.is_some() && config.push.url == DEFAULT_WS_URL => {
            if let Ok(url) = push_url_for_api(&config.api.base_url) {
                config.push.url = url.to_string();
            }
        }
        None => {}
    }
    if overridden {
        warnings = apply_guard_rails(&config)
            .context("command-line URL rejected")?;
    }

    for warning in &warnings {
        match warning.hint() {
            Some(hint) => warn!(message = %warning, hint, "configuration warning"),
            None => warn!(message = %warning, "configuration warning"),
        }
    }

    Ok(config)
}

fn build_api(config: &SyncConfig) -> anyhow::Result<HttpScanApi> {
    HttpScanApi::from_config(&config.api).context("failed to build API client")
}

async fn follow(
    api: Arc<HttpScanApi>,
    config: &SyncConfig,
    scan_id: String,
    target: Option<String>,
) -> anyhow::Result<()> {
    let mut poller = ScanPoller::new(api, PollerSettings::from(&config.poller))?;
    let mut updates = match target {
        Some(target) => poller.start_with_target(scan_id.clone(), target)?,
        None => poller.start(scan_id.clone())?,
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(scan_id = %scan_id, "interrupted, stopping");
                poller.stop();
                return Ok(());
            }
            event = updates.next() => match event {
                Some(PollEvent::Snapshot { job, .. }) => println!("{}", render::progress(&job)),
                Some(PollEvent::FetchFailed { seq, error }) => {
                    eprintln!("status check #{seq} failed, retrying: {error}")
                }
                None => break,
            },
        }
    }

    let Some(job) = poller.latest() else {
        bail!("scan {scan_id} stopped before any status was received");
    };
    print!("{}", render::findings(&job.findings));
    if job.status == ScanStatus::Failed {
        bail!("scan {scan_id} failed");
    }
    Ok(())
}

async fn tail_events(config: &SyncConfig, limit: Option<usize>) -> anyhow::Result<()> {
    if limit == Some(0) {
        info!(received = 0, "event limit is zero, not connecting");
        return Ok(());
    }

    let client = PushEventClient::from_config(&config.push)
        .context("failed to build push client")?;
    let feed = EventFeed::new(config.push.feed_capacity);
    let _recorder = feed.attach(&client);
    let mut events = client.event_stream();

    client.connect();
    let mut received = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => {
                let Some(event) = event else { break };
                println!("{}", render::event(&event));
                received += 1;
                if limit.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
        }
    }

    client.close().await;
    info!(
        received,
        buffered = feed.len(),
        reconnects = client.reconnect_attempts(),
        "event tail finished"
    );
    Ok(())
}
