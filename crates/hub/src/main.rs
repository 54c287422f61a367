use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sn_domain::config::{Config, ConfigSeverity, EscalationMode};
use sn_domain::feed::{FeedChannel, FeedSource, NewFeedItem};
use sn_gateway_client::{GatewayClient, GatewayEvent, HookClient};
use sn_hub::analyzer::{Analyzer, AnalyzerParts};
use sn_hub::api;
use sn_hub::buffers::{FeedBuffer, SenseBuffer};
use sn_hub::bus::FeedBus;
use sn_hub::capture::CaptureState;
use sn_hub::escalation::Orchestrator;
use sn_hub::obs::{Profiler, TraceJournal, Tracer};
use sn_hub::overlay::OverlayServer;
use sn_hub::state::AppState;
use sn_model::client::ChatClient;

#[derive(Parser)]
#[command(name = "sinain", about = "Real-time activity-awareness hub", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "sinain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hub (default).
    Serve,
    /// Validate the config file and exit.
    ConfigValidate,
    /// Print the effective config and exit.
    ConfigShow,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            run_server(Arc::new(config)).await
        }
        Some(Command::ConfigValidate) => {
            let issues = config.validate();
            for issue in &issues {
                eprintln!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            println!("config ok");
            Ok(())
        }
        Some(Command::ConfigShow) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Structured JSON tracing for the serve path.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sn_hub=debug")),
        )
        .json()
        .init();
}

/// Load the config file; a missing file means defaults.
fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("reading config file {}", path.display())),
    }
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("sinain starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let shutdown = CancellationToken::new();

    // ── Buffers + capture + fan-out ──────────────────────────────────
    let feed = Arc::new(FeedBuffer::new());
    let sense = Arc::new(SenseBuffer::new());
    let capture = Arc::new(CaptureState::new());
    let overlay = OverlayServer::new(capture.clone());
    let analyzer_wake = Arc::new(Notify::new());
    let bus = FeedBus::new(feed.clone(), overlay.clone(), analyzer_wake.clone());
    tracing::info!("buffers + fan-out ready");

    // ── Observability ────────────────────────────────────────────────
    let profiler = Arc::new(Profiler::new());
    profiler.spawn_samplers(shutdown.clone());
    let tracer = Arc::new(Tracer::new());
    let journal = Arc::new(TraceJournal::new(
        config.trace.enabled,
        config.trace.dir.clone(),
    ));
    tracing::info!(
        trace_enabled = config.trace.enabled,
        trace_dir = %config.trace.dir.display(),
        "observability ready"
    );

    // ── Assistant gateway client ─────────────────────────────────────
    let gateway = {
        let bus = bus.clone();
        let overlay = overlay.clone();
        GatewayClient::new(
            config.openclaw.gateway_ws_url.clone(),
            config.gateway_token(),
            Arc::new(move |event| match event {
                GatewayEvent::Feed { text, priority } => {
                    bus.publish(NewFeedItem {
                        source: FeedSource::Assistant,
                        channel: FeedChannel::Agent,
                        priority,
                        text,
                    });
                }
                GatewayEvent::Task(task) => overlay.broadcast_spawn_task(task),
            }),
        )
    };

    let hook = if config.openclaw.hook_url.is_empty() {
        None
    } else {
        Some(
            HookClient::new(config.openclaw.hook_url.clone(), config.hook_token())
                .context("initializing hook client")?,
        )
    };
    tracing::info!(
        gateway = !config.openclaw.gateway_ws_url.is_empty(),
        hook = hook.is_some(),
        "assistant transports configured"
    );

    // ── Escalation orchestrator ──────────────────────────────────────
    let orchestrator = Orchestrator::new(
        config.escalation.mode,
        config.escalation.cooldown_ms,
        config.openclaw.session_key.clone(),
        gateway.clone(),
        hook,
        bus.clone(),
    );
    if config.escalation.mode != EscalationMode::Off {
        gateway.start();
    }
    tracing::info!(mode = %config.escalation.mode, "escalation orchestrator ready");

    // ── Tick engine ──────────────────────────────────────────────────
    let analyzer = if !config.agent.enabled {
        tracing::info!("agent disabled by config");
        None
    } else {
        match config.model_api_key() {
            None => {
                tracing::warn!(
                    env_var = %config.agent.api_key_env,
                    "model key missing — tick engine disabled, ingress and fan-out still run"
                );
                None
            }
            Some(key) => {
                let transport = ChatClient::new(
                    config.agent.base_url.clone(),
                    Some(key),
                    config.agent.max_tokens,
                    config.agent.temperature,
                )
                .context("initializing chat client")?;
                let analyzer = Analyzer::new(AnalyzerParts {
                    cfg: config.agent.clone(),
                    transport: Arc::new(transport),
                    feed: feed.clone(),
                    sense: sense.clone(),
                    bus: bus.clone(),
                    overlay: overlay.clone(),
                    orchestrator: orchestrator.clone(),
                    tracer: tracer.clone(),
                    journal: journal.clone(),
                    profiler: profiler.clone(),
                    situation_path: config
                        .situation
                        .enabled
                        .then(|| config.situation.path.clone()),
                    wake: analyzer_wake.clone(),
                });
                analyzer.spawn(shutdown.clone());
                Some(analyzer)
            }
        }
    };

    // ── Heartbeat ────────────────────────────────────────────────────
    overlay.spawn_heartbeat(shutdown.clone());

    // ── Router + bind ────────────────────────────────────────────────
    let state = AppState {
        config: config.clone(),
        feed,
        sense,
        bus,
        analyzer_wake,
        capture,
        overlay: overlay.clone(),
        orchestrator,
        analyzer,
        tracer,
        profiler,
    };
    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.ws_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "sinain listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                }
                _ = serve_shutdown.cancelled() => {}
            }
        })
        .await
        .context("axum server error")?;

    // ── Graceful shutdown: timers stop, clients close, journal flushes ──
    shutdown.cancel();
    gateway.stop();
    overlay.close_all();
    journal.flush();
    tracing::info!("sinain stopped");
    Ok(())
}
