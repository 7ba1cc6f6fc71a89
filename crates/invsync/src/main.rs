//! invsync daemon
//!
//! Runs the inventory module against the local osquery install, writes pushed
//! events as JSON lines and serves a small admin API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use invsync_core::{EngineParts, InventoryEngine, InventoryHandle, PushSink, SqliteStore};
use invsync_probe::OsqueryProbe;

mod api;
mod config;
mod router;
mod sink;
mod state;

use config::{Config, DaemonConfig, LogFormat};
use sink::JsonLinesSink;
use state::AppState;

/// Endpoint inventory daemon
#[derive(Debug, Parser)]
#[command(name = "invsync", version, about)]
struct Cli {
    /// Configuration file (default: INVSYNC_CONFIG, ./invsync.toml, ...)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single inventory pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, source) = Config::load_default(cli.config.as_deref())?;

    init_tracing(&config.daemon);
    match &source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => warn!("no config file found, using defaults"),
    }

    let parts = engine_parts(&config)?;

    if cli.once {
        let mut engine = InventoryEngine::new(config.inventory.clone(), parts)?;
        let summary = engine.run_pass().await;
        info!(%summary, "single pass finished");
        return Ok(());
    }

    let inventory = Arc::new(InventoryHandle::start(config.inventory.clone(), parts).await?);
    let bind = config.daemon.bind.clone();
    let app = router::create_router(Arc::new(AppState::new(inventory.clone())));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("failed to bind {bind}"))?;
    info!(%bind, "admin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    inventory.shutdown().await;
    info!("invsync stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(daemon: &DaemonConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&daemon.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match daemon.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Open the stores and wire the osquery probe and the push sink
fn engine_parts(config: &Config) -> Result<EngineParts> {
    let store = Arc::new(
        SqliteStore::open(&config.inventory.database_path).wrap_err_with(|| {
            format!(
                "failed to open inventory database {}",
                config.inventory.database_path.display()
            )
        })?,
    );

    let sink: Arc<dyn PushSink> = match &config.daemon.events_path {
        Some(path) => Arc::new(
            JsonLinesSink::append(path)
                .wrap_err_with(|| format!("failed to open events file {}", path.display()))?,
        ),
        None => Arc::new(JsonLinesSink::stdout()),
    };

    Ok(EngineParts {
        probe: Arc::new(OsqueryProbe::new()),
        sink,
        snapshots: store.clone(),
        metadata: store,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;

    use invsync_core::{EngineParts, FnSink, InventoryConfig, InventoryHandle, MemoryStore};
    use invsync_probe::{Probe, ProbeError, RawDocument};

    use crate::state::AppState;

    /// Probe reporting an empty host
    pub struct EmptyProbe;

    #[async_trait]
    impl Probe for EmptyProbe {
        async fn hardware(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn system(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn networks(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn packages(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn ports(&self, _all: bool) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn processes(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        async fn hotfixes(&self) -> Result<Vec<RawDocument>, ProbeError> {
            Ok(Vec::new())
        }

        fn probe_type(&self) -> &'static str {
            "empty"
        }
    }

    async fn state_with(inventory: InventoryConfig) -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        let parts = EngineParts {
            probe: Arc::new(EmptyProbe),
            sink: Arc::new(FnSink::new(|_| 0)),
            snapshots: store.clone(),
            metadata: store,
        };
        let handle = InventoryHandle::start(inventory, parts)
            .await
            .unwrap();
        Arc::new(AppState::new(Arc::new(handle)))
    }

    pub async fn app_state() -> Arc<AppState> {
        state_with(InventoryConfig {
            scan_on_start: false,
            ..InventoryConfig::default()
        })
        .await
    }

    pub async fn disabled_state() -> Arc<AppState> {
        state_with(InventoryConfig {
            enabled: false,
            ..InventoryConfig::default()
        })
        .await
    }
}
