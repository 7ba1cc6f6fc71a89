//! Public entry point of the inventory module

use kameo::actor::{ActorRef, Spawn};
use kameo::error::SendError;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use invsync_api::{CommandResponse, Domain, InventoryDump};

use crate::actor::{InventoryActor, InventoryActorArgs};
use crate::command::Command;
use crate::config::InventoryConfig;
use crate::engine::{EngineParts, InventoryEngine};
use crate::error::CoreError;
use crate::message::{ResetDomain, RunPass};
use crate::state::{DomainState, InventoryStatus, SharedStatus};
use crate::sync_loop::{StopSignal, SyncLoop};

/// Running inventory module: actor, sync loop and diagnostics
pub struct InventoryHandle {
    config: InventoryConfig,
    /// `None` when the module is disabled
    actor: Option<ActorRef<InventoryActor>>,
    status: SharedStatus,
    stop: StopSignal,
    sync_loop: Mutex<Option<JoinHandle<()>>>,
}

impl InventoryHandle {
    /// Initialize the engine and start the sync loop
    ///
    /// A disabled module starts nothing; its commands fail and its dump
    /// reports the configuration only.
    ///
    /// # Errors
    /// Returns an error if the engine cannot be initialized (invalid
    /// configuration, unreadable rules or metadata).
    #[instrument(skip_all)]
    pub async fn start(config: InventoryConfig, parts: EngineParts) -> Result<Self, CoreError> {
        let stop = StopSignal::new();

        if !config.enabled {
            info!("inventory module disabled");
            let mut status = InventoryStatus::default();
            for domain in Domain::ALL {
                status
                    .domains
                    .insert(domain, DomainState::new(false, false));
            }
            return Ok(Self {
                config,
                actor: None,
                status: SharedStatus::new(status),
                stop,
                sync_loop: Mutex::new(None),
            });
        }

        let engine = InventoryEngine::new(config.clone(), parts)?;
        let status = engine.status();

        let actor = InventoryActor::spawn(InventoryActorArgs { engine });

        let sync_loop = SyncLoop::new(
            actor.clone(),
            config.interval,
            config.scan_on_start,
            status.clone(),
            stop.clone(),
        )
        .spawn();

        info!("inventory module started");

        Ok(Self {
            config,
            actor: Some(actor),
            status,
            stop,
            sync_loop: Mutex::new(Some(sync_loop)),
        })
    }

    /// Run a named administrative command
    #[instrument(skip(self, parameters))]
    pub async fn execute_command(&self, name: &str, parameters: &Value) -> CommandResponse {
        let command = match Command::parse(name, parameters) {
            Ok(command) => command,
            Err(message) => {
                warn!(command = %name, reason = %message, "command rejected");
                return CommandResponse::failure(message);
            }
        };

        let Some(actor) = &self.actor else {
            return CommandResponse::failure(CoreError::Disabled.to_string());
        };

        match command {
            Command::Scan { wait: false } => {
                let actor = actor.clone();
                tokio::spawn(async move {
                    match actor.ask(RunPass::Requested).await {
                        Ok(summary) => info!(%summary, "requested pass done"),
                        Err(e) => warn!(error = %e, "requested pass failed"),
                    }
                });
                CommandResponse::in_progress("scan queued")
            }
            Command::Scan { wait: true } => {
                match actor.ask(RunPass::Requested).await.map_err(actor_error) {
                    Ok(summary) => CommandResponse::success(summary.to_string()),
                    Err(e) => CommandResponse::failure(e.to_string()),
                }
            }
            Command::Reset { domain } => {
                let target = domain.map_or_else(|| "all domains".to_string(), |d| d.to_string());
                match actor.ask(ResetDomain { domain }).await.map_err(actor_error) {
                    Ok(()) => CommandResponse::success(format!("reset {target}")),
                    Err(e) => CommandResponse::failure(e.to_string()),
                }
            }
        }
    }

    /// Configuration and per-domain state, as of the last update
    #[must_use]
    pub fn dump(&self) -> InventoryDump {
        self.status.read().dump(self.config.summary())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.actor.is_some()
    }

    /// Stop the loop, let an in-flight pass finish, then stop the actor
    ///
    /// Calling it more than once is harmless.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.stop.stop();

        if let Some(handle) = self.sync_loop.lock().await.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "sync loop task failed");
        }

        if let Some(actor) = &self.actor
            && actor.is_alive()
        {
            match actor.stop_gracefully().await {
                Ok(()) => {
                    actor.wait_for_shutdown().await;
                }
                Err(e) => error!(error = %e, "failed to stop inventory actor"),
            }
        }

        info!("inventory module stopped");
    }
}

/// Unwrap the handler's own error from a send failure
fn actor_error<M>(e: SendError<M, CoreError>) -> CoreError {
    match e {
        SendError::HandlerError(err) => err,
        other => CoreError::ActorError(other.to_string()),
    }
}
