//! `InventoryActor`: serialized access to the inventory engine
//!
//! Scheduled passes, command-triggered passes and resets all arrive through
//! the mailbox, so store mutations never overlap.

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::info;

use crate::engine::{InventoryEngine, PassSummary};
use crate::error::CoreError;
use crate::message::{ResetDomain, RunPass};

/// Arguments for spawning an `InventoryActor`
pub struct InventoryActorArgs {
    /// Fully initialized engine
    pub engine: InventoryEngine,
}

/// Actor owning the engine and its stores
pub struct InventoryActor {
    engine: InventoryEngine,
    passes: u64,
}

impl Actor for InventoryActor {
    type Args = InventoryActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "InventoryActor starting");

        Ok(Self {
            engine: args.engine,
            passes: 0,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(passes = self.passes, reason = ?reason, "InventoryActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<RunPass> for InventoryActor {
    type Reply = Result<PassSummary, CoreError>;

    async fn handle(&mut self, msg: RunPass, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        info!(trigger = ?msg, "inventory pass starting");

        let summary = self.engine.run_pass().await;
        self.passes += 1;

        Ok(summary)
    }
}

impl Message<ResetDomain> for InventoryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: ResetDomain,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.engine.reset(msg.domain)
    }
}
