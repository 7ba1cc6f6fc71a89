//! Event delivery

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use invsync_api::{Event, PushMessage};

use crate::error::EmitError;

/// Upstream push capability
///
/// A status of `0` means the message was accepted; anything else is a
/// delivery failure. Failures are not retried.
#[async_trait]
pub trait PushSink: Send + Sync {
    async fn push(&self, message: PushMessage) -> i32;
}

/// [`PushSink`] backed by a closure
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(PushMessage) -> i32 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> PushSink for FnSink<F>
where
    F: Fn(PushMessage) -> i32 + Send + Sync,
{
    async fn push(&self, message: PushMessage) -> i32 {
        (self.0)(message)
    }
}

/// Delivery counters of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Serializes events and hands them to the push sink in order
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn PushSink>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn PushSink>) -> Self {
        Self { sink }
    }

    /// Deliver one event
    ///
    /// # Errors
    /// Returns an error if the event cannot be serialized or the sink rejects
    /// it.
    pub async fn emit(&self, event: &Event) -> Result<(), EmitError> {
        let message =
            PushMessage::from_event(event).map_err(|e| EmitError::Serialize(e.to_string()))?;

        match self.sink.push(message).await {
            0 => Ok(()),
            status => Err(EmitError::Rejected(status)),
        }
    }

    /// Deliver `events` in order, logging and counting failures
    pub async fn emit_all(&self, events: &[Event]) -> EmitStats {
        let mut stats = EmitStats::default();

        for event in events {
            match self.emit(event).await {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    warn!(
                        domain = %event.domain(),
                        operation = %event.operation(),
                        error = %e,
                        "event delivery failed"
                    );
                    stats.failed += 1;
                }
            }
        }

        if !events.is_empty() {
            debug!(delivered = stats.delivered, failed = stats.failed, "events emitted");
        }

        stats
    }
}
