//! Sync loop and per-domain state

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use invsync_api::{ConfigSummary, Domain, DomainStatus, InventoryDump};

/// States of the sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Scanning,
    Emitting,
    Waiting,
    Stopping,
}

impl LoopState {
    /// Check whether a pass is running
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, LoopState::Scanning | LoopState::Emitting)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::Scanning => write!(f, "scanning"),
            LoopState::Emitting => write!(f, "emitting"),
            LoopState::Waiting => write!(f, "waiting"),
            LoopState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Bookkeeping for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainState {
    pub enabled: bool,
    /// Set after the first successful diff, cleared only by a reset
    pub first_scan_done: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub last_row_count: Option<usize>,
    pub last_event_count: Option<usize>,
    pub last_error: Option<String>,
}

impl DomainState {
    #[must_use]
    pub fn new(enabled: bool, first_scan_done: bool) -> Self {
        Self {
            enabled,
            first_scan_done,
            last_scan: None,
            last_duration: None,
            last_row_count: None,
            last_event_count: None,
            last_error: None,
        }
    }

    fn status(&self, domain: Domain) -> DomainStatus {
        #[allow(clippy::cast_possible_truncation)]
        let last_duration_ms = self.last_duration.map(|d| d.as_millis() as u64);

        DomainStatus {
            domain,
            enabled: self.enabled,
            first_scan_done: self.first_scan_done,
            last_scan: self.last_scan,
            last_duration_ms,
            last_row_count: self.last_row_count,
            last_event_count: self.last_event_count,
            last_error: self.last_error.clone(),
        }
    }
}

/// Everything the diagnostics dump reports
#[derive(Debug, Clone, Default)]
pub struct InventoryStatus {
    /// Written by the sync loop only
    pub loop_state: LoopState,
    /// Phase of the running pass, written by the engine only
    pub pass_phase: Option<LoopState>,
    pub last_pass: Option<DateTime<Utc>>,
    pub domains: BTreeMap<Domain, DomainState>,
}

impl InventoryStatus {
    /// Running pass phase if any, else the loop state
    #[must_use]
    pub fn effective_state(&self) -> LoopState {
        self.pass_phase.unwrap_or(self.loop_state)
    }

    /// Build a dump together with the configuration summary
    #[must_use]
    pub fn dump(&self, config: ConfigSummary) -> InventoryDump {
        InventoryDump {
            config,
            loop_state: self.effective_state().to_string(),
            last_pass: self.last_pass,
            domains: self
                .domains
                .iter()
                .map(|(domain, state)| state.status(*domain))
                .collect(),
        }
    }
}

/// Status shared between the engine, the loop and diagnostic readers
///
/// Readers never wait on a running pass; values are as of the last write.
#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<RwLock<InventoryStatus>>);

impl SharedStatus {
    #[must_use]
    pub fn new(status: InventoryStatus) -> Self {
        Self(Arc::new(RwLock::new(status)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, InventoryStatus> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, InventoryStatus> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn loop_state(&self) -> LoopState {
        self.read().loop_state
    }

    pub fn set_loop_state(&self, state: LoopState) {
        self.write().loop_state = state;
    }

    /// Record the phase of a running pass; `None` once it has finished
    pub fn set_pass_phase(&self, phase: Option<LoopState>) {
        self.write().pass_phase = phase.filter(LoopState::is_busy);
    }

    /// Apply `f` to the state of `domain`, if tracked
    pub fn update_domain(&self, domain: Domain, f: impl FnOnce(&mut DomainState)) {
        if let Some(state) = self.write().domains.get_mut(&domain) {
            f(state);
        }
    }

    #[must_use]
    pub fn first_scan_done(&self, domain: Domain) -> bool {
        self.read()
            .domains
            .get(&domain)
            .is_some_and(|s| s.first_scan_done)
    }
}
