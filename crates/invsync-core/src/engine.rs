//! Inventory engine: one pass over every enabled domain

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use invsync_api::{Domain, InventoryDump};
use invsync_probe::Probe;

use crate::config::InventoryConfig;
use crate::diff::DiffEngine;
use crate::emit::{EmitStats, EventEmitter, PushSink};
use crate::error::CoreError;
use crate::normalize::PackageRules;
use crate::scanner::Scanner;
use crate::state::{DomainState, InventoryStatus, LoopState, SharedStatus};
use crate::store::{MetadataStore, SnapshotStore};

/// Metadata key of the last completed pass
pub const LAST_PASS_KEY: &str = "last_pass";

/// Metadata key recording the first completed scan of `domain`
#[must_use]
pub fn first_scan_key(domain: Domain) -> String {
    format!("first_scan:{}", domain.table())
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub scanned: Vec<Domain>,
    pub failed: Vec<Domain>,
    pub events: usize,
    pub emitted: EmitStats,
}

impl std::fmt::Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scanned {} domains ({} failed), {} events ({} delivered, {} failed)",
            self.scanned.len(),
            self.failed.len(),
            self.events,
            self.emitted.delivered,
            self.emitted.failed
        )
    }
}

/// Collaborators of an [`InventoryEngine`]
pub struct EngineParts {
    pub probe: Arc<dyn Probe>,
    pub sink: Arc<dyn PushSink>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

/// Scans, diffs and emits; owns the stores exclusively
pub struct InventoryEngine {
    config: InventoryConfig,
    scanner: Scanner,
    diff: DiffEngine,
    snapshots: Arc<dyn SnapshotStore>,
    metadata: Arc<dyn MetadataStore>,
    emitter: EventEmitter,
    status: SharedStatus,
}

impl InventoryEngine {
    /// Build an engine, loading first-scan flags and package rules
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the rules file cannot
    /// be loaded, or the metadata store cannot be read.
    pub fn new(config: InventoryConfig, parts: EngineParts) -> Result<Self, CoreError> {
        config.validate()?;

        let rules = match &config.normalizer_config_path {
            Some(path) => PackageRules::load(path, &config.normalizer_type)?,
            None => PackageRules::empty(),
        };

        let mut status = InventoryStatus::default();
        for domain in Domain::ALL {
            let first_scan_done = parts.metadata.read(&first_scan_key(domain))?.is_some();
            status.domains.insert(
                domain,
                DomainState::new(config.is_domain_enabled(domain), first_scan_done),
            );
        }
        status.last_pass = parts
            .metadata
            .read(LAST_PASS_KEY)?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc));

        info!(
            domains = config.enabled_domains().count(),
            interval = ?config.interval,
            "inventory engine initialized"
        );

        Ok(Self {
            scanner: Scanner::new(parts.probe, rules, config.ports_all),
            diff: DiffEngine::new(Arc::clone(&parts.snapshots)),
            snapshots: parts.snapshots,
            metadata: parts.metadata,
            emitter: EventEmitter::new(parts.sink),
            status: SharedStatus::new(status),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Handle for lock-free diagnostic reads
    #[must_use]
    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Diagnostics snapshot
    #[must_use]
    pub fn dump(&self) -> InventoryDump {
        self.status.read().dump(self.config.summary())
    }

    /// Scan, diff and emit every enabled domain in order
    ///
    /// A failing domain is logged and skipped; the others still run. A
    /// disabled module scans nothing and returns an empty summary.
    #[instrument(skip(self))]
    pub async fn run_pass(&mut self) -> PassSummary {
        if !self.config.enabled {
            info!("inventory module disabled, pass skipped");
            return PassSummary::default();
        }

        let scanned_at = Utc::now();
        let mut summary = PassSummary::default();

        let domains: Vec<Domain> = self.config.enabled_domains().collect();
        for domain in domains {
            match self.run_domain(domain, scanned_at).await {
                Ok((events, emitted)) => {
                    summary.events += events;
                    summary.emitted.delivered += emitted.delivered;
                    summary.emitted.failed += emitted.failed;
                    summary.scanned.push(domain);
                }
                Err(e) => {
                    warn!(%domain, error = %e, retryable = e.is_retryable(), "domain skipped");
                    self.status
                        .update_domain(domain, |s| s.last_error = Some(e.to_string()));
                    summary.failed.push(domain);
                }
            }
        }

        self.status.set_pass_phase(None);

        if let Err(e) = self.metadata.write(LAST_PASS_KEY, &scanned_at.to_rfc3339()) {
            error!(error = %e, "failed to record last pass");
        }
        self.status.write().last_pass = Some(scanned_at);

        info!(
            scanned = summary.scanned.len(),
            failed = summary.failed.len(),
            events = summary.events,
            "inventory pass finished"
        );

        summary
    }

    async fn run_domain(
        &mut self,
        domain: Domain,
        scanned_at: DateTime<Utc>,
    ) -> Result<(usize, EmitStats), CoreError> {
        self.status.set_pass_phase(Some(LoopState::Scanning));
        let started = Instant::now();

        let rows = self.scanner.scan(domain).await?;
        let row_count = rows.len();

        let first_scan = !self.status.first_scan_done(domain);
        let events = self
            .diff
            .process_domain(domain, rows, first_scan, scanned_at)?;

        if first_scan {
            self.status
                .update_domain(domain, |s| s.first_scan_done = true);
            if let Err(e) = self
                .metadata
                .write(&first_scan_key(domain), &scanned_at.to_rfc3339())
            {
                error!(%domain, error = %e, "failed to persist first scan marker");
            }
            info!(%domain, rows = row_count, "first scan completed");
        }

        self.status.set_pass_phase(Some(LoopState::Emitting));
        let emitted = self.emitter.emit_all(&events).await;

        let elapsed = started.elapsed();
        self.status.update_domain(domain, |s| {
            s.last_scan = Some(scanned_at);
            s.last_duration = Some(elapsed);
            s.last_row_count = Some(row_count);
            s.last_event_count = Some(events.len());
            s.last_error = None;
        });

        debug!(%domain, rows = row_count, events = events.len(), elapsed = ?elapsed, "domain synced");

        Ok((events.len(), emitted))
    }

    /// Forget the snapshot and first-scan marker of `domain`, or of every
    /// domain when `None`
    ///
    /// The next pass treats the domain as never scanned.
    ///
    /// # Errors
    /// Returns an error if a store cannot be written.
    #[instrument(skip(self))]
    pub fn reset(&mut self, domain: Option<Domain>) -> Result<(), CoreError> {
        let targets: Vec<Domain> = match domain {
            Some(domain) => vec![domain],
            None => Domain::ALL.to_vec(),
        };

        for domain in targets {
            // the marker never outlives its snapshot
            self.metadata.delete(&first_scan_key(domain))?;
            self.snapshots.clear(domain)?;
            self.status.update_domain(domain, |s| {
                s.first_scan_done = false;
                s.last_error = None;
            });
            info!(%domain, "domain reset");
        }

        Ok(())
    }
}
