//! Per-domain probe calls

use std::sync::Arc;

use tracing::{debug, instrument};

use invsync_api::Domain;
use invsync_probe::{Probe, ProbeError, RawDocument};

use crate::error::CoreError;
use crate::normalize::PackageRules;

/// Queries the probe for one domain at a time
pub struct Scanner {
    probe: Arc<dyn Probe>,
    rules: PackageRules,
    ports_all: bool,
}

impl Scanner {
    pub fn new(probe: Arc<dyn Probe>, rules: PackageRules, ports_all: bool) -> Self {
        Self {
            probe,
            rules,
            ports_all,
        }
    }

    /// Scan `domain`
    ///
    /// # Errors
    /// Returns [`CoreError::Scan`] if the probe fails.
    #[instrument(skip(self), fields(probe = self.probe.probe_type()))]
    pub async fn scan(&self, domain: Domain) -> Result<Vec<RawDocument>, CoreError> {
        let result = match domain {
            Domain::Hardware => self.scan_hardware().await,
            Domain::System => self.scan_system().await,
            Domain::Networks => self.scan_networks().await,
            Domain::Packages => self.scan_packages().await,
            Domain::Ports => self.scan_ports().await,
            Domain::Processes => self.scan_processes().await,
            Domain::Hotfixes => self.scan_hotfixes().await,
        };

        let rows = result.map_err(|source| CoreError::Scan { domain, source })?;
        debug!(rows = rows.len(), "scan completed");
        Ok(rows)
    }

    pub async fn scan_hardware(&self) -> Result<Vec<RawDocument>, ProbeError> {
        self.probe.hardware().await
    }

    pub async fn scan_system(&self) -> Result<Vec<RawDocument>, ProbeError> {
        self.probe.system().await
    }

    pub async fn scan_networks(&self) -> Result<Vec<RawDocument>, ProbeError> {
        self.probe.networks().await
    }

    pub async fn scan_packages(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let rows = self.probe.packages().await?;
        Ok(self.rules.apply(Domain::Packages, rows))
    }

    /// Listening sockets, or every open socket when `ports_all` is set
    pub async fn scan_ports(&self) -> Result<Vec<RawDocument>, ProbeError> {
        self.probe.ports(self.ports_all).await
    }

    pub async fn scan_processes(&self) -> Result<Vec<RawDocument>, ProbeError> {
        self.probe.processes().await
    }

    pub async fn scan_hotfixes(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let rows = self.probe.hotfixes().await?;
        Ok(self.rules.apply(Domain::Hotfixes, rows))
    }
}
