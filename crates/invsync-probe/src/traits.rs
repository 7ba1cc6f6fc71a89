//! Probe trait

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::types::RawDocument;

/// Reads current host state, one query per inventory domain
///
/// Implementations must not change host state. Each call returns zero or more
/// raw documents whose shape is domain specific and may be sparse.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn hardware(&self) -> Result<Vec<RawDocument>, ProbeError>;

    async fn system(&self) -> Result<Vec<RawDocument>, ProbeError>;

    /// One document per network interface, addresses nested as arrays
    async fn networks(&self) -> Result<Vec<RawDocument>, ProbeError>;

    async fn packages(&self) -> Result<Vec<RawDocument>, ProbeError>;

    /// Open ports; `all` includes non-listening sockets
    async fn ports(&self, all: bool) -> Result<Vec<RawDocument>, ProbeError>;

    async fn processes(&self) -> Result<Vec<RawDocument>, ProbeError>;

    async fn hotfixes(&self) -> Result<Vec<RawDocument>, ProbeError>;

    /// Short name used in logs
    fn probe_type(&self) -> &'static str;
}
