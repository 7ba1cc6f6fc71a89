//! Message types for actor communication
//!
//! Message handlers are implemented in [`crate::actor::inventory`].

use invsync_api::Domain;

/// Run one scan/diff/emit pass over every enabled domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPass {
    /// Timer or scan-on-start
    Scheduled,
    /// Requested through the command interface
    Requested,
}

/// Clear stored snapshot and first-scan marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetDomain {
    /// Domain to reset; `None` resets all of them
    pub domain: Option<Domain>,
}
